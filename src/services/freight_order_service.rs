//! Máquina de estados de las órdenes de flete
//!
//! Open → Claimed → InTransit → Delivered, con Canceled desde cualquier
//! estado no terminal. Cada tramo entre paradas es una jornada.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::notification_service::NotificationEmitter;
use crate::models::auth::Principal;
use crate::models::freight_order::{FreightOrder, FreightStatus, NewFreightOrder};
use crate::models::journey::{JourneyEnd, TripDetails};
use crate::models::notification::{NewNotification, NotificationType};
use crate::repositories::{FreightOrderRepository, LegOutcome, Page, StopLeg};
use crate::utils::errors::{not_found_error, validation_error, AppResult};

pub struct FreightOrderService {
    orders: Arc<dyn FreightOrderRepository>,
    notifier: NotificationEmitter,
}

fn validate_stops(new: &NewFreightOrder) -> AppResult<()> {
    if new.stop_points.is_empty() {
        return Err(validation_error("stop_points", "at least one stop point is required"));
    }
    let mut seen = HashSet::new();
    for stop in &new.stop_points {
        if !seen.insert(stop.sequence_order) {
            return Err(validation_error("stop_points", "sequence_order values must be unique"));
        }
        if stop.address.trim().is_empty() {
            return Err(validation_error("stop_points", "every stop point needs an address"));
        }
    }
    Ok(())
}

impl FreightOrderService {
    pub fn new(orders: Arc<dyn FreightOrderRepository>, notifier: NotificationEmitter) -> Self {
        Self { orders, notifier }
    }

    pub async fn create(&self, principal: &Principal, mut new: NewFreightOrder) -> AppResult<FreightOrder> {
        principal.require_manager("create freight order")?;
        validate_stops(&new)?;
        new.organization_id = principal.organization_id;

        let order = self.orders.create(new).await?;
        info!(
            "Freight order {} created with {} stops",
            order.id,
            order.stop_points.len()
        );
        Ok(order)
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> AppResult<FreightOrder> {
        self.orders
            .find_by_id(id, principal.organization_id)
            .await?
            .ok_or_else(|| not_found_error("Freight order", id))
    }

    /// Listado completo; los conductores reciben una lista vacía
    pub async fn list(&self, principal: &Principal, page: Page) -> AppResult<Vec<FreightOrder>> {
        if !principal.is_manager() {
            return Ok(Vec::new());
        }
        self.orders.list(principal.organization_id, page).await
    }

    pub async fn list_open(&self, principal: &Principal) -> AppResult<Vec<FreightOrder>> {
        self.orders
            .list_by_status(principal.organization_id, &[FreightStatus::Open], None)
            .await
    }

    pub async fn list_pending_for_driver(&self, principal: &Principal) -> AppResult<Vec<FreightOrder>> {
        self.orders
            .list_by_status(
                principal.organization_id,
                &[FreightStatus::Claimed, FreightStatus::InTransit],
                Some(principal.user_id),
            )
            .await
    }

    pub async fn claim(&self, principal: &Principal, id: Uuid, vehicle_id: Uuid) -> AppResult<FreightOrder> {
        let order = self
            .orders
            .claim(id, principal.organization_id, vehicle_id, principal.user_id)
            .await?;

        info!("Freight order {} claimed by driver {}", order.id, principal.user_id);
        self.notifier.emit(
            NewNotification::new(
                principal.organization_id,
                principal.user_id,
                NotificationType::FreightAssigned,
                format!(
                    "Ordem de frete {} atribuída a você",
                    order.description.as_deref().unwrap_or("sem descrição")
                ),
            )
            .about("freight_order", order.id)
            .for_vehicle(order.vehicle_id),
        );
        Ok(order)
    }

    pub async fn start_journey_for_stop(
        &self,
        principal: &Principal,
        order_id: Uuid,
        stop_point_id: Uuid,
        details: TripDetails,
    ) -> AppResult<LegOutcome> {
        let outcome = self
            .orders
            .start_stop(self.leg(principal, order_id, stop_point_id), details)
            .await?;

        info!(
            "Journey {} started towards stop {} of order {}",
            outcome.journey.id, stop_point_id, order_id
        );
        Ok(outcome)
    }

    pub async fn complete_stop_point(
        &self,
        principal: &Principal,
        order_id: Uuid,
        stop_point_id: Uuid,
        journey_id: Uuid,
        end: JourneyEnd,
    ) -> AppResult<LegOutcome> {
        let outcome = self
            .orders
            .complete_stop(self.leg(principal, order_id, stop_point_id), journey_id, end)
            .await?;

        info!("Stop {} of order {} completed", stop_point_id, order_id);
        if outcome.delivered {
            info!("Freight order {} delivered", order_id);
            self.notifier.emit(
                NewNotification::new(
                    principal.organization_id,
                    principal.user_id,
                    NotificationType::FreightUpdated,
                    format!(
                        "Ordem de frete {} entregue",
                        outcome.order.description.as_deref().unwrap_or("sem descrição")
                    ),
                )
                .about("freight_order", order_id)
                .for_vehicle(outcome.order.vehicle_id),
            );
        }
        Ok(outcome)
    }

    pub async fn cancel(&self, principal: &Principal, id: Uuid) -> AppResult<FreightOrder> {
        principal.require_manager("cancel freight order")?;
        let order = self.orders.cancel(id, principal.organization_id).await?;
        info!("Freight order {} canceled", id);
        Ok(order)
    }

    fn leg(&self, principal: &Principal, order_id: Uuid, stop_point_id: Uuid) -> StopLeg {
        StopLeg {
            order_id,
            stop_point_id,
            driver_id: principal.user_id,
            organization_id: principal.organization_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::freight_order::{NewStopPoint, StopPointType};
    use chrono::Utc;

    fn new_order(sequences: &[i32]) -> NewFreightOrder {
        NewFreightOrder {
            organization_id: Uuid::nil(),
            client_id: Uuid::new_v4(),
            description: None,
            scheduled_start_time: None,
            scheduled_end_time: None,
            stop_points: sequences
                .iter()
                .map(|&sequence_order| NewStopPoint {
                    sequence_order,
                    stop_type: StopPointType::Delivery,
                    address: "Rua Augusta, 100".to_string(),
                    cargo_description: None,
                    scheduled_time: Utc::now(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_stop_validation() {
        assert!(validate_stops(&new_order(&[1, 2, 3])).is_ok());
        assert!(validate_stops(&new_order(&[])).is_err());
        assert!(validate_stops(&new_order(&[1, 1])).is_err());
    }
}
