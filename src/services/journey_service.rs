//! Ciclo de vida de las jornadas
//!
//! `start` adquiere el vehículo y abre la jornada en una sola transacción;
//! `end` la cierra y libera el vehículo de la misma forma. Un intento
//! concurrente sobre el mismo vehículo ve el estado completo o nada.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::notification_service::NotificationEmitter;
use crate::models::auth::Principal;
use crate::models::journey::{Journey, JourneyEnd, JourneyFilters, NewJourney, TripDetails};
use crate::models::notification::{NewNotification, NotificationType};
use crate::models::vehicle::Vehicle;
use crate::repositories::{JourneyRepository, Page};
use crate::utils::errors::{forbidden_error, not_found_error, AppResult};

pub struct JourneyService {
    journeys: Arc<dyn JourneyRepository>,
    notifier: NotificationEmitter,
}

impl JourneyService {
    pub fn new(journeys: Arc<dyn JourneyRepository>, notifier: NotificationEmitter) -> Self {
        Self { journeys, notifier }
    }

    pub async fn start(
        &self,
        principal: &Principal,
        vehicle_id: Uuid,
        details: TripDetails,
    ) -> AppResult<(Journey, Vehicle)> {
        let (journey, vehicle) = self
            .journeys
            .start(NewJourney {
                organization_id: principal.organization_id,
                vehicle_id,
                driver_id: principal.user_id,
                details,
                freight_order_id: None,
                stop_point_id: None,
            })
            .await?;

        info!("Journey {} started on vehicle {}", journey.id, vehicle.id);
        self.notifier.emit(
            NewNotification::new(
                principal.organization_id,
                principal.user_id,
                NotificationType::JourneyStarted,
                format!("Jornada iniciada com o veículo {}", vehicle.display_name()),
            )
            .about("journey", journey.id)
            .for_vehicle(Some(vehicle.id)),
        );
        Ok((journey, vehicle))
    }

    /// Cierra la jornada; sólo su conductor o un gestor pueden hacerlo
    pub async fn end(
        &self,
        principal: &Principal,
        journey_id: Uuid,
        end: JourneyEnd,
    ) -> AppResult<(Journey, Vehicle)> {
        let current = self.get(principal, journey_id).await?;
        if current.driver_id != principal.user_id && !principal.is_manager() {
            return Err(forbidden_error("end journey", "journey belongs to another driver"));
        }

        let (journey, vehicle) = self
            .journeys
            .end(journey_id, principal.organization_id, end)
            .await?;

        info!(
            "Journey {} ended, vehicle {} back at {} km",
            journey.id, vehicle.id, vehicle.current_km
        );
        self.notifier.emit(
            NewNotification::new(
                principal.organization_id,
                principal.user_id,
                NotificationType::JourneyEnded,
                format!("Jornada finalizada com o veículo {}", vehicle.display_name()),
            )
            .about("journey", journey.id)
            .for_vehicle(Some(vehicle.id)),
        );
        Ok((journey, vehicle))
    }

    /// Los conductores sólo ven sus propias jornadas
    pub async fn get(&self, principal: &Principal, journey_id: Uuid) -> AppResult<Journey> {
        self.journeys
            .find_by_id(journey_id, principal.organization_id)
            .await?
            .filter(|j| !principal.is_driver() || j.driver_id == principal.user_id)
            .ok_or_else(|| not_found_error("Journey", journey_id))
    }

    pub async fn active_for_current_driver(&self, principal: &Principal) -> AppResult<Option<Journey>> {
        self.journeys
            .find_active_by_driver(principal.user_id, principal.organization_id)
            .await
    }

    pub async fn list(
        &self,
        principal: &Principal,
        mut filters: JourneyFilters,
        page: Page,
    ) -> AppResult<Vec<Journey>> {
        if principal.is_driver() {
            filters.driver_id = Some(principal.user_id);
        }
        self.journeys
            .list(principal.organization_id, &filters, page)
            .await
    }

    pub async fn delete(&self, principal: &Principal, journey_id: Uuid) -> AppResult<()> {
        principal.require_manager("delete journey")?;
        self.journeys
            .delete(journey_id, principal.organization_id)
            .await?;
        info!("Journey {} deleted", journey_id);
        Ok(())
    }
}
