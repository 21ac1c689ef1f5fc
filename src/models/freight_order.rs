//! Modelo de FreightOrder y StopPoint
//!
//! La orden de flete avanza sólo hacia adelante:
//! Open → Claimed → InTransit → Delivered, con Canceled alcanzable desde
//! cualquier estado no terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::utils::errors::{invalid_transition, not_found_error, AppError, AppResult};

/// Estado de la orden - mapea al ENUM freight_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "freight_status", rename_all = "snake_case")]
pub enum FreightStatus {
    Open,
    Claimed,
    InTransit,
    Delivered,
    Canceled,
}

impl FreightStatus {
    /// Etiqueta del ENUM en la base de datos
    pub fn as_str(&self) -> &'static str {
        match self {
            FreightStatus::Open => "open",
            FreightStatus::Claimed => "claimed",
            FreightStatus::InTransit => "in_transit",
            FreightStatus::Delivered => "delivered",
            FreightStatus::Canceled => "canceled",
        }
    }

    /// Posición en la secuencia de avance. Canceled queda fuera del orden.
    pub fn rank(&self) -> Option<u8> {
        match self {
            FreightStatus::Open => Some(0),
            FreightStatus::Claimed => Some(1),
            FreightStatus::InTransit => Some(2),
            FreightStatus::Delivered => Some(3),
            FreightStatus::Canceled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FreightStatus::Delivered | FreightStatus::Canceled)
    }

    /// Aristas legales del grafo de estados
    pub fn can_advance_to(&self, next: FreightStatus) -> bool {
        match (self, next) {
            (from, FreightStatus::Canceled) => !from.is_terminal(),
            (FreightStatus::Open, FreightStatus::Claimed)
            | (FreightStatus::Claimed, FreightStatus::InTransit)
            | (FreightStatus::InTransit, FreightStatus::Delivered) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "stop_point_type", rename_all = "snake_case")]
pub enum StopPointType {
    Pickup,
    Delivery,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "stop_point_status", rename_all = "snake_case")]
pub enum StopPointStatus {
    Pending,
    Completed,
}

/// StopPoint - mapea a la tabla stop_points
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StopPoint {
    pub id: Uuid,
    pub freight_order_id: Uuid,
    pub sequence_order: i32,
    pub stop_type: StopPointType,
    pub status: StopPointStatus,
    pub address: String,
    pub cargo_description: Option<String>,
    pub scheduled_time: DateTime<Utc>,
    pub actual_arrival_time: Option<DateTime<Utc>>,
}

/// FreightOrder - mapea a la tabla freight_orders; las paradas se cargan aparte
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FreightOrder {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub description: Option<String>,
    pub status: FreightStatus,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub scheduled_end_time: Option<DateTime<Utc>>,
    pub vehicle_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub stop_points: Vec<StopPoint>,
}

#[derive(Debug, Clone)]
pub struct NewStopPoint {
    pub sequence_order: i32,
    pub stop_type: StopPointType,
    pub address: String,
    pub cargo_description: Option<String>,
    pub scheduled_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFreightOrder {
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub description: Option<String>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub scheduled_end_time: Option<DateTime<Utc>>,
    pub stop_points: Vec<NewStopPoint>,
}

impl FreightOrder {
    pub fn from_new(new: NewFreightOrder, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        let mut stop_points: Vec<StopPoint> = new
            .stop_points
            .into_iter()
            .map(|sp| StopPoint {
                id: Uuid::new_v4(),
                freight_order_id: id,
                sequence_order: sp.sequence_order,
                stop_type: sp.stop_type,
                status: StopPointStatus::Pending,
                address: sp.address,
                cargo_description: sp.cargo_description,
                scheduled_time: sp.scheduled_time,
                actual_arrival_time: None,
            })
            .collect();
        stop_points.sort_by_key(|sp| sp.sequence_order);

        Self {
            id,
            organization_id: new.organization_id,
            client_id: new.client_id,
            description: new.description,
            status: FreightStatus::Open,
            scheduled_start_time: new.scheduled_start_time,
            scheduled_end_time: new.scheduled_end_time,
            vehicle_id: None,
            driver_id: None,
            created_at: now,
            updated_at: now,
            stop_points,
        }
    }

    fn advance(&mut self, next: FreightStatus, now: DateTime<Utc>) -> AppResult<()> {
        if !self.status.can_advance_to(next) {
            return Err(invalid_transition(
                "Freight order",
                self.status,
                &format!("move to {:?}", next),
            ));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Regla de negocio: sólo el conductor asignado opera la orden
    pub fn ensure_assigned_to(&self, driver_id: Uuid) -> AppResult<()> {
        if self.driver_id != Some(driver_id) {
            return Err(AppError::FreightNotAssigned(self.id));
        }
        Ok(())
    }

    pub fn claim(&mut self, vehicle_id: Uuid, driver_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        self.advance(FreightStatus::Claimed, now)?;
        self.vehicle_id = Some(vehicle_id);
        self.driver_id = Some(driver_id);
        Ok(())
    }

    /// Vehículo asignado en el claim
    pub fn assigned_vehicle(&self) -> AppResult<Uuid> {
        self.vehicle_id
            .ok_or_else(|| invalid_transition("Freight order", self.status, "start without a vehicle"))
    }

    /// Próxima parada pendiente en orden de secuencia
    pub fn next_pending_stop(&self) -> Option<&StopPoint> {
        self.stop_points
            .iter()
            .filter(|sp| sp.status == StopPointStatus::Pending)
            .min_by_key(|sp| sp.sequence_order)
    }

    pub fn stop(&self, stop_point_id: Uuid) -> AppResult<&StopPoint> {
        self.stop_points
            .iter()
            .find(|sp| sp.id == stop_point_id)
            .ok_or_else(|| not_found_error("Stop point", stop_point_id))
    }

    fn ensure_next_stop(&self, stop_point_id: Uuid) -> AppResult<()> {
        let stop = self.stop(stop_point_id)?;
        if stop.status == StopPointStatus::Completed {
            return Err(invalid_transition("Stop point", stop.status, "be completed twice"));
        }
        match self.next_pending_stop() {
            Some(next) if next.id == stop_point_id => Ok(()),
            _ => Err(AppError::InvalidTransition(format!(
                "stop point {} is out of sequence",
                stop_point_id
            ))),
        }
    }

    /// Inicio de un tramo hacia la parada indicada.
    /// El primer tramo mueve la orden de Claimed a InTransit.
    pub fn begin_leg(&mut self, stop_point_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        match self.status {
            FreightStatus::Claimed => {
                self.ensure_next_stop(stop_point_id)?;
                self.advance(FreightStatus::InTransit, now)
            }
            FreightStatus::InTransit => self.ensure_next_stop(stop_point_id),
            other => Err(invalid_transition("Freight order", other, "start a journey")),
        }
    }

    /// Completa la parada; devuelve true si con ella se entrega la orden
    pub fn complete_stop(&mut self, stop_point_id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        if self.status != FreightStatus::InTransit {
            return Err(invalid_transition("Freight order", self.status, "complete a stop"));
        }
        self.ensure_next_stop(stop_point_id)?;

        if let Some(stop) = self.stop_points.iter_mut().find(|sp| sp.id == stop_point_id) {
            stop.status = StopPointStatus::Completed;
            stop.actual_arrival_time = Some(now);
        }
        self.updated_at = now;

        if self.next_pending_stop().is_none() {
            self.advance(FreightStatus::Delivered, now)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        self.advance(FreightStatus::Canceled, now)
    }
}
