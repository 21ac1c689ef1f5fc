//! Modelo de Journey
//!
//! Una jornada es una sesión de uso de un vehículo por un conductor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::vehicle::Vehicle;
use crate::utils::errors::{invalid_transition, validation_error, AppResult};

/// Journey - mapea a la tabla journeys
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Journey {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub freight_order_id: Option<Uuid>,
    pub stop_point_id: Option<Uuid>,
    pub trip_type: Option<String>,
    pub destination_address: Option<String>,
    pub trip_description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub start_mileage: i32,
    pub end_mileage: Option<i32>,
    pub start_engine_hours: Option<f64>,
    pub end_engine_hours: Option<f64>,
    pub is_active: bool,
}

/// Detalles del viaje enviados por el conductor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripDetails {
    pub trip_type: Option<String>,
    pub destination_address: Option<String>,
    pub trip_description: Option<String>,
}

/// Datos para abrir una jornada nueva
#[derive(Debug, Clone)]
pub struct NewJourney {
    pub organization_id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub details: TripDetails,
    pub freight_order_id: Option<Uuid>,
    pub stop_point_id: Option<Uuid>,
}

/// Métricas de cierre de una jornada
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JourneyEnd {
    pub end_mileage: Option<i32>,
    pub end_engine_hours: Option<f64>,
}

/// Filtros para el listado de jornadas
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JourneyFilters {
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl JourneyFilters {
    pub fn matches(&self, journey: &Journey) -> bool {
        self.driver_id.map_or(true, |id| journey.driver_id == id)
            && self.vehicle_id.map_or(true, |id| journey.vehicle_id == id)
            && self.date_from.map_or(true, |from| journey.start_time >= from)
            && self.date_to.map_or(true, |to| journey.start_time <= to)
    }
}

impl Journey {
    /// Construye la jornada activa a partir del vehículo recién adquirido
    pub fn open(new: NewJourney, vehicle: &Vehicle, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            vehicle_id: new.vehicle_id,
            driver_id: new.driver_id,
            freight_order_id: new.freight_order_id,
            stop_point_id: new.stop_point_id,
            trip_type: new.details.trip_type,
            destination_address: new.details.destination_address,
            trip_description: new.details.trip_description,
            start_time: now,
            end_time: None,
            start_mileage: vehicle.current_km,
            end_mileage: None,
            start_engine_hours: vehicle.current_engine_hours,
            end_engine_hours: None,
            is_active: true,
        }
    }

    /// Un tramo de flete sólo se cierra completando su parada
    pub fn ensure_standalone(&self) -> AppResult<()> {
        if self.freight_order_id.is_some() {
            return Err(invalid_transition(
                "Journey",
                "FreightLeg",
                "be ended outside its stop point",
            ));
        }
        Ok(())
    }

    pub fn finish(&mut self, end: &JourneyEnd, now: DateTime<Utc>) -> AppResult<()> {
        if !self.is_active {
            return Err(invalid_transition("Journey", "Ended", "be ended again"));
        }
        if end.end_mileage.is_some_and(|km| km < self.start_mileage) {
            return Err(validation_error(
                "end_mileage",
                "end mileage cannot be lower than the start mileage",
            ));
        }
        self.end_time = Some(now);
        self.end_mileage = end.end_mileage;
        self.end_engine_hours = end.end_engine_hours;
        self.is_active = false;
        Ok(())
    }

    /// Distancia recorrida, sólo para jornadas cerradas con kilometraje final
    pub fn distance(&self) -> Option<i32> {
        self.end_mileage.map(|end| end - self.start_mileage)
    }
}
