use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::PageQuery;
use crate::models::journey::{Journey, JourneyEnd, JourneyFilters, TripDetails};
use crate::models::vehicle::Vehicle;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TripDetailsRequest {
    #[validate(length(max = 50))]
    pub trip_type: Option<String>,
    #[validate(length(max = 255))]
    pub destination_address: Option<String>,
    #[validate(length(max = 1000))]
    pub trip_description: Option<String>,
}

impl From<TripDetailsRequest> for TripDetails {
    fn from(request: TripDetailsRequest) -> Self {
        TripDetails {
            trip_type: request.trip_type,
            destination_address: request.destination_address,
            trip_description: request.trip_description,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartJourneyRequest {
    pub vehicle_id: Uuid,
    #[serde(flatten)]
    #[validate]
    pub details: TripDetailsRequest,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct EndJourneyRequest {
    #[validate(range(min = 0))]
    pub end_mileage: Option<i32>,
    #[validate(range(min = 0.0))]
    pub end_engine_hours: Option<f64>,
}

impl From<EndJourneyRequest> for JourneyEnd {
    fn from(request: EndJourneyRequest) -> Self {
        JourneyEnd {
            end_mileage: request.end_mileage,
            end_engine_hours: request.end_engine_hours,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct JourneyListQuery {
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl JourneyListQuery {
    pub fn split(self) -> (JourneyFilters, PageQuery) {
        (
            JourneyFilters {
                driver_id: self.driver_id,
                vehicle_id: self.vehicle_id,
                date_from: self.date_from,
                date_to: self.date_to,
            },
            PageQuery {
                skip: self.skip,
                limit: self.limit,
            },
        )
    }
}

/// Jornada junto al vehículo ya actualizado
#[derive(Debug, Serialize)]
pub struct JourneyWithVehicle {
    pub journey: Journey,
    pub vehicle: Vehicle,
}

impl From<(Journey, Vehicle)> for JourneyWithVehicle {
    fn from((journey, vehicle): (Journey, Vehicle)) -> Self {
        Self { journey, vehicle }
    }
}
