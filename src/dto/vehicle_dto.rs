use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::vehicle::NewVehicle;
use crate::utils::validation::not_blank;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(length(min = 1, max = 20), custom = "not_blank")]
    pub license_plate: String,
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[validate(length(min = 1, max = 100))]
    pub model: String,
    #[validate(range(min = 1950, max = 2100))]
    pub year: i32,
    #[validate(range(min = 0))]
    pub current_km: Option<i32>,
    #[validate(range(min = 0.0))]
    pub current_engine_hours: Option<f64>,
}

impl CreateVehicleRequest {
    pub fn into_new(self, organization_id: Uuid) -> NewVehicle {
        NewVehicle {
            organization_id,
            license_plate: self.license_plate,
            brand: self.brand,
            model: self.model,
            year: self.year,
            current_km: self.current_km.unwrap_or(0),
            current_engine_hours: self.current_engine_hours,
        }
    }
}

/// Ping de posición enviado por el dispositivo del vehículo
#[derive(Debug, Deserialize, Validate)]
pub struct PositionRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}
