//! Disponibilidad de vehículos
//!
//! El paso Available ↔ InUse lo conducen las jornadas; aquí sólo viven el
//! alta, la baja y el ciclo de mantenimiento.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::models::auth::Principal;
use crate::models::vehicle::{NewVehicle, Vehicle, VehicleTransition};
use crate::repositories::VehicleRepository;
use crate::utils::errors::{not_found_error, validation_error, AppResult};

pub struct VehicleService {
    vehicles: Arc<dyn VehicleRepository>,
}

impl VehicleService {
    pub fn new(vehicles: Arc<dyn VehicleRepository>) -> Self {
        Self { vehicles }
    }

    pub async fn create(&self, principal: &Principal, mut new: NewVehicle) -> AppResult<Vehicle> {
        principal.require_manager("register vehicle")?;
        new.license_plate = new.license_plate.trim().to_uppercase();
        if new.license_plate.is_empty() {
            return Err(validation_error("license_plate", "license plate is required"));
        }
        new.organization_id = principal.organization_id;

        let vehicle = self.vehicles.create(new).await?;
        info!("Vehicle {} registered in organization {}", vehicle.id, vehicle.organization_id);
        Ok(vehicle)
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> AppResult<Vehicle> {
        self.vehicles
            .find_by_id(id, principal.organization_id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", id))
    }

    pub async fn list(&self, principal: &Principal) -> AppResult<Vec<Vehicle>> {
        self.vehicles.list(principal.organization_id).await
    }

    pub async fn enter_maintenance(&self, principal: &Principal, id: Uuid) -> AppResult<Vehicle> {
        principal.require_manager("send vehicle to maintenance")?;
        self.vehicles
            .transition(id, principal.organization_id, VehicleTransition::EnterMaintenance)
            .await
    }

    pub async fn leave_maintenance(&self, principal: &Principal, id: Uuid) -> AppResult<Vehicle> {
        principal.require_manager("return vehicle from maintenance")?;
        self.vehicles
            .transition(id, principal.organization_id, VehicleTransition::LeaveMaintenance)
            .await
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> AppResult<()> {
        principal.require_manager("delete vehicle")?;
        self.vehicles.delete(id, principal.organization_id).await?;
        info!("Vehicle {} deleted", id);
        Ok(())
    }
}
