//! Modelo de Vehicle
//!
//! Contiene el struct Vehicle, su máquina de estados de disponibilidad
//! y los registros de posición GPS.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::utils::errors::{invalid_transition, validation_error, AppError, AppResult};

/// Estado del vehículo - mapea al ENUM vehicle_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "vehicle_status", rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    InUse,
    Maintenance,
}

/// Vehicle principal - mapea a la tabla vehicles
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub license_plate: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub status: VehicleStatus,
    pub current_km: i32,
    pub current_engine_hours: Option<f64>,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_location_update: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Datos para registrar un vehículo nuevo
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub organization_id: Uuid,
    pub license_plate: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub current_km: i32,
    pub current_engine_hours: Option<f64>,
}

impl Vehicle {
    pub fn from_new(new: NewVehicle, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            license_plate: new.license_plate,
            brand: new.brand,
            model: new.model,
            year: new.year,
            status: VehicleStatus::Available,
            current_km: new.current_km,
            current_engine_hours: new.current_engine_hours,
            last_latitude: None,
            last_longitude: None,
            last_location_update: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Nombre corto para mensajes de notificación
    pub fn display_name(&self) -> String {
        format!("{} {} ({})", self.brand, self.model, self.license_plate)
    }
}

/// Transiciones de la máquina de estados de disponibilidad.
///
/// Ambos almacenes (Postgres y memoria) aplican estas reglas sobre la fila
/// ya bloqueada, de modo que el check-and-set es atómico.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VehicleTransition {
    Acquire,
    Release {
        final_km: Option<i32>,
        final_engine_hours: Option<f64>,
    },
    EnterMaintenance,
    LeaveMaintenance,
}

impl VehicleTransition {
    pub fn apply(&self, vehicle: &mut Vehicle, now: DateTime<Utc>) -> AppResult<()> {
        match *self {
            VehicleTransition::Acquire => {
                if vehicle.status != VehicleStatus::Available {
                    return Err(AppError::VehicleNotAvailable(vehicle.id));
                }
                vehicle.status = VehicleStatus::InUse;
            }
            VehicleTransition::Release {
                final_km,
                final_engine_hours,
            } => {
                if vehicle.status != VehicleStatus::InUse {
                    return Err(invalid_transition("Vehicle", vehicle.status, "be released"));
                }
                // El kilometraje es monótono
                if final_km.is_some_and(|km| km < vehicle.current_km) {
                    return Err(validation_error(
                        "end_mileage",
                        "end mileage cannot be lower than the vehicle's current mileage",
                    ));
                }
                if let (Some(hours), Some(current)) = (final_engine_hours, vehicle.current_engine_hours) {
                    if hours < current {
                        return Err(validation_error(
                            "end_engine_hours",
                            "engine hours cannot decrease",
                        ));
                    }
                }
                if let Some(km) = final_km {
                    vehicle.current_km = km;
                }
                if final_engine_hours.is_some() {
                    vehicle.current_engine_hours = final_engine_hours;
                }
                vehicle.status = VehicleStatus::Available;
            }
            VehicleTransition::EnterMaintenance => match vehicle.status {
                VehicleStatus::Available => vehicle.status = VehicleStatus::Maintenance,
                VehicleStatus::InUse => return Err(AppError::VehicleNotAvailable(vehicle.id)),
                VehicleStatus::Maintenance => {
                    return Err(invalid_transition("Vehicle", vehicle.status, "enter maintenance"))
                }
            },
            VehicleTransition::LeaveMaintenance => {
                if vehicle.status != VehicleStatus::Maintenance {
                    return Err(invalid_transition("Vehicle", vehicle.status, "leave maintenance"));
                }
                vehicle.status = VehicleStatus::Available;
            }
        }
        vehicle.updated_at = now;
        Ok(())
    }
}

/// Ping de GPS recibido de un dispositivo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPing {
    pub organization_id: Uuid,
    pub vehicle_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Historial de posiciones - tabla location_history
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LocationHistory {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub organization_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl LocationHistory {
    pub fn from_ping(ping: &LocationPing) -> Self {
        Self {
            id: Uuid::new_v4(),
            vehicle_id: ping.vehicle_id,
            organization_id: ping.organization_id,
            latitude: ping.latitude,
            longitude: ping.longitude,
            timestamp: ping.recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(status: VehicleStatus, km: i32) -> Vehicle {
        let mut v = Vehicle::from_new(
            NewVehicle {
                organization_id: Uuid::new_v4(),
                license_plate: "ABC1D23".to_string(),
                brand: "Volvo".to_string(),
                model: "FH 540".to_string(),
                year: 2021,
                current_km: km,
                current_engine_hours: None,
            },
            Utc::now(),
        );
        v.status = status;
        v
    }

    #[test]
    fn test_acquire_only_from_available() {
        let mut v = vehicle(VehicleStatus::Available, 0);
        VehicleTransition::Acquire.apply(&mut v, Utc::now()).unwrap();
        assert_eq!(v.status, VehicleStatus::InUse);

        let err = VehicleTransition::Acquire.apply(&mut v, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::VehicleNotAvailable(id) if id == v.id));

        let mut v = vehicle(VehicleStatus::Maintenance, 0);
        assert!(matches!(
            VehicleTransition::Acquire.apply(&mut v, Utc::now()),
            Err(AppError::VehicleNotAvailable(_))
        ));
        assert_eq!(v.status, VehicleStatus::Maintenance);
    }

    #[test]
    fn test_release_updates_mileage() {
        let mut v = vehicle(VehicleStatus::InUse, 100);
        VehicleTransition::Release {
            final_km: Some(500),
            final_engine_hours: None,
        }
        .apply(&mut v, Utc::now())
        .unwrap();
        assert_eq!(v.status, VehicleStatus::Available);
        assert_eq!(v.current_km, 500);
    }

    #[test]
    fn test_release_rejects_decreasing_mileage() {
        let mut v = vehicle(VehicleStatus::InUse, 1_000);
        let err = VehicleTransition::Release {
            final_km: Some(900),
            final_engine_hours: None,
        }
        .apply(&mut v, Utc::now())
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(v.status, VehicleStatus::InUse);
        assert_eq!(v.current_km, 1_000);
    }

    #[test]
    fn test_maintenance_cycle() {
        let mut v = vehicle(VehicleStatus::Available, 0);
        VehicleTransition::EnterMaintenance.apply(&mut v, Utc::now()).unwrap();
        assert_eq!(v.status, VehicleStatus::Maintenance);
        VehicleTransition::LeaveMaintenance.apply(&mut v, Utc::now()).unwrap();
        assert_eq!(v.status, VehicleStatus::Available);

        let mut busy = vehicle(VehicleStatus::InUse, 0);
        assert!(matches!(
            VehicleTransition::EnterMaintenance.apply(&mut busy, Utc::now()),
            Err(AppError::VehicleNotAvailable(_))
        ));
    }
}
