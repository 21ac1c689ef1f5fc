use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::VehicleRepository;
use crate::models::vehicle::{
    LocationHistory, LocationPing, NewVehicle, Vehicle, VehicleStatus, VehicleTransition,
};
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub struct PgVehicleRepository {
    pool: PgPool,
}

impl PgVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Bloquea la fila del vehículo dentro de la transacción en curso
pub(crate) async fn lock_vehicle(
    conn: &mut PgConnection,
    id: Uuid,
    organization_id: Uuid,
) -> AppResult<Vehicle> {
    sqlx::query_as::<_, Vehicle>(
        "SELECT * FROM vehicles WHERE id = $1 AND organization_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| not_found_error("Vehicle", id))
}

/// Persiste estado, kilometraje y horas de motor tras una transición
pub(crate) async fn save_vehicle_state(conn: &mut PgConnection, vehicle: &Vehicle) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE vehicles
        SET status = $2, current_km = $3, current_engine_hours = $4, updated_at = $5
        WHERE id = $1
        "#,
    )
    .bind(vehicle.id)
    .bind(vehicle.status)
    .bind(vehicle.current_km)
    .bind(vehicle.current_engine_hours)
    .bind(vehicle.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Aplica la transición sobre la fila bloqueada
pub(crate) async fn transition_locked(
    conn: &mut PgConnection,
    id: Uuid,
    organization_id: Uuid,
    transition: VehicleTransition,
) -> AppResult<Vehicle> {
    let mut vehicle = lock_vehicle(conn, id, organization_id).await?;
    transition.apply(&mut vehicle, Utc::now())?;
    save_vehicle_state(conn, &vehicle).await?;
    Ok(vehicle)
}

#[async_trait]
impl VehicleRepository for PgVehicleRepository {
    async fn create(&self, new: NewVehicle) -> AppResult<Vehicle> {
        let vehicle = Vehicle::from_new(new, Utc::now());

        let vehicle = sqlx::query_as::<_, Vehicle>(
            r#"
            INSERT INTO vehicles (id, organization_id, license_plate, brand, model, year, status,
                                  current_km, current_engine_hours, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(vehicle.id)
        .bind(vehicle.organization_id)
        .bind(&vehicle.license_plate)
        .bind(&vehicle.brand)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(vehicle.status)
        .bind(vehicle.current_km)
        .bind(vehicle.current_engine_hours)
        .bind(vehicle.created_at)
        .bind(vehicle.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("License plate already registered".to_string())
            }
            other => AppError::Database(other),
        })?;

        Ok(vehicle)
    }

    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    async fn list(&self, organization_id: Uuid) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE organization_id = $1 ORDER BY created_at DESC",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(vehicles)
    }

    async fn transition(
        &self,
        id: Uuid,
        organization_id: Uuid,
        transition: VehicleTransition,
    ) -> AppResult<Vehicle> {
        let mut tx = self.pool.begin().await?;
        let vehicle = transition_locked(&mut tx, id, organization_id, transition).await?;
        tx.commit().await?;
        Ok(vehicle)
    }

    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let vehicle = lock_vehicle(&mut tx, id, organization_id).await?;
        if vehicle.status == VehicleStatus::InUse {
            return Err(AppError::Conflict(
                "Vehicle has an active journey and cannot be deleted".to_string(),
            ));
        }

        // Historial auditable que referencia al vehículo
        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM journeys WHERE vehicle_id = $1)
                OR EXISTS (SELECT 1 FROM fines WHERE vehicle_id = $1)
                OR EXISTS (SELECT 1 FROM vehicle_costs WHERE vehicle_id = $1)
                OR EXISTS (SELECT 1 FROM freight_orders WHERE vehicle_id = $1)
                OR EXISTS (SELECT 1 FROM inventory_items WHERE installed_on_vehicle_id = $1)
                OR EXISTS (SELECT 1 FROM inventory_transactions WHERE related_vehicle_id = $1)
                OR EXISTS (SELECT 1 FROM fuel_logs WHERE vehicle_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if referenced {
            return Err(AppError::Conflict(
                "Vehicle has recorded history and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM vehicles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_position(&self, ping: &LocationPing) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE vehicles
            SET last_latitude = $3, last_longitude = $4, last_location_update = $5
            WHERE id = $1 AND organization_id = $2
            "#,
        )
        .bind(ping.vehicle_id)
        .bind(ping.organization_id)
        .bind(ping.latitude)
        .bind(ping.longitude)
        .bind(ping.recorded_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(not_found_error("Vehicle", ping.vehicle_id));
        }

        let history = LocationHistory::from_ping(ping);
        sqlx::query(
            r#"
            INSERT INTO location_history (id, vehicle_id, organization_id, latitude, longitude, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(history.id)
        .bind(history.vehicle_id)
        .bind(history.organization_id)
        .bind(history.latitude)
        .bind(history.longitude)
        .bind(history.timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
