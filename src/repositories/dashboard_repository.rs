//! Consultas de agregación de sólo lectura

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::DashboardRepository;
use crate::models::dashboard::{KmPerDay, VehiclePosition};
use crate::models::vehicle_cost::CostType;
use crate::utils::errors::AppResult;

pub struct PgDashboardRepository {
    pool: PgPool,
}

impl PgDashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn scalar_count(&self, sql: &str, organization_id: Uuid) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as(sql)
            .bind(organization_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl DashboardRepository for PgDashboardRepository {
    async fn count_vehicles(&self, organization_id: Uuid) -> AppResult<i64> {
        self.scalar_count("SELECT COUNT(*) FROM vehicles WHERE organization_id = $1", organization_id)
            .await
    }

    async fn count_drivers(&self, organization_id: Uuid) -> AppResult<i64> {
        self.scalar_count(
            "SELECT COUNT(*) FROM users WHERE organization_id = $1 AND role = 'driver' AND is_active",
            organization_id,
        )
        .await
    }

    async fn count_users(&self, organization_id: Uuid) -> AppResult<i64> {
        self.scalar_count("SELECT COUNT(*) FROM users WHERE organization_id = $1", organization_id)
            .await
    }

    async fn count_parts(&self, organization_id: Uuid) -> AppResult<i64> {
        self.scalar_count("SELECT COUNT(*) FROM parts WHERE organization_id = $1", organization_id)
            .await
    }

    async fn count_documents(&self, organization_id: Uuid) -> AppResult<i64> {
        self.scalar_count("SELECT COUNT(*) FROM documents WHERE organization_id = $1", organization_id)
            .await
    }

    async fn count_fines_since(&self, organization_id: Uuid, since: DateTime<Utc>) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM fines WHERE organization_id = $1 AND created_at >= $2",
        )
        .bind(organization_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_freight_orders_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM freight_orders WHERE organization_id = $1 AND created_at >= $2",
        )
        .bind(organization_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn sum_distance_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
        driver_id: Option<Uuid>,
    ) -> AppResult<f64> {
        let (total,): (f64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(end_mileage - start_mileage), 0)::float8
            FROM journeys
            WHERE organization_id = $1 AND start_time >= $2 AND NOT is_active
              AND end_mileage IS NOT NULL
              AND ($3::uuid IS NULL OR driver_id = $3)
            "#,
        )
        .bind(organization_id)
        .bind(since)
        .bind(driver_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn sum_fuel_since(&self, organization_id: Uuid, since: DateTime<Utc>) -> AppResult<f64> {
        let (total,): (f64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(liters), 0)::float8 FROM fuel_logs WHERE organization_id = $1 AND timestamp >= $2",
        )
        .bind(organization_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn costs_by_category_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<(CostType, Decimal)>> {
        let rows: Vec<(CostType, Decimal)> = sqlx::query_as(
            r#"
            SELECT cost_type, SUM(amount)
            FROM vehicle_costs
            WHERE organization_id = $1 AND date >= $2
            GROUP BY cost_type
            ORDER BY cost_type
            "#,
        )
        .bind(organization_id)
        .bind(since.date_naive())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn km_per_day_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<KmPerDay>> {
        let rows = sqlx::query_as::<_, KmPerDay>(
            r#"
            SELECT (end_time AT TIME ZONE 'UTC')::date AS date,
                   SUM(end_mileage - start_mileage)::float8 AS total
            FROM journeys
            WHERE organization_id = $1 AND end_time >= $2 AND end_mileage IS NOT NULL
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(organization_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn vehicle_positions(&self, organization_id: Uuid) -> AppResult<Vec<VehiclePosition>> {
        let rows = sqlx::query_as::<_, VehiclePosition>(
            r#"
            SELECT id AS vehicle_id, license_plate, last_latitude AS latitude,
                   last_longitude AS longitude, last_location_update AS timestamp
            FROM vehicles
            WHERE organization_id = $1
              AND last_latitude IS NOT NULL AND last_longitude IS NOT NULL
              AND last_location_update IS NOT NULL
            ORDER BY license_plate
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_journeys(&self, organization_id: Uuid, driver_id: Uuid) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM journeys WHERE organization_id = $1 AND driver_id = $2",
        )
        .bind(organization_id)
        .bind(driver_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_pending_freight_for_driver(
        &self,
        organization_id: Uuid,
        driver_id: Uuid,
    ) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM freight_orders
            WHERE organization_id = $1 AND driver_id = $2 AND status IN ('claimed', 'in_transit')
            "#,
        )
        .bind(organization_id)
        .bind(driver_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
