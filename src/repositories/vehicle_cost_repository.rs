use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::VehicleCostRepository;
use crate::models::vehicle_cost::{NewVehicleCost, VehicleCost};
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub struct PgVehicleCostRepository {
    pool: PgPool,
}

impl PgVehicleCostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn insert_cost(conn: &mut PgConnection, cost: &VehicleCost) -> AppResult<VehicleCost> {
    let cost = sqlx::query_as::<_, VehicleCost>(
        r#"
        INSERT INTO vehicle_costs (id, organization_id, vehicle_id, description, amount, date,
                                   cost_type, fine_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(cost.id)
    .bind(cost.organization_id)
    .bind(cost.vehicle_id)
    .bind(&cost.description)
    .bind(cost.amount)
    .bind(cost.date)
    .bind(cost.cost_type)
    .bind(cost.fine_id)
    .bind(cost.created_at)
    .bind(cost.updated_at)
    .fetch_one(&mut *conn)
    .await?;
    Ok(cost)
}

pub(crate) async fn ensure_vehicle_in_org(
    conn: &mut PgConnection,
    vehicle_id: Uuid,
    organization_id: Uuid,
) -> AppResult<()> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM vehicles WHERE id = $1 AND organization_id = $2)",
    )
    .bind(vehicle_id)
    .bind(organization_id)
    .fetch_one(&mut *conn)
    .await?;

    if !exists {
        return Err(not_found_error("Vehicle", vehicle_id));
    }
    Ok(())
}

#[async_trait]
impl VehicleCostRepository for PgVehicleCostRepository {
    async fn create(&self, new: NewVehicleCost) -> AppResult<VehicleCost> {
        let mut conn = self.pool.acquire().await?;
        ensure_vehicle_in_org(&mut conn, new.vehicle_id, new.organization_id).await?;
        insert_cost(&mut conn, &VehicleCost::from_new(new, Utc::now())).await
    }

    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<VehicleCost>> {
        let cost = sqlx::query_as::<_, VehicleCost>(
            "SELECT * FROM vehicle_costs WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cost)
    }

    async fn list(
        &self,
        organization_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<Vec<VehicleCost>> {
        let costs = sqlx::query_as::<_, VehicleCost>(
            r#"
            SELECT * FROM vehicle_costs
            WHERE organization_id = $1
              AND ($2::date IS NULL OR date >= $2)
              AND ($3::date IS NULL OR date <= $3)
            ORDER BY date DESC, created_at DESC
            "#,
        )
        .bind(organization_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(costs)
    }

    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let cost = sqlx::query_as::<_, VehicleCost>(
            "SELECT * FROM vehicle_costs WHERE id = $1 AND organization_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found_error("Vehicle cost", id))?;

        if cost.fine_id.is_some() {
            return Err(AppError::Conflict(
                "Cost is linked to a fine; delete the fine instead".to_string(),
            ));
        }

        sqlx::query("DELETE FROM vehicle_costs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
