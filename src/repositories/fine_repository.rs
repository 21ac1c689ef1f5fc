use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use tracing::error;
use uuid::Uuid;

use super::vehicle_cost_repository::{ensure_vehicle_in_org, insert_cost};
use super::{FineRepository, Page};
use crate::models::fine::{Fine, FinePatch};
use crate::models::vehicle_cost::VehicleCost;
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub struct PgFineRepository {
    pool: PgPool,
}

impl PgFineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn lock_fine(conn: &mut PgConnection, id: Uuid, organization_id: Uuid) -> AppResult<Fine> {
    sqlx::query_as::<_, Fine>(
        "SELECT * FROM fines WHERE id = $1 AND organization_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| not_found_error("Fine", id))
}

async fn lock_paired_cost(conn: &mut PgConnection, fine_id: Uuid) -> AppResult<Option<VehicleCost>> {
    let cost = sqlx::query_as::<_, VehicleCost>(
        "SELECT * FROM vehicle_costs WHERE fine_id = $1 FOR UPDATE",
    )
    .bind(fine_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(cost)
}

#[async_trait]
impl FineRepository for PgFineRepository {
    async fn create(&self, fine: Fine) -> AppResult<(Fine, VehicleCost)> {
        let mut tx = self.pool.begin().await?;
        ensure_vehicle_in_org(&mut tx, fine.vehicle_id, fine.organization_id).await?;

        let fine = sqlx::query_as::<_, Fine>(
            r#"
            INSERT INTO fines (id, organization_id, vehicle_id, driver_id, description, infraction_code,
                               date, value, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(fine.id)
        .bind(fine.organization_id)
        .bind(fine.vehicle_id)
        .bind(fine.driver_id)
        .bind(&fine.description)
        .bind(&fine.infraction_code)
        .bind(fine.date)
        .bind(fine.value)
        .bind(fine.status)
        .bind(fine.created_at)
        .bind(fine.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let cost = insert_cost(&mut tx, &VehicleCost::for_fine(&fine, Utc::now())).await?;

        tx.commit().await?;
        Ok((fine, cost))
    }

    async fn update(
        &self,
        id: Uuid,
        organization_id: Uuid,
        patch: &FinePatch,
    ) -> AppResult<(Fine, VehicleCost)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut fine = lock_fine(&mut tx, id, organization_id).await?;

        let mut cost = lock_paired_cost(&mut tx, id).await?.ok_or_else(|| {
            error!("Fine {} has no paired vehicle cost", id);
            AppError::LedgerInconsistency(format!("fine {} has no paired vehicle cost", id))
        })?;

        if let Some(vehicle_id) = patch.vehicle_id {
            ensure_vehicle_in_org(&mut tx, vehicle_id, organization_id).await?;
        }
        fine.apply_patch(patch, now)?;

        let fine = sqlx::query_as::<_, Fine>(
            r#"
            UPDATE fines
            SET vehicle_id = $2, driver_id = $3, description = $4, infraction_code = $5,
                date = $6, value = $7, status = $8, updated_at = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(fine.id)
        .bind(fine.vehicle_id)
        .bind(fine.driver_id)
        .bind(&fine.description)
        .bind(&fine.infraction_code)
        .bind(fine.date)
        .bind(fine.value)
        .bind(fine.status)
        .bind(fine.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        if patch.touches_cost() {
            cost.sync_with_fine(&fine, now);
            cost = sqlx::query_as::<_, VehicleCost>(
                r#"
                UPDATE vehicle_costs
                SET vehicle_id = $2, description = $3, amount = $4, date = $5, updated_at = $6
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(cost.id)
            .bind(cost.vehicle_id)
            .bind(&cost.description)
            .bind(cost.amount)
            .bind(cost.date)
            .bind(cost.updated_at)
            .fetch_one(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((fine, cost))
    }

    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_fine(&mut tx, id, organization_id).await?;

        let removed = sqlx::query("DELETE FROM vehicle_costs WHERE fine_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            error!("Fine {} had no paired vehicle cost at deletion", id);
            return Err(AppError::LedgerInconsistency(format!(
                "fine {} has no paired vehicle cost",
                id
            )));
        }

        sqlx::query("DELETE FROM fines WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<Fine>> {
        let fine = sqlx::query_as::<_, Fine>(
            "SELECT * FROM fines WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(fine)
    }

    async fn list(
        &self,
        organization_id: Uuid,
        driver_id: Option<Uuid>,
        page: Page,
    ) -> AppResult<Vec<Fine>> {
        let fines = sqlx::query_as::<_, Fine>(
            r#"
            SELECT * FROM fines
            WHERE organization_id = $1 AND ($2::uuid IS NULL OR driver_id = $2)
            ORDER BY date DESC, created_at DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(organization_id)
        .bind(driver_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(fines)
    }
}
