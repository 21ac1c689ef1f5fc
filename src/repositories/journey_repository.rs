use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::vehicle_repository::transition_locked;
use super::{JourneyRepository, Page};
use crate::models::journey::{Journey, JourneyEnd, JourneyFilters, NewJourney};
use crate::models::vehicle::{Vehicle, VehicleTransition};
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub struct PgJourneyRepository {
    pool: PgPool,
}

impl PgJourneyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// acquire + insert dentro de la transacción recibida
pub(crate) async fn start_journey_in(
    conn: &mut PgConnection,
    new: NewJourney,
) -> AppResult<(Journey, Vehicle)> {
    let vehicle = transition_locked(
        conn,
        new.vehicle_id,
        new.organization_id,
        VehicleTransition::Acquire,
    )
    .await?;
    let journey = Journey::open(new, &vehicle, Utc::now());

    let journey = sqlx::query_as::<_, Journey>(
        r#"
        INSERT INTO journeys (id, organization_id, vehicle_id, driver_id, freight_order_id, stop_point_id,
                              trip_type, destination_address, trip_description, start_time,
                              start_mileage, start_engine_hours, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, TRUE)
        RETURNING *
        "#,
    )
    .bind(journey.id)
    .bind(journey.organization_id)
    .bind(journey.vehicle_id)
    .bind(journey.driver_id)
    .bind(journey.freight_order_id)
    .bind(journey.stop_point_id)
    .bind(&journey.trip_type)
    .bind(&journey.destination_address)
    .bind(&journey.trip_description)
    .bind(journey.start_time)
    .bind(journey.start_mileage)
    .bind(journey.start_engine_hours)
    .fetch_one(&mut *conn)
    .await?;

    Ok((journey, vehicle))
}

pub(crate) async fn lock_journey(
    conn: &mut PgConnection,
    id: Uuid,
    organization_id: Uuid,
) -> AppResult<Journey> {
    sqlx::query_as::<_, Journey>(
        "SELECT * FROM journeys WHERE id = $1 AND organization_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| not_found_error("Journey", id))
}

/// finish + release dentro de la transacción recibida
pub(crate) async fn end_journey_in(
    conn: &mut PgConnection,
    mut journey: Journey,
    end: JourneyEnd,
) -> AppResult<(Journey, Vehicle)> {
    journey.finish(&end, Utc::now())?;

    let vehicle = transition_locked(
        conn,
        journey.vehicle_id,
        journey.organization_id,
        VehicleTransition::Release {
            final_km: end.end_mileage,
            final_engine_hours: end.end_engine_hours,
        },
    )
    .await?;

    let journey = sqlx::query_as::<_, Journey>(
        r#"
        UPDATE journeys
        SET end_time = $2, end_mileage = $3, end_engine_hours = $4, is_active = FALSE
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(journey.id)
    .bind(journey.end_time)
    .bind(journey.end_mileage)
    .bind(journey.end_engine_hours)
    .fetch_one(&mut *conn)
    .await?;

    Ok((journey, vehicle))
}

#[async_trait]
impl JourneyRepository for PgJourneyRepository {
    async fn start(&self, new: NewJourney) -> AppResult<(Journey, Vehicle)> {
        let mut tx = self.pool.begin().await?;
        let started = start_journey_in(&mut tx, new).await?;
        tx.commit().await?;
        Ok(started)
    }

    async fn end(
        &self,
        id: Uuid,
        organization_id: Uuid,
        end: JourneyEnd,
    ) -> AppResult<(Journey, Vehicle)> {
        let mut tx = self.pool.begin().await?;
        let journey = lock_journey(&mut tx, id, organization_id).await?;
        journey.ensure_standalone()?;
        let ended = end_journey_in(&mut tx, journey, end).await?;
        tx.commit().await?;
        Ok(ended)
    }

    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<Journey>> {
        let journey = sqlx::query_as::<_, Journey>(
            "SELECT * FROM journeys WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(journey)
    }

    async fn find_active_by_driver(
        &self,
        driver_id: Uuid,
        organization_id: Uuid,
    ) -> AppResult<Option<Journey>> {
        let journey = sqlx::query_as::<_, Journey>(
            r#"
            SELECT * FROM journeys
            WHERE driver_id = $1 AND organization_id = $2 AND is_active
            ORDER BY start_time DESC
            LIMIT 1
            "#,
        )
        .bind(driver_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(journey)
    }

    async fn list(
        &self,
        organization_id: Uuid,
        filters: &JourneyFilters,
        page: Page,
    ) -> AppResult<Vec<Journey>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM journeys WHERE organization_id = ");
        query.push_bind(organization_id);

        if let Some(driver_id) = filters.driver_id {
            query.push(" AND driver_id = ").push_bind(driver_id);
        }
        if let Some(vehicle_id) = filters.vehicle_id {
            query.push(" AND vehicle_id = ").push_bind(vehicle_id);
        }
        if let Some(from) = filters.date_from {
            query.push(" AND start_time >= ").push_bind(from);
        }
        if let Some(to) = filters.date_to {
            query.push(" AND start_time <= ").push_bind(to);
        }
        query
            .push(" ORDER BY start_time DESC OFFSET ")
            .push_bind(page.skip)
            .push(" LIMIT ")
            .push_bind(page.limit);

        let journeys = query
            .build_query_as::<Journey>()
            .fetch_all(&self.pool)
            .await?;

        Ok(journeys)
    }

    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let journey = lock_journey(&mut tx, id, organization_id).await?;
        if journey.is_active {
            return Err(AppError::Conflict(
                "Active journeys must be ended before they can be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM journeys WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
