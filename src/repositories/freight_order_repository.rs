use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::journey_repository::{end_journey_in, lock_journey, start_journey_in};
use super::{FreightOrderRepository, LegOutcome, Page, StopLeg};
use crate::models::freight_order::{FreightOrder, FreightStatus, NewFreightOrder, StopPoint};
use crate::models::journey::{JourneyEnd, NewJourney, TripDetails};
use crate::utils::errors::{invalid_transition, not_found_error, AppError, AppResult};

pub struct PgFreightOrderRepository {
    pool: PgPool,
}

impl PgFreightOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_stops(&self, mut orders: Vec<FreightOrder>) -> AppResult<Vec<FreightOrder>> {
        if orders.is_empty() {
            return Ok(orders);
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let stops = sqlx::query_as::<_, StopPoint>(
            "SELECT * FROM stop_points WHERE freight_order_id = ANY($1) ORDER BY sequence_order",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<StopPoint>> = HashMap::new();
        for stop in stops {
            by_order.entry(stop.freight_order_id).or_default().push(stop);
        }
        for order in orders.iter_mut() {
            order.stop_points = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(orders)
    }
}

async fn lock_order(
    conn: &mut PgConnection,
    id: Uuid,
    organization_id: Uuid,
) -> AppResult<FreightOrder> {
    let mut order = sqlx::query_as::<_, FreightOrder>(
        "SELECT * FROM freight_orders WHERE id = $1 AND organization_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| not_found_error("Freight order", id))?;

    order.stop_points = sqlx::query_as::<_, StopPoint>(
        "SELECT * FROM stop_points WHERE freight_order_id = $1 ORDER BY sequence_order",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(order)
}

async fn has_active_journey(conn: &mut PgConnection, order_id: Uuid) -> AppResult<bool> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM journeys WHERE freight_order_id = $1 AND is_active)",
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

async fn save_order(conn: &mut PgConnection, order: &FreightOrder) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE freight_orders
        SET status = $2, vehicle_id = $3, driver_id = $4, updated_at = $5
        WHERE id = $1
        "#,
    )
    .bind(order.id)
    .bind(order.status)
    .bind(order.vehicle_id)
    .bind(order.driver_id)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl FreightOrderRepository for PgFreightOrderRepository {
    async fn create(&self, new: NewFreightOrder) -> AppResult<FreightOrder> {
        let order = FreightOrder::from_new(new, Utc::now());
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO freight_orders (id, organization_id, client_id, description, status,
                                        scheduled_start_time, scheduled_end_time, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id)
        .bind(order.organization_id)
        .bind(order.client_id)
        .bind(&order.description)
        .bind(order.status)
        .bind(order.scheduled_start_time)
        .bind(order.scheduled_end_time)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for stop in &order.stop_points {
            sqlx::query(
                r#"
                INSERT INTO stop_points (id, freight_order_id, sequence_order, stop_type, status,
                                         address, cargo_description, scheduled_time)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(stop.id)
            .bind(stop.freight_order_id)
            .bind(stop.sequence_order)
            .bind(stop.stop_type)
            .bind(stop.status)
            .bind(&stop.address)
            .bind(&stop.cargo_description)
            .bind(stop.scheduled_time)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<FreightOrder>> {
        let order = sqlx::query_as::<_, FreightOrder>(
            "SELECT * FROM freight_orders WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        match order {
            Some(order) => Ok(self.attach_stops(vec![order]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(&self, organization_id: Uuid, page: Page) -> AppResult<Vec<FreightOrder>> {
        let orders = sqlx::query_as::<_, FreightOrder>(
            r#"
            SELECT * FROM freight_orders
            WHERE organization_id = $1
            ORDER BY created_at DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(organization_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        self.attach_stops(orders).await
    }

    async fn list_by_status(
        &self,
        organization_id: Uuid,
        statuses: &[FreightStatus],
        driver_id: Option<Uuid>,
    ) -> AppResult<Vec<FreightOrder>> {
        let orders = sqlx::query_as::<_, FreightOrder>(
            r#"
            SELECT * FROM freight_orders
            WHERE organization_id = $1
              AND status::text = ANY($2)
              AND ($3::uuid IS NULL OR driver_id = $3)
            ORDER BY scheduled_start_time ASC NULLS LAST, created_at ASC
            "#,
        )
        .bind(organization_id)
        .bind(statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>())
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_stops(orders).await
    }

    async fn claim(
        &self,
        id: Uuid,
        organization_id: Uuid,
        vehicle_id: Uuid,
        driver_id: Uuid,
    ) -> AppResult<FreightOrder> {
        let mut tx = self.pool.begin().await?;
        let mut order = lock_order(&mut tx, id, organization_id).await?;

        let (vehicle_exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM vehicles WHERE id = $1 AND organization_id = $2)",
        )
        .bind(vehicle_id)
        .bind(organization_id)
        .fetch_one(&mut *tx)
        .await?;
        if !vehicle_exists {
            return Err(not_found_error("Vehicle", vehicle_id));
        }

        order.claim(vehicle_id, driver_id, Utc::now())?;
        save_order(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn start_stop(&self, leg: StopLeg, details: TripDetails) -> AppResult<LegOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut order = lock_order(&mut tx, leg.order_id, leg.organization_id).await?;
        order.ensure_assigned_to(leg.driver_id)?;

        if has_active_journey(&mut tx, order.id).await? {
            return Err(invalid_transition(
                "Freight order",
                order.status,
                "start a leg while another one is active",
            ));
        }

        order.begin_leg(leg.stop_point_id, Utc::now())?;
        let vehicle_id = order.assigned_vehicle()?;

        let (journey, vehicle) = start_journey_in(
            &mut tx,
            NewJourney {
                organization_id: leg.organization_id,
                vehicle_id,
                driver_id: leg.driver_id,
                details,
                freight_order_id: Some(order.id),
                stop_point_id: Some(leg.stop_point_id),
            },
        )
        .await?;

        save_order(&mut tx, &order).await?;
        tx.commit().await?;

        Ok(LegOutcome {
            order,
            journey,
            vehicle,
            delivered: false,
        })
    }

    async fn complete_stop(
        &self,
        leg: StopLeg,
        journey_id: Uuid,
        end: JourneyEnd,
    ) -> AppResult<LegOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut order = lock_order(&mut tx, leg.order_id, leg.organization_id).await?;
        order.ensure_assigned_to(leg.driver_id)?;

        let journey = lock_journey(&mut tx, journey_id, leg.organization_id).await?;
        if !journey.is_active
            || journey.freight_order_id != Some(order.id)
            || journey.stop_point_id != Some(leg.stop_point_id)
        {
            return Err(AppError::InvalidTransition(format!(
                "journey {} is not the active journey of stop point {}",
                journey_id, leg.stop_point_id
            )));
        }

        let (journey, vehicle) = end_journey_in(&mut tx, journey, end).await?;
        let delivered = order.complete_stop(leg.stop_point_id, Utc::now())?;

        let stop = order.stop(leg.stop_point_id)?;
        sqlx::query(
            "UPDATE stop_points SET status = $2, actual_arrival_time = $3 WHERE id = $1",
        )
        .bind(stop.id)
        .bind(stop.status)
        .bind(stop.actual_arrival_time)
        .execute(&mut *tx)
        .await?;
        save_order(&mut tx, &order).await?;

        tx.commit().await?;

        Ok(LegOutcome {
            order,
            journey,
            vehicle,
            delivered,
        })
    }

    async fn cancel(&self, id: Uuid, organization_id: Uuid) -> AppResult<FreightOrder> {
        let mut tx = self.pool.begin().await?;
        let mut order = lock_order(&mut tx, id, organization_id).await?;

        if has_active_journey(&mut tx, order.id).await? {
            return Err(invalid_transition(
                "Freight order",
                order.status,
                "be canceled while a journey is active",
            ));
        }

        order.cancel(Utc::now())?;
        save_order(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(order)
    }
}
