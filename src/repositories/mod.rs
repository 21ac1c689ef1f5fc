//! Capa de persistencia
//!
//! Cada agregado expone un trait async. Hay dos implementaciones: Postgres
//! (`Pg*Repository`) y memoria (`memory::InMemoryStore`). Las operaciones de
//! varios pasos son atómicas en ambas.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    dashboard::{KmPerDay, VehiclePosition},
    fine::{Fine, FinePatch},
    freight_order::{FreightOrder, FreightStatus, NewFreightOrder},
    inventory::{
        InventoryItem, InventoryItemStatus, InventoryTransaction, ItemStatusChange,
        ItemStatusOutcome, NewPart, Part, PartWithStock,
    },
    journey::{Journey, JourneyEnd, JourneyFilters, NewJourney, TripDetails},
    notification::{NewNotification, Notification},
    vehicle::{LocationPing, NewVehicle, Vehicle, VehicleTransition},
    vehicle_cost::{CostType, NewVehicleCost, VehicleCost},
};
use crate::utils::errors::AppResult;

pub mod dashboard_repository;
pub mod fine_repository;
pub mod freight_order_repository;
pub mod inventory_repository;
pub mod journey_repository;
pub mod memory;
pub mod notification_repository;
pub mod vehicle_cost_repository;
pub mod vehicle_repository;

pub use dashboard_repository::PgDashboardRepository;
pub use fine_repository::PgFineRepository;
pub use freight_order_repository::PgFreightOrderRepository;
pub use inventory_repository::PgInventoryRepository;
pub use journey_repository::PgJourneyRepository;
pub use memory::InMemoryStore;
pub use notification_repository::PgNotificationRepository;
pub use vehicle_cost_repository::PgVehicleCostRepository;
pub use vehicle_repository::PgVehicleRepository;

/// Paginación simple skip/limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub const MAX_LIMIT: i64 = 500;

    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            skip: skip.unwrap_or(0).max(0),
            limit: limit.unwrap_or(100).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub(crate) fn slice<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Identifica una parada operada por un conductor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopLeg {
    pub order_id: Uuid,
    pub stop_point_id: Uuid,
    pub driver_id: Uuid,
    pub organization_id: Uuid,
}

/// Resultado de iniciar o cerrar un tramo de una orden de flete
#[derive(Debug, Clone, serde::Serialize)]
pub struct LegOutcome {
    pub order: FreightOrder,
    pub journey: Journey,
    pub vehicle: Vehicle,
    pub delivered: bool,
}

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn create(&self, new: NewVehicle) -> AppResult<Vehicle>;
    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<Vehicle>>;
    async fn list(&self, organization_id: Uuid) -> AppResult<Vec<Vehicle>>;
    /// Check-and-set atómico sobre el estado del vehículo
    async fn transition(
        &self,
        id: Uuid,
        organization_id: Uuid,
        transition: VehicleTransition,
    ) -> AppResult<Vehicle>;
    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()>;
    async fn record_position(&self, ping: &LocationPing) -> AppResult<()>;
}

#[async_trait]
pub trait JourneyRepository: Send + Sync {
    /// Adquiere el vehículo y crea la jornada en una misma unidad atómica
    async fn start(&self, new: NewJourney) -> AppResult<(Journey, Vehicle)>;
    /// Cierra la jornada y libera el vehículo en una misma unidad atómica
    async fn end(
        &self,
        id: Uuid,
        organization_id: Uuid,
        end: JourneyEnd,
    ) -> AppResult<(Journey, Vehicle)>;
    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<Journey>>;
    async fn find_active_by_driver(
        &self,
        driver_id: Uuid,
        organization_id: Uuid,
    ) -> AppResult<Option<Journey>>;
    async fn list(
        &self,
        organization_id: Uuid,
        filters: &JourneyFilters,
        page: Page,
    ) -> AppResult<Vec<Journey>>;
    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait FreightOrderRepository: Send + Sync {
    async fn create(&self, new: NewFreightOrder) -> AppResult<FreightOrder>;
    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<FreightOrder>>;
    async fn list(&self, organization_id: Uuid, page: Page) -> AppResult<Vec<FreightOrder>>;
    async fn list_by_status(
        &self,
        organization_id: Uuid,
        statuses: &[FreightStatus],
        driver_id: Option<Uuid>,
    ) -> AppResult<Vec<FreightOrder>>;
    async fn claim(
        &self,
        id: Uuid,
        organization_id: Uuid,
        vehicle_id: Uuid,
        driver_id: Uuid,
    ) -> AppResult<FreightOrder>;
    async fn start_stop(&self, leg: StopLeg, details: TripDetails) -> AppResult<LegOutcome>;
    async fn complete_stop(
        &self,
        leg: StopLeg,
        journey_id: Uuid,
        end: JourneyEnd,
    ) -> AppResult<LegOutcome>;
    async fn cancel(&self, id: Uuid, organization_id: Uuid) -> AppResult<FreightOrder>;
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Crea la pieza y su stock inicial (tipo AjusteInicial)
    async fn create_part(
        &self,
        new: NewPart,
        initial_quantity: u32,
        user_id: Uuid,
    ) -> AppResult<(Part, Vec<InventoryItem>)>;
    async fn find_part(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<PartWithStock>>;
    async fn list_parts(
        &self,
        organization_id: Uuid,
        search: Option<&str>,
        page: Page,
    ) -> AppResult<Vec<PartWithStock>>;
    /// Alta de `quantity` ítems, cada uno con su transacción Entrada; todo o nada
    async fn add_items(
        &self,
        part_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        quantity: u32,
        notes: Option<String>,
    ) -> AppResult<Vec<InventoryItem>>;
    async fn set_item_status(&self, change: ItemStatusChange) -> AppResult<ItemStatusOutcome>;
    async fn items_for_part(
        &self,
        part_id: Uuid,
        organization_id: Uuid,
        status: Option<InventoryItemStatus>,
    ) -> AppResult<Vec<InventoryItem>>;
    async fn history(
        &self,
        part_id: Uuid,
        organization_id: Uuid,
        page: Page,
    ) -> AppResult<Vec<InventoryTransaction>>;
}

#[async_trait]
pub trait FineRepository: Send + Sync {
    /// Inserta la multa y su costo pareado en una sola transacción
    async fn create(&self, fine: Fine) -> AppResult<(Fine, VehicleCost)>;
    async fn update(
        &self,
        id: Uuid,
        organization_id: Uuid,
        patch: &FinePatch,
    ) -> AppResult<(Fine, VehicleCost)>;
    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()>;
    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<Fine>>;
    async fn list(
        &self,
        organization_id: Uuid,
        driver_id: Option<Uuid>,
        page: Page,
    ) -> AppResult<Vec<Fine>>;
}

#[async_trait]
pub trait VehicleCostRepository: Send + Sync {
    async fn create(&self, new: NewVehicleCost) -> AppResult<VehicleCost>;
    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<VehicleCost>>;
    async fn list(
        &self,
        organization_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<Vec<VehicleCost>>;
    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, new: NewNotification) -> AppResult<Notification>;
    async fn list_for_user(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        page: Page,
    ) -> AppResult<Vec<Notification>>;
    async fn unread_count(&self, user_id: Uuid, organization_id: Uuid) -> AppResult<i64>;
    async fn mark_as_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> AppResult<Notification>;
}

/// Consultas de sólo lectura usadas por el agregador de dashboards
#[async_trait]
pub trait DashboardRepository: Send + Sync {
    async fn count_vehicles(&self, organization_id: Uuid) -> AppResult<i64>;
    async fn count_drivers(&self, organization_id: Uuid) -> AppResult<i64>;
    async fn count_users(&self, organization_id: Uuid) -> AppResult<i64>;
    async fn count_parts(&self, organization_id: Uuid) -> AppResult<i64>;
    async fn count_documents(&self, organization_id: Uuid) -> AppResult<i64>;
    async fn count_fines_since(&self, organization_id: Uuid, since: DateTime<Utc>) -> AppResult<i64>;
    async fn count_freight_orders_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<i64>;
    /// Distancia de jornadas cerradas desde `since`, opcionalmente de un conductor
    async fn sum_distance_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
        driver_id: Option<Uuid>,
    ) -> AppResult<f64>;
    async fn sum_fuel_since(&self, organization_id: Uuid, since: DateTime<Utc>) -> AppResult<f64>;
    async fn costs_by_category_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<(CostType, Decimal)>>;
    async fn km_per_day_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<KmPerDay>>;
    async fn vehicle_positions(&self, organization_id: Uuid) -> AppResult<Vec<VehiclePosition>>;
    async fn count_journeys(&self, organization_id: Uuid, driver_id: Uuid) -> AppResult<i64>;
    async fn count_pending_freight_for_driver(
        &self,
        organization_id: Uuid,
        driver_id: Uuid,
    ) -> AppResult<i64>;
}

/// Conjunto de repositorios inyectado en los servicios
#[derive(Clone)]
pub struct Repositories {
    pub vehicles: Arc<dyn VehicleRepository>,
    pub journeys: Arc<dyn JourneyRepository>,
    pub freight_orders: Arc<dyn FreightOrderRepository>,
    pub inventory: Arc<dyn InventoryRepository>,
    pub fines: Arc<dyn FineRepository>,
    pub costs: Arc<dyn VehicleCostRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub dashboard: Arc<dyn DashboardRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            vehicles: Arc::new(PgVehicleRepository::new(pool.clone())),
            journeys: Arc::new(PgJourneyRepository::new(pool.clone())),
            freight_orders: Arc::new(PgFreightOrderRepository::new(pool.clone())),
            inventory: Arc::new(PgInventoryRepository::new(pool.clone())),
            fines: Arc::new(PgFineRepository::new(pool.clone())),
            costs: Arc::new(PgVehicleCostRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            dashboard: Arc::new(PgDashboardRepository::new(pool)),
        }
    }

    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            vehicles: store.clone(),
            journeys: store.clone(),
            freight_orders: store.clone(),
            inventory: store.clone(),
            fines: store.clone(),
            costs: store.clone(),
            notifications: store.clone(),
            dashboard: store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let page = Page::new(Some(-5), Some(10_000));
        assert_eq!(page.skip, 0);
        assert_eq!(page.limit, Page::MAX_LIMIT);
        assert_eq!(Page::new(Some(2), Some(2)).slice(1..=10), vec![3, 4]);
    }
}
