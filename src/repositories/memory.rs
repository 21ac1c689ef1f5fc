//! Almacén en memoria para tests y demos locales
//!
//! Cada operación de escritura trabaja sobre una copia de las tablas y la
//! publica sólo si termina sin error, bajo un único mutex. Así las
//! operaciones de varios pasos son todo-o-nada igual que en Postgres.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{
    DashboardRepository, FineRepository, FreightOrderRepository, InventoryRepository,
    JourneyRepository, LegOutcome, NotificationRepository, Page, StopLeg, VehicleCostRepository,
    VehicleRepository,
};
use crate::models::{
    auth::Role,
    dashboard::{KmPerDay, VehiclePosition},
    fine::{Fine, FinePatch},
    freight_order::{FreightOrder, FreightStatus, NewFreightOrder},
    inventory::{
        InventoryItem, InventoryItemStatus, InventoryTransaction, ItemStatusChange,
        ItemStatusOutcome, NewPart, Part, PartWithStock, StockLevel, TransactionType,
    },
    journey::{Journey, JourneyEnd, JourneyFilters, NewJourney, TripDetails},
    notification::{NewNotification, Notification},
    vehicle::{
        LocationHistory, LocationPing, NewVehicle, Vehicle, VehicleStatus, VehicleTransition,
    },
    vehicle_cost::{CostType, NewVehicleCost, VehicleCost},
};
use crate::utils::errors::{invalid_transition, not_found_error, AppError, AppResult};

/// Puntos donde un test puede forzar un fallo de almacenamiento.
/// Cada fallo armado se dispara una sola vez.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    CostInsert,
    InventoryTransactionInsert,
    JourneyInsert,
    NotificationInsert,
    DashboardQuery,
}

#[derive(Debug, Default)]
struct Faults(Mutex<HashSet<FaultPoint>>);

impl Faults {
    fn check(&self, point: FaultPoint) -> AppResult<()> {
        let tripped = self
            .0
            .lock()
            .map(|mut armed| armed.remove(&point))
            .unwrap_or(false);
        if tripped {
            return Err(AppError::Database(sqlx::Error::Protocol(format!(
                "injected fault at {:?}",
                point
            ))));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct SeedUser {
    id: Uuid,
    organization_id: Uuid,
    role: Role,
}

#[derive(Debug, Clone)]
struct FuelLog {
    organization_id: Uuid,
    liters: f64,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    vehicles: HashMap<Uuid, Vehicle>,
    location_history: Vec<LocationHistory>,
    journeys: HashMap<Uuid, Journey>,
    freight_orders: HashMap<Uuid, FreightOrder>,
    parts: HashMap<Uuid, Part>,
    items: HashMap<Uuid, InventoryItem>,
    transactions: Vec<InventoryTransaction>,
    fines: HashMap<Uuid, Fine>,
    costs: HashMap<Uuid, VehicleCost>,
    notifications: HashMap<Uuid, Notification>,
    users: Vec<SeedUser>,
    documents: Vec<Uuid>,
    fuel_logs: Vec<FuelLog>,
}

impl Tables {
    fn vehicle_is_referenced(&self, id: Uuid) -> bool {
        self.journeys.values().any(|j| j.vehicle_id == id)
            || self.fines.values().any(|f| f.vehicle_id == id)
            || self.costs.values().any(|c| c.vehicle_id == id)
            || self.freight_orders.values().any(|o| o.vehicle_id == Some(id))
            || self
                .items
                .values()
                .any(|i| i.installed_on_vehicle_id == Some(id))
            || self
                .transactions
                .iter()
                .any(|tx| tx.related_vehicle_id == Some(id))
    }

    fn vehicle(&self, id: Uuid, organization_id: Uuid) -> AppResult<&Vehicle> {
        self.vehicles
            .get(&id)
            .filter(|v| v.organization_id == organization_id)
            .ok_or_else(|| not_found_error("Vehicle", id))
    }

    fn transition_vehicle(
        &mut self,
        id: Uuid,
        organization_id: Uuid,
        transition: VehicleTransition,
        now: DateTime<Utc>,
    ) -> AppResult<Vehicle> {
        let mut vehicle = self.vehicle(id, organization_id)?.clone();
        transition.apply(&mut vehicle, now)?;
        self.vehicles.insert(id, vehicle.clone());
        Ok(vehicle)
    }

    fn journey(&self, id: Uuid, organization_id: Uuid) -> AppResult<&Journey> {
        self.journeys
            .get(&id)
            .filter(|j| j.organization_id == organization_id)
            .ok_or_else(|| not_found_error("Journey", id))
    }

    fn start_journey(
        &mut self,
        new: NewJourney,
        faults: &Faults,
        now: DateTime<Utc>,
    ) -> AppResult<(Journey, Vehicle)> {
        let vehicle =
            self.transition_vehicle(new.vehicle_id, new.organization_id, VehicleTransition::Acquire, now)?;
        faults.check(FaultPoint::JourneyInsert)?;
        let journey = Journey::open(new, &vehicle, now);
        self.journeys.insert(journey.id, journey.clone());
        Ok((journey, vehicle))
    }

    fn end_journey(
        &mut self,
        mut journey: Journey,
        end: JourneyEnd,
        now: DateTime<Utc>,
    ) -> AppResult<(Journey, Vehicle)> {
        journey.finish(&end, now)?;
        let vehicle = self.transition_vehicle(
            journey.vehicle_id,
            journey.organization_id,
            VehicleTransition::Release {
                final_km: end.end_mileage,
                final_engine_hours: end.end_engine_hours,
            },
            now,
        )?;
        self.journeys.insert(journey.id, journey.clone());
        Ok((journey, vehicle))
    }

    fn order(&self, id: Uuid, organization_id: Uuid) -> AppResult<FreightOrder> {
        self.freight_orders
            .get(&id)
            .filter(|o| o.organization_id == organization_id)
            .cloned()
            .ok_or_else(|| not_found_error("Freight order", id))
    }

    fn order_has_active_journey(&self, order_id: Uuid) -> bool {
        self.journeys
            .values()
            .any(|j| j.is_active && j.freight_order_id == Some(order_id))
    }

    fn part(&self, id: Uuid, organization_id: Uuid) -> AppResult<&Part> {
        self.parts
            .get(&id)
            .filter(|p| p.organization_id == organization_id)
            .ok_or_else(|| not_found_error("Part", id))
    }

    fn available_count(&self, part_id: Uuid) -> i64 {
        self.items
            .values()
            .filter(|i| i.part_id == part_id && i.status == InventoryItemStatus::Disponivel)
            .count() as i64
    }

    fn with_stock(&self, part: &Part) -> PartWithStock {
        PartWithStock {
            part: part.clone(),
            available_stock: self.available_count(part.id),
        }
    }

    fn receive_items(
        &mut self,
        part: &Part,
        quantity: u32,
        kind: TransactionType,
        user_id: Uuid,
        notes: Option<String>,
        faults: &Faults,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<InventoryItem>> {
        let last = self
            .items
            .values()
            .filter(|i| i.part_id == part.id)
            .map(|i| i.item_identifier)
            .max()
            .unwrap_or(0);

        let mut items = Vec::with_capacity(quantity as usize);
        for offset in 1..=quantity as i32 {
            let (item, tx) = InventoryItem::receive(part, last + offset, kind, user_id, notes.clone(), now);
            self.items.insert(item.id, item.clone());
            faults.check(FaultPoint::InventoryTransactionInsert)?;
            self.transactions.push(tx);
            items.push(item);
        }
        Ok(items)
    }

    fn insert_cost(&mut self, cost: VehicleCost, faults: &Faults) -> AppResult<VehicleCost> {
        faults.check(FaultPoint::CostInsert)?;
        if let Some(fine_id) = cost.fine_id {
            if self.costs.values().any(|c| c.fine_id == Some(fine_id)) {
                return Err(AppError::Conflict(format!("fine {} already has a cost", fine_id)));
            }
        }
        self.costs.insert(cost.id, cost.clone());
        Ok(cost)
    }

    fn paired_cost_id(&self, fine_id: Uuid) -> Option<Uuid> {
        self.costs
            .values()
            .find(|c| c.fine_id == Some(fine_id))
            .map(|c| c.id)
    }

    fn fine(&self, id: Uuid, organization_id: Uuid) -> AppResult<Fine> {
        self.fines
            .get(&id)
            .filter(|f| f.organization_id == organization_id)
            .cloned()
            .ok_or_else(|| not_found_error("Fine", id))
    }

    fn closed_journeys_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> impl Iterator<Item = &Journey> {
        self.journeys.values().filter(move |j| {
            j.organization_id == organization_id && !j.is_active && j.start_time >= since
        })
    }
}

/// Implementación en memoria de todos los repositorios
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    faults: Faults,
    read_delay: Mutex<Option<Duration>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
    }

    /// Ejecuta `f` sobre una copia y la publica sólo si no hubo error
    fn atomically<T>(&self, f: impl FnOnce(&mut Tables, &Faults) -> AppResult<T>) -> AppResult<T> {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let out = f(&mut working, &self.faults)?;
        *guard = working;
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> AppResult<T> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    async fn dashboard_read<T>(&self, f: impl FnOnce(&Tables) -> T) -> AppResult<T> {
        let delay = self.read_delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.faults.check(FaultPoint::DashboardQuery)?;
        self.read(f)
    }

    /// Arma un fallo que se dispara en la próxima operación que pase por `point`
    pub fn fail_next(&self, point: FaultPoint) {
        if let Ok(mut armed) = self.faults.0.lock() {
            armed.insert(point);
        }
    }

    /// Retrasa las consultas del dashboard
    pub fn set_dashboard_delay(&self, delay: Option<Duration>) {
        if let Ok(mut current) = self.read_delay.lock() {
            *current = delay;
        }
    }

    pub fn seed_user(&self, organization_id: Uuid, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        if let Ok(mut tables) = self.lock() {
            tables.users.push(SeedUser {
                id,
                organization_id,
                role,
            });
        }
        id
    }

    pub fn seed_document(&self, organization_id: Uuid) {
        if let Ok(mut tables) = self.lock() {
            tables.documents.push(organization_id);
        }
    }

    pub fn seed_fuel_log(&self, organization_id: Uuid, liters: f64, timestamp: DateTime<Utc>) {
        if let Ok(mut tables) = self.lock() {
            tables.fuel_logs.push(FuelLog {
                organization_id,
                liters,
                timestamp,
            });
        }
    }

    /// Jornadas activas que referencian al vehículo
    pub fn active_journeys_for(&self, vehicle_id: Uuid) -> usize {
        self.read(|t| {
            t.journeys
                .values()
                .filter(|j| j.is_active && j.vehicle_id == vehicle_id)
                .count()
        })
        .unwrap_or(0)
    }

    pub fn journey_count(&self) -> usize {
        self.read(|t| t.journeys.len()).unwrap_or(0)
    }

    pub fn location_history_for(&self, vehicle_id: Uuid) -> Vec<LocationHistory> {
        self.read(|t| {
            t.location_history
                .iter()
                .filter(|h| h.vehicle_id == vehicle_id)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }

    /// Cantidad de filas del libro de inventario para una pieza
    pub fn transaction_count_for_part(&self, part_id: Uuid) -> usize {
        self.read(|t| t.transactions.iter().filter(|tx| tx.part_id == part_id).count())
            .unwrap_or(0)
    }

    pub fn item_count_for_part(&self, part_id: Uuid) -> usize {
        self.read(|t| t.items.values().filter(|i| i.part_id == part_id).count())
            .unwrap_or(0)
    }

    pub fn fine_count(&self) -> usize {
        self.read(|t| t.fines.len()).unwrap_or(0)
    }

    /// Borra el costo pareado de una multa para simular un libro inconsistente
    pub fn detach_cost_from_fine(&self, fine_id: Uuid) {
        if let Ok(mut tables) = self.lock() {
            tables.costs.retain(|_, c| c.fine_id != Some(fine_id));
        }
    }
}

#[async_trait]
impl VehicleRepository for InMemoryStore {
    async fn create(&self, new: NewVehicle) -> AppResult<Vehicle> {
        self.atomically(|t, _| {
            let duplicate = t.vehicles.values().any(|v| {
                v.organization_id == new.organization_id && v.license_plate == new.license_plate
            });
            if duplicate {
                return Err(AppError::Conflict("License plate already registered".to_string()));
            }
            let vehicle = Vehicle::from_new(new, Utc::now());
            t.vehicles.insert(vehicle.id, vehicle.clone());
            Ok(vehicle)
        })
    }

    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<Vehicle>> {
        self.read(|t| t.vehicle(id, organization_id).ok().cloned())
    }

    async fn list(&self, organization_id: Uuid) -> AppResult<Vec<Vehicle>> {
        self.read(|t| {
            let mut vehicles: Vec<Vehicle> = t
                .vehicles
                .values()
                .filter(|v| v.organization_id == organization_id)
                .cloned()
                .collect();
            vehicles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            vehicles
        })
    }

    async fn transition(
        &self,
        id: Uuid,
        organization_id: Uuid,
        transition: VehicleTransition,
    ) -> AppResult<Vehicle> {
        self.atomically(|t, _| t.transition_vehicle(id, organization_id, transition, Utc::now()))
    }

    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()> {
        self.atomically(|t, _| {
            if t.vehicle(id, organization_id)?.status == VehicleStatus::InUse {
                return Err(AppError::Conflict(
                    "Vehicle has an active journey and cannot be deleted".to_string(),
                ));
            }
            if t.vehicle_is_referenced(id) {
                return Err(AppError::Conflict(
                    "Vehicle has recorded history and cannot be deleted".to_string(),
                ));
            }
            t.vehicles.remove(&id);
            t.location_history.retain(|h| h.vehicle_id != id);
            Ok(())
        })
    }

    async fn record_position(&self, ping: &LocationPing) -> AppResult<()> {
        self.atomically(|t, _| {
            let vehicle = t
                .vehicles
                .get_mut(&ping.vehicle_id)
                .filter(|v| v.organization_id == ping.organization_id)
                .ok_or_else(|| not_found_error("Vehicle", ping.vehicle_id))?;
            vehicle.last_latitude = Some(ping.latitude);
            vehicle.last_longitude = Some(ping.longitude);
            vehicle.last_location_update = Some(ping.recorded_at);
            t.location_history.push(LocationHistory::from_ping(ping));
            Ok(())
        })
    }
}

#[async_trait]
impl JourneyRepository for InMemoryStore {
    async fn start(&self, new: NewJourney) -> AppResult<(Journey, Vehicle)> {
        self.atomically(|t, faults| t.start_journey(new, faults, Utc::now()))
    }

    async fn end(
        &self,
        id: Uuid,
        organization_id: Uuid,
        end: JourneyEnd,
    ) -> AppResult<(Journey, Vehicle)> {
        self.atomically(|t, _| {
            let journey = t.journey(id, organization_id)?.clone();
            journey.ensure_standalone()?;
            t.end_journey(journey, end, Utc::now())
        })
    }

    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<Journey>> {
        self.read(|t| t.journey(id, organization_id).ok().cloned())
    }

    async fn find_active_by_driver(
        &self,
        driver_id: Uuid,
        organization_id: Uuid,
    ) -> AppResult<Option<Journey>> {
        self.read(|t| {
            t.journeys
                .values()
                .filter(|j| {
                    j.is_active && j.driver_id == driver_id && j.organization_id == organization_id
                })
                .max_by_key(|j| j.start_time)
                .cloned()
        })
    }

    async fn list(
        &self,
        organization_id: Uuid,
        filters: &JourneyFilters,
        page: Page,
    ) -> AppResult<Vec<Journey>> {
        self.read(|t| {
            let mut journeys: Vec<Journey> = t
                .journeys
                .values()
                .filter(|j| j.organization_id == organization_id && filters.matches(j))
                .cloned()
                .collect();
            journeys.sort_by(|a, b| b.start_time.cmp(&a.start_time));
            page.slice(journeys)
        })
    }

    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()> {
        self.atomically(|t, _| {
            if t.journey(id, organization_id)?.is_active {
                return Err(AppError::Conflict(
                    "Active journeys must be ended before they can be deleted".to_string(),
                ));
            }
            t.journeys.remove(&id);
            Ok(())
        })
    }
}

#[async_trait]
impl FreightOrderRepository for InMemoryStore {
    async fn create(&self, new: NewFreightOrder) -> AppResult<FreightOrder> {
        self.atomically(|t, _| {
            let order = FreightOrder::from_new(new, Utc::now());
            t.freight_orders.insert(order.id, order.clone());
            Ok(order)
        })
    }

    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<FreightOrder>> {
        self.read(|t| t.order(id, organization_id).ok())
    }

    async fn list(&self, organization_id: Uuid, page: Page) -> AppResult<Vec<FreightOrder>> {
        self.read(|t| {
            let mut orders: Vec<FreightOrder> = t
                .freight_orders
                .values()
                .filter(|o| o.organization_id == organization_id)
                .cloned()
                .collect();
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            page.slice(orders)
        })
    }

    async fn list_by_status(
        &self,
        organization_id: Uuid,
        statuses: &[FreightStatus],
        driver_id: Option<Uuid>,
    ) -> AppResult<Vec<FreightOrder>> {
        self.read(|t| {
            let mut orders: Vec<FreightOrder> = t
                .freight_orders
                .values()
                .filter(|o| {
                    o.organization_id == organization_id
                        && statuses.contains(&o.status)
                        && driver_id.map_or(true, |d| o.driver_id == Some(d))
                })
                .cloned()
                .collect();
            orders.sort_by(|a, b| {
                (a.scheduled_start_time.is_none(), a.scheduled_start_time, a.created_at).cmp(&(
                    b.scheduled_start_time.is_none(),
                    b.scheduled_start_time,
                    b.created_at,
                ))
            });
            orders
        })
    }

    async fn claim(
        &self,
        id: Uuid,
        organization_id: Uuid,
        vehicle_id: Uuid,
        driver_id: Uuid,
    ) -> AppResult<FreightOrder> {
        self.atomically(|t, _| {
            let mut order = t.order(id, organization_id)?;
            t.vehicle(vehicle_id, organization_id)?;
            order.claim(vehicle_id, driver_id, Utc::now())?;
            t.freight_orders.insert(order.id, order.clone());
            Ok(order)
        })
    }

    async fn start_stop(&self, leg: StopLeg, details: TripDetails) -> AppResult<LegOutcome> {
        self.atomically(|t, faults| {
            let now = Utc::now();
            let mut order = t.order(leg.order_id, leg.organization_id)?;
            order.ensure_assigned_to(leg.driver_id)?;
            if t.order_has_active_journey(order.id) {
                return Err(invalid_transition(
                    "Freight order",
                    order.status,
                    "start a leg while another one is active",
                ));
            }
            order.begin_leg(leg.stop_point_id, now)?;

            let (journey, vehicle) = t.start_journey(
                NewJourney {
                    organization_id: leg.organization_id,
                    vehicle_id: order.assigned_vehicle()?,
                    driver_id: leg.driver_id,
                    details,
                    freight_order_id: Some(order.id),
                    stop_point_id: Some(leg.stop_point_id),
                },
                faults,
                now,
            )?;
            t.freight_orders.insert(order.id, order.clone());

            Ok(LegOutcome {
                order,
                journey,
                vehicle,
                delivered: false,
            })
        })
    }

    async fn complete_stop(
        &self,
        leg: StopLeg,
        journey_id: Uuid,
        end: JourneyEnd,
    ) -> AppResult<LegOutcome> {
        self.atomically(|t, _| {
            let now = Utc::now();
            let mut order = t.order(leg.order_id, leg.organization_id)?;
            order.ensure_assigned_to(leg.driver_id)?;

            let journey = t.journey(journey_id, leg.organization_id)?.clone();
            if !journey.is_active
                || journey.freight_order_id != Some(order.id)
                || journey.stop_point_id != Some(leg.stop_point_id)
            {
                return Err(AppError::InvalidTransition(format!(
                    "journey {} is not the active journey of stop point {}",
                    journey_id, leg.stop_point_id
                )));
            }

            let (journey, vehicle) = t.end_journey(journey, end, now)?;
            let delivered = order.complete_stop(leg.stop_point_id, now)?;
            t.freight_orders.insert(order.id, order.clone());

            Ok(LegOutcome {
                order,
                journey,
                vehicle,
                delivered,
            })
        })
    }

    async fn cancel(&self, id: Uuid, organization_id: Uuid) -> AppResult<FreightOrder> {
        self.atomically(|t, _| {
            let mut order = t.order(id, organization_id)?;
            if t.order_has_active_journey(order.id) {
                return Err(invalid_transition(
                    "Freight order",
                    order.status,
                    "be canceled while a journey is active",
                ));
            }
            order.cancel(Utc::now())?;
            t.freight_orders.insert(order.id, order.clone());
            Ok(order)
        })
    }
}

#[async_trait]
impl InventoryRepository for InMemoryStore {
    async fn create_part(
        &self,
        new: NewPart,
        initial_quantity: u32,
        user_id: Uuid,
    ) -> AppResult<(Part, Vec<InventoryItem>)> {
        self.atomically(|t, faults| {
            let now = Utc::now();
            let part = Part::from_new(new, now);
            t.parts.insert(part.id, part.clone());
            let items = t.receive_items(
                &part,
                initial_quantity,
                TransactionType::AjusteInicial,
                user_id,
                Some("Estoque inicial".to_string()),
                faults,
                now,
            )?;
            Ok((part, items))
        })
    }

    async fn find_part(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<PartWithStock>> {
        self.read(|t| t.part(id, organization_id).ok().map(|p| t.with_stock(p)))
    }

    async fn list_parts(
        &self,
        organization_id: Uuid,
        search: Option<&str>,
        page: Page,
    ) -> AppResult<Vec<PartWithStock>> {
        let needle = search.map(str::to_lowercase);
        self.read(|t| {
            let contains = |value: &Option<String>, needle: &str| {
                value
                    .as_deref()
                    .is_some_and(|v| v.to_lowercase().contains(needle))
            };
            let mut parts: Vec<&Part> = t
                .parts
                .values()
                .filter(|p| p.organization_id == organization_id)
                .filter(|p| match needle.as_deref() {
                    None => true,
                    Some(n) => {
                        p.name.to_lowercase().contains(n)
                            || contains(&p.part_number, n)
                            || contains(&p.brand, n)
                    }
                })
                .collect();
            parts.sort_by(|a, b| a.name.cmp(&b.name));
            page.slice(parts.into_iter().map(|p| t.with_stock(p)))
        })
    }

    async fn add_items(
        &self,
        part_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        quantity: u32,
        notes: Option<String>,
    ) -> AppResult<Vec<InventoryItem>> {
        self.atomically(|t, faults| {
            let part = t.part(part_id, organization_id)?.clone();
            t.receive_items(
                &part,
                quantity,
                TransactionType::Entrada,
                user_id,
                notes,
                faults,
                Utc::now(),
            )
        })
    }

    async fn set_item_status(&self, change: ItemStatusChange) -> AppResult<ItemStatusOutcome> {
        self.atomically(|t, faults| {
            let now = Utc::now();
            let mut item = t
                .items
                .get(&change.item_id)
                .filter(|i| i.organization_id == change.organization_id)
                .cloned()
                .ok_or_else(|| not_found_error("Inventory item", change.item_id))?;
            let part = t.part(item.part_id, change.organization_id)?.clone();
            if let Some(vehicle_id) = change.related_vehicle_id {
                t.vehicle(vehicle_id, change.organization_id)?;
            }

            let available_before = t.available_count(part.id);
            let transaction = item.transition(&change, now)?;
            t.items.insert(item.id, item.clone());
            faults.check(FaultPoint::InventoryTransactionInsert)?;
            t.transactions.push(transaction.clone());

            let cost = match (
                transaction.transaction_type,
                part.billable_value(),
                item.installed_on_vehicle_id,
            ) {
                (TransactionType::Instalacao, Some(amount), Some(vehicle_id)) => Some(t.insert_cost(
                    VehicleCost::for_installation(&part, &item, vehicle_id, amount, now),
                    faults,
                )?),
                _ => None,
            };

            let available_after = t.available_count(part.id);
            Ok(ItemStatusOutcome {
                stock: StockLevel {
                    part_id: part.id,
                    minimum_stock: part.minimum_stock,
                    available_before,
                    available_after,
                },
                item,
                part,
                transaction,
                cost,
            })
        })
    }

    async fn items_for_part(
        &self,
        part_id: Uuid,
        organization_id: Uuid,
        status: Option<InventoryItemStatus>,
    ) -> AppResult<Vec<InventoryItem>> {
        self.read(|t| {
            let mut items: Vec<InventoryItem> = t
                .items
                .values()
                .filter(|i| {
                    i.part_id == part_id
                        && i.organization_id == organization_id
                        && status.map_or(true, |s| i.status == s)
                })
                .cloned()
                .collect();
            items.sort_by_key(|i| i.item_identifier);
            items
        })
    }

    async fn history(
        &self,
        part_id: Uuid,
        organization_id: Uuid,
        page: Page,
    ) -> AppResult<Vec<InventoryTransaction>> {
        self.read(|t| {
            // Orden de inserción inverso; estable con timestamps iguales
            let transactions = t
                .transactions
                .iter()
                .rev()
                .filter(|tx| tx.part_id == part_id && tx.organization_id == organization_id)
                .cloned();
            page.slice(transactions)
        })
    }
}

#[async_trait]
impl FineRepository for InMemoryStore {
    async fn create(&self, fine: Fine) -> AppResult<(Fine, VehicleCost)> {
        self.atomically(|t, faults| {
            t.vehicle(fine.vehicle_id, fine.organization_id)?;
            t.fines.insert(fine.id, fine.clone());
            let cost = t.insert_cost(VehicleCost::for_fine(&fine, Utc::now()), faults)?;
            Ok((fine, cost))
        })
    }

    async fn update(
        &self,
        id: Uuid,
        organization_id: Uuid,
        patch: &FinePatch,
    ) -> AppResult<(Fine, VehicleCost)> {
        self.atomically(|t, faults| {
            let now = Utc::now();
            let mut fine = t.fine(id, organization_id)?;
            let cost_id = t.paired_cost_id(id).ok_or_else(|| {
                tracing::error!("Fine {} has no paired vehicle cost", id);
                AppError::LedgerInconsistency(format!("fine {} has no paired vehicle cost", id))
            })?;
            if let Some(vehicle_id) = patch.vehicle_id {
                t.vehicle(vehicle_id, organization_id)?;
            }

            fine.apply_patch(patch, now)?;
            t.fines.insert(fine.id, fine.clone());

            let mut cost = t
                .costs
                .get(&cost_id)
                .cloned()
                .ok_or_else(|| AppError::LedgerInconsistency(format!("cost {} vanished", cost_id)))?;
            if patch.touches_cost() {
                faults.check(FaultPoint::CostInsert)?;
                cost.sync_with_fine(&fine, now);
                t.costs.insert(cost.id, cost.clone());
            }
            Ok((fine, cost))
        })
    }

    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()> {
        self.atomically(|t, _| {
            t.fine(id, organization_id)?;
            let cost_id = t.paired_cost_id(id).ok_or_else(|| {
                tracing::error!("Fine {} had no paired vehicle cost at deletion", id);
                AppError::LedgerInconsistency(format!("fine {} has no paired vehicle cost", id))
            })?;
            t.costs.remove(&cost_id);
            t.fines.remove(&id);
            Ok(())
        })
    }

    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<Fine>> {
        self.read(|t| t.fine(id, organization_id).ok())
    }

    async fn list(
        &self,
        organization_id: Uuid,
        driver_id: Option<Uuid>,
        page: Page,
    ) -> AppResult<Vec<Fine>> {
        self.read(|t| {
            let mut fines: Vec<Fine> = t
                .fines
                .values()
                .filter(|f| {
                    f.organization_id == organization_id
                        && driver_id.map_or(true, |d| f.driver_id == Some(d))
                })
                .cloned()
                .collect();
            fines.sort_by(|a, b| (b.date, b.created_at).cmp(&(a.date, a.created_at)));
            page.slice(fines)
        })
    }
}

#[async_trait]
impl VehicleCostRepository for InMemoryStore {
    async fn create(&self, new: NewVehicleCost) -> AppResult<VehicleCost> {
        self.atomically(|t, faults| {
            t.vehicle(new.vehicle_id, new.organization_id)?;
            t.insert_cost(VehicleCost::from_new(new, Utc::now()), faults)
        })
    }

    async fn find_by_id(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<VehicleCost>> {
        self.read(|t| {
            t.costs
                .get(&id)
                .filter(|c| c.organization_id == organization_id)
                .cloned()
        })
    }

    async fn list(
        &self,
        organization_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<Vec<VehicleCost>> {
        self.read(|t| {
            let mut costs: Vec<VehicleCost> = t
                .costs
                .values()
                .filter(|c| {
                    c.organization_id == organization_id
                        && from.map_or(true, |f| c.date >= f)
                        && to.map_or(true, |to| c.date <= to)
                })
                .cloned()
                .collect();
            costs.sort_by(|a, b| (b.date, b.created_at).cmp(&(a.date, a.created_at)));
            costs
        })
    }

    async fn delete(&self, id: Uuid, organization_id: Uuid) -> AppResult<()> {
        self.atomically(|t, _| {
            let cost = t
                .costs
                .get(&id)
                .filter(|c| c.organization_id == organization_id)
                .ok_or_else(|| not_found_error("Vehicle cost", id))?;
            if cost.fine_id.is_some() {
                return Err(AppError::Conflict(
                    "Cost is linked to a fine; delete the fine instead".to_string(),
                ));
            }
            t.costs.remove(&id);
            Ok(())
        })
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn insert(&self, new: NewNotification) -> AppResult<Notification> {
        self.atomically(|t, faults| {
            faults.check(FaultPoint::NotificationInsert)?;
            let notification = Notification::from_new(new, Utc::now());
            t.notifications.insert(notification.id, notification.clone());
            Ok(notification)
        })
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        page: Page,
    ) -> AppResult<Vec<Notification>> {
        self.read(|t| {
            let mut notifications: Vec<Notification> = t
                .notifications
                .values()
                .filter(|n| n.user_id == user_id && n.organization_id == organization_id)
                .cloned()
                .collect();
            notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            page.slice(notifications)
        })
    }

    async fn unread_count(&self, user_id: Uuid, organization_id: Uuid) -> AppResult<i64> {
        self.read(|t| {
            t.notifications
                .values()
                .filter(|n| n.user_id == user_id && n.organization_id == organization_id && !n.is_read)
                .count() as i64
        })
    }

    async fn mark_as_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> AppResult<Notification> {
        self.atomically(|t, _| {
            let notification = t
                .notifications
                .get_mut(&id)
                .filter(|n| n.user_id == user_id && n.organization_id == organization_id)
                .ok_or_else(|| not_found_error("Notification", id))?;
            notification.is_read = true;
            Ok(notification.clone())
        })
    }
}

#[async_trait]
impl DashboardRepository for InMemoryStore {
    async fn count_vehicles(&self, organization_id: Uuid) -> AppResult<i64> {
        self.dashboard_read(|t| {
            t.vehicles
                .values()
                .filter(|v| v.organization_id == organization_id)
                .count() as i64
        })
        .await
    }

    async fn count_drivers(&self, organization_id: Uuid) -> AppResult<i64> {
        self.dashboard_read(|t| {
            t.users
                .iter()
                .filter(|u| u.organization_id == organization_id && u.role == Role::Driver)
                .count() as i64
        })
        .await
    }

    async fn count_users(&self, organization_id: Uuid) -> AppResult<i64> {
        self.dashboard_read(|t| {
            t.users
                .iter()
                .filter(|u| u.organization_id == organization_id)
                .count() as i64
        })
        .await
    }

    async fn count_parts(&self, organization_id: Uuid) -> AppResult<i64> {
        self.dashboard_read(|t| {
            t.parts
                .values()
                .filter(|p| p.organization_id == organization_id)
                .count() as i64
        })
        .await
    }

    async fn count_documents(&self, organization_id: Uuid) -> AppResult<i64> {
        self.dashboard_read(|t| t.documents.iter().filter(|o| **o == organization_id).count() as i64)
            .await
    }

    async fn count_fines_since(&self, organization_id: Uuid, since: DateTime<Utc>) -> AppResult<i64> {
        self.dashboard_read(|t| {
            t.fines
                .values()
                .filter(|f| f.organization_id == organization_id && f.created_at >= since)
                .count() as i64
        })
        .await
    }

    async fn count_freight_orders_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<i64> {
        self.dashboard_read(|t| {
            t.freight_orders
                .values()
                .filter(|o| o.organization_id == organization_id && o.created_at >= since)
                .count() as i64
        })
        .await
    }

    async fn sum_distance_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
        driver_id: Option<Uuid>,
    ) -> AppResult<f64> {
        self.dashboard_read(|t| {
            t.closed_journeys_since(organization_id, since)
                .filter(|j| driver_id.map_or(true, |d| j.driver_id == d))
                .filter_map(Journey::distance)
                .map(f64::from)
                .sum()
        })
        .await
    }

    async fn sum_fuel_since(&self, organization_id: Uuid, since: DateTime<Utc>) -> AppResult<f64> {
        self.dashboard_read(|t| {
            t.fuel_logs
                .iter()
                .filter(|f| f.organization_id == organization_id && f.timestamp >= since)
                .map(|f| f.liters)
                .sum()
        })
        .await
    }

    async fn costs_by_category_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<(CostType, Decimal)>> {
        let since = since.date_naive();
        self.dashboard_read(|t| {
            let mut totals: HashMap<CostType, Decimal> = HashMap::new();
            for cost in t
                .costs
                .values()
                .filter(|c| c.organization_id == organization_id && c.date >= since)
            {
                *totals.entry(cost.cost_type).or_insert(Decimal::ZERO) += cost.amount;
            }
            totals.into_iter().collect()
        })
        .await
    }

    async fn km_per_day_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<KmPerDay>> {
        self.dashboard_read(|t| {
            let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
            for journey in t.journeys.values().filter(|j| j.organization_id == organization_id) {
                if let (Some(end_time), Some(distance)) = (journey.end_time, journey.distance()) {
                    if end_time >= since {
                        *per_day.entry(end_time.date_naive()).or_insert(0.0) += f64::from(distance);
                    }
                }
            }
            per_day
                .into_iter()
                .map(|(date, total)| KmPerDay { date, total })
                .collect()
        })
        .await
    }

    async fn vehicle_positions(&self, organization_id: Uuid) -> AppResult<Vec<VehiclePosition>> {
        self.dashboard_read(|t| {
            let mut positions: Vec<VehiclePosition> = t
                .vehicles
                .values()
                .filter(|v| v.organization_id == organization_id)
                .filter_map(|v| match (v.last_latitude, v.last_longitude, v.last_location_update) {
                    (Some(latitude), Some(longitude), Some(timestamp)) => Some(VehiclePosition {
                        vehicle_id: v.id,
                        license_plate: v.license_plate.clone(),
                        latitude,
                        longitude,
                        timestamp,
                    }),
                    _ => None,
                })
                .collect();
            positions.sort_by(|a, b| a.license_plate.cmp(&b.license_plate));
            positions
        })
        .await
    }

    async fn count_journeys(&self, organization_id: Uuid, driver_id: Uuid) -> AppResult<i64> {
        self.dashboard_read(|t| {
            t.journeys
                .values()
                .filter(|j| j.organization_id == organization_id && j.driver_id == driver_id)
                .count() as i64
        })
        .await
    }

    async fn count_pending_freight_for_driver(
        &self,
        organization_id: Uuid,
        driver_id: Uuid,
    ) -> AppResult<i64> {
        self.dashboard_read(|t| {
            t.freight_orders
                .values()
                .filter(|o| {
                    o.organization_id == organization_id
                        && o.driver_id == Some(driver_id)
                        && matches!(o.status, FreightStatus::Claimed | FreightStatus::InTransit)
                })
                .count() as i64
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_vehicle(org: Uuid) -> NewVehicle {
        NewVehicle {
            organization_id: org,
            license_plate: "RIO2A18".to_string(),
            brand: "Mercedes".to_string(),
            model: "Actros".to_string(),
            year: 2022,
            current_km: 0,
            current_engine_hours: None,
        }
    }

    #[tokio::test]
    async fn test_failed_operation_leaves_no_trace() {
        let store = InMemoryStore::new();
        let org = Uuid::new_v4();
        let vehicle = VehicleRepository::create(&store, new_vehicle(org)).await.unwrap();

        store.fail_next(FaultPoint::JourneyInsert);
        let err = JourneyRepository::start(
            &store,
            NewJourney {
                organization_id: org,
                vehicle_id: vehicle.id,
                driver_id: Uuid::new_v4(),
                details: TripDetails::default(),
                freight_order_id: None,
                stop_point_id: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));

        let vehicle = VehicleRepository::find_by_id(&store, vehicle.id, org)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vehicle.status, VehicleStatus::Available);
        assert_eq!(store.journey_count(), 0);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let store = InMemoryStore::new();
        let org = Uuid::new_v4();
        let vehicle = VehicleRepository::create(&store, new_vehicle(org)).await.unwrap();

        let other = Uuid::new_v4();
        assert!(VehicleRepository::find_by_id(&store, vehicle.id, other)
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            VehicleRepository::transition(&store, vehicle.id, other, VehicleTransition::Acquire).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_plate_conflicts() {
        let store = InMemoryStore::new();
        let org = Uuid::new_v4();
        VehicleRepository::create(&store, new_vehicle(org)).await.unwrap();
        assert!(matches!(
            VehicleRepository::create(&store, new_vehicle(org)).await,
            Err(AppError::Conflict(_))
        ));
        assert!(VehicleRepository::create(&store, new_vehicle(Uuid::new_v4()))
            .await
            .is_ok());
    }
}
