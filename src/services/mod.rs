//! Services module
//!
//! Lógica de negocio del núcleo operativo. Cada servicio recibe el
//! `Principal` del llamador y delega las transiciones atómicas en los
//! repositorios.

pub mod dashboard_service;
pub mod fine_service;
pub mod freight_order_service;
pub mod gps_service;
pub mod inventory_service;
pub mod journey_service;
pub mod notification_service;
pub mod vehicle_cost_service;
pub mod vehicle_service;

use std::sync::Arc;

use crate::config::EnvironmentConfig;
use crate::repositories::Repositories;

pub use dashboard_service::DashboardService;
pub use fine_service::FineService;
pub use freight_order_service::FreightOrderService;
pub use gps_service::GpsQueue;
pub use inventory_service::InventoryService;
pub use journey_service::JourneyService;
pub use notification_service::{NotificationEmitter, NotificationService};
pub use vehicle_cost_service::VehicleCostService;
pub use vehicle_service::VehicleService;

/// Todos los servicios, construidos una vez sobre el mismo almacenamiento
#[derive(Clone)]
pub struct Services {
    pub vehicles: Arc<VehicleService>,
    pub journeys: Arc<JourneyService>,
    pub freight_orders: Arc<FreightOrderService>,
    pub inventory: Arc<InventoryService>,
    pub fines: Arc<FineService>,
    pub costs: Arc<VehicleCostService>,
    pub notifications: Arc<NotificationService>,
    pub dashboard: Arc<DashboardService>,
    pub gps: GpsQueue,
}

impl Services {
    pub fn new(
        repos: &Repositories,
        config: &EnvironmentConfig,
        notifier: NotificationEmitter,
        gps: GpsQueue,
    ) -> Self {
        Self {
            vehicles: Arc::new(VehicleService::new(repos.vehicles.clone())),
            journeys: Arc::new(JourneyService::new(repos.journeys.clone(), notifier.clone())),
            freight_orders: Arc::new(FreightOrderService::new(
                repos.freight_orders.clone(),
                notifier.clone(),
            )),
            inventory: Arc::new(InventoryService::new(repos.inventory.clone(), notifier.clone())),
            fines: Arc::new(FineService::new(repos.fines.clone(), notifier)),
            costs: Arc::new(VehicleCostService::new(repos.costs.clone())),
            notifications: Arc::new(NotificationService::new(repos.notifications.clone())),
            dashboard: Arc::new(DashboardService::new(
                repos.dashboard.clone(),
                repos.journeys.clone(),
                config.dashboard_timeout,
                config.demo_limits,
            )),
            gps,
        }
    }
}
