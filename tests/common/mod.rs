#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use fleet_ops::config::EnvironmentConfig;
use fleet_ops::models::auth::{Principal, Role};
use fleet_ops::models::notification::NewNotification;
use fleet_ops::models::vehicle::{NewVehicle, Vehicle};
use fleet_ops::repositories::memory::InMemoryStore;
use fleet_ops::repositories::Repositories;
use fleet_ops::services::{GpsQueue, NotificationEmitter, Services};

pub const JWT_SECRET: &str = "integration-secret";

pub fn test_config(dashboard_timeout_ms: u64) -> EnvironmentConfig {
    EnvironmentConfig::from_lookup(|key| match key {
        "JWT_SECRET" => Some(JWT_SECRET.to_string()),
        "DASHBOARD_TIMEOUT_MS" => Some(dashboard_timeout_ms.to_string()),
        _ => None,
    })
    .unwrap()
}

/// Servicios sobre el store en memoria; las notificaciones quedan en `events`
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub repos: Repositories,
    pub services: Services,
    pub events: mpsc::Receiver<NewNotification>,
    pub org: Uuid,
    pub manager: Principal,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let repos = Repositories::in_memory(store.clone());
        let config = test_config(timeout.as_millis() as u64);
        let (notifier, events) = NotificationEmitter::channel(64);
        let (gps, _gps_rx) = GpsQueue::channel(16);
        let services = Services::new(&repos, &config, notifier, gps);

        let org = Uuid::new_v4();
        let manager_id = store.seed_user(org, Role::ClienteAtivo);
        Self {
            store,
            repos,
            services,
            events,
            org,
            manager: Principal::new(manager_id, org, Role::ClienteAtivo),
        }
    }

    pub fn driver(&self) -> Principal {
        Principal::new(self.store.seed_user(self.org, Role::Driver), self.org, Role::Driver)
    }

    pub async fn vehicle(&self, plate: &str) -> Vehicle {
        self.services
            .vehicles
            .create(
                &self.manager,
                NewVehicle {
                    organization_id: self.org,
                    license_plate: plate.to_string(),
                    brand: "Volvo".to_string(),
                    model: "FH 540".to_string(),
                    year: 2021,
                    current_km: 0,
                    current_engine_hours: None,
                },
            )
            .await
            .unwrap()
    }

    /// Vacía la cola de notificaciones emitidas hasta ahora
    pub fn drain_events(&mut self) -> Vec<NewNotification> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
