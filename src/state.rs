//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum. Se construye una sola vez a partir de la
//! configuración y de los repositorios elegidos.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::EnvironmentConfig;
use crate::repositories::Repositories;
use crate::services::{GpsQueue, NotificationEmitter, Services};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EnvironmentConfig>,
    pub services: Services,
}

/// Workers de segundo plano; terminan cuando se suelta el último emisor
pub struct BackgroundWorkers {
    pub notifications: JoinHandle<()>,
    pub gps: JoinHandle<()>,
}

impl AppState {
    /// Arranca los workers y arma los servicios sobre `repos`
    pub fn build(repos: Repositories, config: EnvironmentConfig) -> (Self, BackgroundWorkers) {
        let (notifier, notifications) =
            NotificationEmitter::spawn(repos.notifications.clone(), config.notification_queue_capacity);
        let (gps, gps_worker) = GpsQueue::spawn(repos.vehicles.clone(), config.gps_queue_capacity);

        let services = Services::new(&repos, &config, notifier, gps);
        let state = Self {
            config: Arc::new(config),
            services,
        };
        (
            state,
            BackgroundWorkers {
                notifications,
                gps: gps_worker,
            },
        )
    }
}
