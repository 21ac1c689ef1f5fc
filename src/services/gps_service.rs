//! Cola de posiciones GPS
//!
//! Los pings se aceptan sin esperar a la base de datos; un worker los
//! aplica en orden de llegada.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::auth::Principal;
use crate::models::vehicle::LocationPing;
use crate::repositories::VehicleRepository;

#[derive(Clone)]
pub struct GpsQueue {
    tx: mpsc::Sender<LocationPing>,
}

impl GpsQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LocationPing>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn spawn(vehicles: Arc<dyn VehicleRepository>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::channel(capacity);
        let handle = tokio::spawn(run_worker(rx, vehicles));
        (queue, handle)
    }

    /// Encola un ping; devuelve `false` si se descartó
    pub fn record_position(
        &self,
        principal: &Principal,
        vehicle_id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> bool {
        let ping = LocationPing {
            organization_id: principal.organization_id,
            vehicle_id,
            latitude,
            longitude,
            recorded_at: Utc::now(),
        };
        match self.tx.try_send(ping) {
            Ok(()) => true,
            Err(TrySendError::Full(ping)) => {
                warn!("GPS queue full, dropping ping for vehicle {}", ping.vehicle_id);
                false
            }
            Err(TrySendError::Closed(ping)) => {
                warn!("GPS worker stopped, dropping ping for vehicle {}", ping.vehicle_id);
                false
            }
        }
    }
}

async fn run_worker(mut rx: mpsc::Receiver<LocationPing>, vehicles: Arc<dyn VehicleRepository>) {
    info!("GPS worker started");
    while let Some(ping) = rx.recv().await {
        if let Err(e) = vehicles.record_position(&ping).await {
            error!("Failed to record position for vehicle {}: {}", ping.vehicle_id, e);
        }
    }
    info!("GPS worker stopped");
}
