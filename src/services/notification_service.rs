//! Notificaciones
//!
//! `NotificationEmitter` es el canal de efectos secundarios: `emit` nunca
//! bloquea ni falla al llamador. Un único worker consume la cola y persiste
//! cada evento; los fallos sólo se registran en el log.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::auth::Principal;
use crate::models::notification::{NewNotification, Notification};
use crate::repositories::{NotificationRepository, Page};
use crate::utils::errors::AppResult;

#[derive(Clone)]
pub struct NotificationEmitter {
    tx: mpsc::Sender<NewNotification>,
}

impl NotificationEmitter {
    /// Emisor con la cola expuesta; útil para inspeccionar eventos en tests
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NewNotification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Emisor con su worker de persistencia ya arrancado
    pub fn spawn(repo: Arc<dyn NotificationRepository>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (emitter, rx) = Self::channel(capacity);
        let handle = tokio::spawn(run_worker(rx, repo));
        (emitter, handle)
    }

    pub fn emit(&self, notification: NewNotification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => warn!(
                "Notification queue full, dropping {:?} for user {}",
                dropped.notification_type, dropped.user_id
            ),
            Err(TrySendError::Closed(dropped)) => warn!(
                "Notification worker stopped, dropping {:?} for user {}",
                dropped.notification_type, dropped.user_id
            ),
        }
    }
}

async fn run_worker(mut rx: mpsc::Receiver<NewNotification>, repo: Arc<dyn NotificationRepository>) {
    info!("Notification worker started");
    while let Some(notification) = rx.recv().await {
        let kind = notification.notification_type;
        match repo.insert(notification).await {
            Ok(saved) => debug!("Notification {} stored ({:?})", saved.id, kind),
            Err(e) => error!("Failed to store {:?} notification: {}", kind, e),
        }
    }
    info!("Notification worker stopped");
}

/// Lectura de la bandeja de notificaciones del usuario
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, principal: &Principal, page: Page) -> AppResult<Vec<Notification>> {
        self.repo
            .list_for_user(principal.user_id, principal.organization_id, page)
            .await
    }

    pub async fn unread_count(&self, principal: &Principal) -> AppResult<i64> {
        self.repo
            .unread_count(principal.user_id, principal.organization_id)
            .await
    }

    pub async fn mark_as_read(&self, principal: &Principal, id: Uuid) -> AppResult<Notification> {
        self.repo
            .mark_as_read(id, principal.user_id, principal.organization_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::NotificationType;
    use crate::repositories::InMemoryStore;

    fn sample(user_id: Uuid) -> NewNotification {
        NewNotification::new(Uuid::new_v4(), user_id, NotificationType::LowStock, "stock")
    }

    #[tokio::test]
    async fn test_emit_drops_when_queue_is_full() {
        let (emitter, mut rx) = NotificationEmitter::channel(1);
        emitter.emit(sample(Uuid::new_v4()));
        emitter.emit(sample(Uuid::new_v4()));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_emit_after_worker_stopped_does_not_panic() {
        let (emitter, rx) = NotificationEmitter::channel(4);
        drop(rx);
        emitter.emit(sample(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_worker_persists_notifications() {
        let store = Arc::new(InMemoryStore::new());
        let (emitter, handle) = NotificationEmitter::spawn(store.clone(), 8);
        let user = Uuid::new_v4();
        let notification = sample(user);
        let org = notification.organization_id;
        emitter.emit(notification);

        drop(emitter);
        handle.await.unwrap();

        assert_eq!(store.unread_count(user, org).await.unwrap(), 1);
    }
}
