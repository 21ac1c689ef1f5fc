//! Multas y su costo pareado
//!
//! Toda multa tiene exactamente un VehicleCost de tipo Multa; el
//! repositorio escribe ambos en la misma transacción.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::notification_service::NotificationEmitter;
use crate::models::auth::Principal;
use crate::models::fine::{Fine, FinePatch, NewFine};
use crate::models::notification::{NewNotification, NotificationType};
use crate::models::vehicle_cost::VehicleCost;
use crate::repositories::{FineRepository, Page};
use crate::utils::errors::{not_found_error, validation_error, AppResult};

pub struct FineService {
    fines: Arc<dyn FineRepository>,
    notifier: NotificationEmitter,
}

impl FineService {
    pub fn new(fines: Arc<dyn FineRepository>, notifier: NotificationEmitter) -> Self {
        Self { fines, notifier }
    }

    pub async fn create(&self, principal: &Principal, mut new: NewFine) -> AppResult<(Fine, VehicleCost)> {
        principal.require_manager("register fine")?;
        if new.description.trim().is_empty() {
            return Err(validation_error("description", "description is required"));
        }
        new.organization_id = principal.organization_id;

        let fine = Fine::from_new(new, Utc::now())?;
        let (fine, cost) = self.fines.create(fine).await?;

        info!("Fine {} registered with cost {}", fine.id, cost.id);
        self.notifier.emit(
            NewNotification::new(
                principal.organization_id,
                principal.user_id,
                NotificationType::NewFineRegistered,
                format!("Nova multa registrada: {} (R$ {})", fine.description, fine.value),
            )
            .about("fine", fine.id)
            .for_vehicle(Some(fine.vehicle_id)),
        );
        Ok((fine, cost))
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: FinePatch,
    ) -> AppResult<(Fine, VehicleCost)> {
        principal.require_manager("update fine")?;
        if patch.description.as_deref().is_some_and(|d| d.trim().is_empty()) {
            return Err(validation_error("description", "description cannot be empty"));
        }

        let (fine, cost) = self
            .fines
            .update(id, principal.organization_id, &patch)
            .await?;
        info!("Fine {} updated", fine.id);
        Ok((fine, cost))
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> AppResult<()> {
        principal.require_manager("delete fine")?;
        self.fines.delete(id, principal.organization_id).await?;
        info!("Fine {} deleted with its cost", id);
        Ok(())
    }

    /// Los conductores sólo ven sus propias multas
    pub async fn get(&self, principal: &Principal, id: Uuid) -> AppResult<Fine> {
        self.fines
            .find_by_id(id, principal.organization_id)
            .await?
            .filter(|f| !principal.is_driver() || f.driver_id == Some(principal.user_id))
            .ok_or_else(|| not_found_error("Fine", id))
    }

    pub async fn list(&self, principal: &Principal, page: Page) -> AppResult<Vec<Fine>> {
        let driver = principal.is_driver().then_some(principal.user_id);
        self.fines
            .list(principal.organization_id, driver, page)
            .await
    }
}
