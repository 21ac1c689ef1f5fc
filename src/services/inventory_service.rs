//! Libro de inventario
//!
//! Cada cambio de estado de un ítem deja exactamente una transacción en el
//! historial. El aviso de stock bajo se dispara cuando un cambio cruza el
//! mínimo de la pieza, no en cada cambio posterior.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::notification_service::NotificationEmitter;
use crate::models::auth::Principal;
use crate::models::inventory::{
    InventoryItem, InventoryItemStatus, InventoryTransaction, ItemStatusChange, ItemStatusOutcome,
    NewPart, Part, PartWithStock,
};
use crate::models::notification::{NewNotification, NotificationType};
use crate::repositories::{InventoryRepository, Page};
use crate::utils::errors::{not_found_error, validation_error, AppResult};

/// Tope por operación para altas en lote
pub const MAX_BATCH_QUANTITY: u32 = 1_000;

pub struct InventoryService {
    inventory: Arc<dyn InventoryRepository>,
    notifier: NotificationEmitter,
}

impl InventoryService {
    pub fn new(inventory: Arc<dyn InventoryRepository>, notifier: NotificationEmitter) -> Self {
        Self { inventory, notifier }
    }

    pub async fn create_part(
        &self,
        principal: &Principal,
        mut new: NewPart,
        initial_quantity: u32,
    ) -> AppResult<(Part, Vec<InventoryItem>)> {
        principal.require_manager("create part")?;
        new.name = new.name.trim().to_string();
        if new.name.is_empty() {
            return Err(validation_error("name", "part name is required"));
        }
        if new.minimum_stock < 0 {
            return Err(validation_error("minimum_stock", "minimum stock cannot be negative"));
        }
        if new.value.is_some_and(|v| v.is_sign_negative()) {
            return Err(validation_error("value", "value cannot be negative"));
        }
        if initial_quantity > MAX_BATCH_QUANTITY {
            return Err(validation_error("quantity", "quantity exceeds the batch limit"));
        }
        new.organization_id = principal.organization_id;

        let (part, items) = self
            .inventory
            .create_part(new, initial_quantity, principal.user_id)
            .await?;
        info!("Part {} created with {} items", part.id, items.len());
        Ok((part, items))
    }

    pub async fn get_part(&self, principal: &Principal, part_id: Uuid) -> AppResult<PartWithStock> {
        self.inventory
            .find_part(part_id, principal.organization_id)
            .await?
            .ok_or_else(|| not_found_error("Part", part_id))
    }

    pub async fn list_parts(
        &self,
        principal: &Principal,
        search: Option<&str>,
        page: Page,
    ) -> AppResult<Vec<PartWithStock>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.inventory
            .list_parts(principal.organization_id, search, page)
            .await
    }

    pub async fn add_items(
        &self,
        principal: &Principal,
        part_id: Uuid,
        quantity: u32,
        notes: Option<String>,
    ) -> AppResult<Vec<InventoryItem>> {
        principal.require_manager("add inventory items")?;
        if quantity == 0 || quantity > MAX_BATCH_QUANTITY {
            return Err(validation_error("quantity", "quantity must be between 1 and 1000"));
        }

        let items = self
            .inventory
            .add_items(part_id, principal.organization_id, principal.user_id, quantity, notes)
            .await?;
        info!("{} items added to part {}", items.len(), part_id);
        Ok(items)
    }

    pub async fn set_item_status(
        &self,
        principal: &Principal,
        item_id: Uuid,
        new_status: InventoryItemStatus,
        related_vehicle_id: Option<Uuid>,
        notes: Option<String>,
    ) -> AppResult<ItemStatusOutcome> {
        principal.require_manager("change inventory item status")?;

        let outcome = self
            .inventory
            .set_item_status(ItemStatusChange {
                item_id,
                organization_id: principal.organization_id,
                user_id: principal.user_id,
                new_status,
                related_vehicle_id,
                notes,
            })
            .await?;

        info!(
            "Item {} of part {} moved to {:?}",
            outcome.item.id, outcome.part.id, outcome.item.status
        );
        if let Some(cost) = &outcome.cost {
            info!("Installation cost {} booked on vehicle {}", cost.id, cost.vehicle_id);
        }

        if outcome.stock.crossed_below_minimum() {
            warn!(
                "Part {} is low on stock: {} available, minimum {}",
                outcome.part.id, outcome.stock.available_after, outcome.stock.minimum_stock
            );
            self.notifier.emit(
                NewNotification::new(
                    principal.organization_id,
                    principal.user_id,
                    NotificationType::LowStock,
                    format!(
                        "Estoque baixo para a peça {}: {} disponível(is), mínimo {}",
                        outcome.part.name, outcome.stock.available_after, outcome.stock.minimum_stock
                    ),
                )
                .about("part", outcome.part.id),
            );
        }
        Ok(outcome)
    }

    pub async fn items_for_part(
        &self,
        principal: &Principal,
        part_id: Uuid,
        status: Option<InventoryItemStatus>,
    ) -> AppResult<Vec<InventoryItem>> {
        self.inventory
            .items_for_part(part_id, principal.organization_id, status)
            .await
    }

    pub async fn history(
        &self,
        principal: &Principal,
        part_id: Uuid,
        page: Page,
    ) -> AppResult<Vec<InventoryTransaction>> {
        self.inventory
            .history(part_id, principal.organization_id, page)
            .await
    }
}
