//! Modelos del inventario de repuestos
//!
//! Part es el catálogo, InventoryItem la unidad física y
//! InventoryTransaction el libro append-only de cambios de estado.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::vehicle_cost::VehicleCost;
use crate::utils::errors::{invalid_transition, validation_error, AppResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "part_category", rename_all = "snake_case")]
pub enum PartCategory {
    Peca,
    Fluido,
    Consumivel,
    Pneu,
    Outro,
}

impl Default for PartCategory {
    fn default() -> Self {
        PartCategory::Peca
    }
}

/// Part - mapea a la tabla parts
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Part {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub category: PartCategory,
    pub value: Option<Decimal>,
    pub part_number: Option<String>,
    pub serial_number: Option<String>,
    pub brand: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub minimum_stock: i32,
    pub lifespan_km: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Part con su stock disponible derivado de los ítems
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PartWithStock {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub part: Part,
    pub available_stock: i64,
}

#[derive(Debug, Clone)]
pub struct NewPart {
    pub organization_id: Uuid,
    pub name: String,
    pub category: PartCategory,
    pub value: Option<Decimal>,
    pub part_number: Option<String>,
    pub serial_number: Option<String>,
    pub brand: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub minimum_stock: i32,
    pub lifespan_km: Option<i32>,
}

impl Part {
    pub fn from_new(new: NewPart, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            name: new.name,
            category: new.category,
            value: new.value,
            part_number: new.part_number,
            serial_number: new.serial_number,
            brand: new.brand,
            location: new.location,
            notes: new.notes,
            minimum_stock: new.minimum_stock,
            lifespan_km: new.lifespan_km,
            created_at: now,
            updated_at: now,
        }
    }

    /// Valor unitario cuando es positivo; se usa para costear instalaciones
    pub fn billable_value(&self) -> Option<Decimal> {
        self.value.filter(|v| *v > Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "inventory_item_status", rename_all = "snake_case")]
pub enum InventoryItemStatus {
    Disponivel,
    EmUso,
    FimDeVida,
}

/// InventoryItem - mapea a la tabla inventory_items
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub part_id: Uuid,
    pub item_identifier: i32,
    pub status: InventoryItemStatus,
    pub installed_on_vehicle_id: Option<Uuid>,
    pub installed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "inventory_transaction_type", rename_all = "snake_case")]
pub enum TransactionType {
    Entrada,
    AjusteInicial,
    Instalacao,
    Retorno,
    FimDeVida,
}

/// Registro inmutable del libro de inventario
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub item_id: Uuid,
    pub part_id: Uuid,
    pub user_id: Option<Uuid>,
    pub transaction_type: TransactionType,
    pub target_status: InventoryItemStatus,
    pub notes: Option<String>,
    pub related_vehicle_id: Option<Uuid>,
    pub related_user_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl InventoryItem {
    /// Ítem nuevo en Disponivel junto con su transacción de alta
    pub fn receive(
        part: &Part,
        item_identifier: i32,
        kind: TransactionType,
        user_id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> (InventoryItem, InventoryTransaction) {
        let item = InventoryItem {
            id: Uuid::new_v4(),
            organization_id: part.organization_id,
            part_id: part.id,
            item_identifier,
            status: InventoryItemStatus::Disponivel,
            installed_on_vehicle_id: None,
            installed_at: None,
            created_at: now,
            updated_at: now,
        };
        let tx = InventoryTransaction {
            id: Uuid::new_v4(),
            organization_id: part.organization_id,
            item_id: item.id,
            part_id: part.id,
            user_id: Some(user_id),
            transaction_type: kind,
            target_status: InventoryItemStatus::Disponivel,
            notes,
            related_vehicle_id: None,
            related_user_id: None,
            timestamp: now,
        };
        (item, tx)
    }

    /// Aplica el cambio de estado y devuelve la transacción que lo registra.
    /// No muta nada si la transición es ilegal.
    pub fn transition(
        &mut self,
        change: &ItemStatusChange,
        now: DateTime<Utc>,
    ) -> AppResult<InventoryTransaction> {
        use InventoryItemStatus::*;

        let kind = match (self.status, change.new_status) {
            (Disponivel, EmUso) => TransactionType::Instalacao,
            (EmUso, Disponivel) => TransactionType::Retorno,
            (Disponivel | EmUso, FimDeVida) => TransactionType::FimDeVida,
            (from, to) => {
                return Err(invalid_transition(
                    "Inventory item",
                    from,
                    &format!("move to {:?}", to),
                ))
            }
        };

        if kind == TransactionType::Instalacao && change.related_vehicle_id.is_none() {
            return Err(validation_error(
                "related_vehicle_id",
                "a vehicle is required to install an item",
            ));
        }

        match kind {
            TransactionType::Instalacao => {
                self.installed_on_vehicle_id = change.related_vehicle_id;
                self.installed_at = Some(now);
            }
            _ => {
                self.installed_on_vehicle_id = None;
                self.installed_at = None;
            }
        }
        self.status = change.new_status;
        self.updated_at = now;

        Ok(InventoryTransaction {
            id: Uuid::new_v4(),
            organization_id: self.organization_id,
            item_id: self.id,
            part_id: self.part_id,
            user_id: Some(change.user_id),
            transaction_type: kind,
            target_status: change.new_status,
            notes: change.notes.clone(),
            related_vehicle_id: change.related_vehicle_id,
            related_user_id: None,
            timestamp: now,
        })
    }
}

/// Petición de cambio de estado de un ítem
#[derive(Debug, Clone)]
pub struct ItemStatusChange {
    pub item_id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub new_status: InventoryItemStatus,
    pub related_vehicle_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Stock disponible de una pieza antes y después de un cambio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub part_id: Uuid,
    pub minimum_stock: i32,
    pub available_before: i64,
    pub available_after: i64,
}

impl StockLevel {
    /// Flanco descendente: sólo cuando el stock cruza el mínimo
    pub fn crossed_below_minimum(&self) -> bool {
        let min = i64::from(self.minimum_stock);
        self.available_before > min && self.available_after <= min
    }
}

/// Resultado de un cambio de estado confirmado
#[derive(Debug, Clone, Serialize)]
pub struct ItemStatusOutcome {
    pub item: InventoryItem,
    pub part: Part,
    pub transaction: InventoryTransaction,
    pub stock: StockLevel,
    /// Costo de PecasComponentes reservado al instalar
    pub cost: Option<VehicleCost>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(min: i32) -> Part {
        Part::from_new(
            NewPart {
                organization_id: Uuid::new_v4(),
                name: "Filtro de óleo".to_string(),
                category: PartCategory::Peca,
                value: Some(Decimal::new(4590, 2)),
                part_number: None,
                serial_number: None,
                brand: None,
                location: None,
                notes: None,
                minimum_stock: min,
                lifespan_km: Some(10_000),
            },
            Utc::now(),
        )
    }

    fn change(item: &InventoryItem, status: InventoryItemStatus, vehicle: Option<Uuid>) -> ItemStatusChange {
        ItemStatusChange {
            item_id: item.id,
            organization_id: item.organization_id,
            user_id: Uuid::new_v4(),
            new_status: status,
            related_vehicle_id: vehicle,
            notes: None,
        }
    }

    #[test]
    fn test_install_and_return() {
        let p = part(1);
        let (mut item, entry) = InventoryItem::receive(&p, 1, TransactionType::Entrada, Uuid::new_v4(), None, Utc::now());
        assert_eq!(entry.transaction_type, TransactionType::Entrada);

        let vehicle = Uuid::new_v4();
        let tx = item
            .transition(&change(&item, InventoryItemStatus::EmUso, Some(vehicle)), Utc::now())
            .unwrap();
        assert_eq!(tx.transaction_type, TransactionType::Instalacao);
        assert_eq!(tx.target_status, item.status);
        assert_eq!(item.installed_on_vehicle_id, Some(vehicle));

        let tx = item
            .transition(&change(&item, InventoryItemStatus::Disponivel, None), Utc::now())
            .unwrap();
        assert_eq!(tx.transaction_type, TransactionType::Retorno);
        assert!(item.installed_on_vehicle_id.is_none());
    }

    #[test]
    fn test_install_requires_vehicle() {
        let p = part(1);
        let (mut item, _) = InventoryItem::receive(&p, 1, TransactionType::Entrada, Uuid::new_v4(), None, Utc::now());
        let err = item
            .transition(&change(&item, InventoryItemStatus::EmUso, None), Utc::now())
            .unwrap_err();
        assert!(matches!(err, crate::utils::errors::AppError::Validation(_)));
        assert_eq!(item.status, InventoryItemStatus::Disponivel);
    }

    #[test]
    fn test_end_of_life_is_terminal() {
        let p = part(1);
        let (mut item, _) = InventoryItem::receive(&p, 1, TransactionType::Entrada, Uuid::new_v4(), None, Utc::now());
        item.transition(&change(&item, InventoryItemStatus::FimDeVida, None), Utc::now())
            .unwrap();
        for status in [
            InventoryItemStatus::Disponivel,
            InventoryItemStatus::EmUso,
            InventoryItemStatus::FimDeVida,
        ] {
            assert!(item
                .transition(&change(&item, status, Some(Uuid::new_v4())), Utc::now())
                .is_err());
        }
    }

    #[test]
    fn test_low_stock_is_edge_triggered() {
        let level = |before, after| StockLevel {
            part_id: Uuid::new_v4(),
            minimum_stock: 2,
            available_before: before,
            available_after: after,
        };
        assert!(level(3, 2).crossed_below_minimum());
        assert!(!level(2, 1).crossed_below_minimum());
        assert!(!level(4, 3).crossed_below_minimum());
        assert!(!level(1, 2).crossed_below_minimum());
    }
}
