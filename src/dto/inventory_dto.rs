use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::inventory::{InventoryItem, InventoryItemStatus, NewPart, Part, PartCategory};
use crate::utils::validation::not_blank;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePartRequest {
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
    #[serde(default)]
    pub category: PartCategory,
    pub value: Option<Decimal>,
    pub part_number: Option<String>,
    pub serial_number: Option<String>,
    pub brand: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub minimum_stock: i32,
    #[validate(range(min = 0))]
    pub lifespan_km: Option<i32>,
    #[validate(range(max = 1000))]
    #[serde(default)]
    pub initial_quantity: u32,
}

impl CreatePartRequest {
    /// Separa la cantidad inicial de los datos de la pieza
    pub fn into_new(self, organization_id: Uuid) -> (NewPart, u32) {
        (
            NewPart {
                organization_id,
                name: self.name,
                category: self.category,
                value: self.value,
                part_number: self.part_number,
                serial_number: self.serial_number,
                brand: self.brand,
                location: self.location,
                notes: self.notes,
                minimum_stock: self.minimum_stock,
                lifespan_km: self.lifespan_km,
            },
            self.initial_quantity,
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemsRequest {
    #[validate(range(min = 1, max = 1000))]
    pub quantity: u32,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetItemStatusRequest {
    pub status: InventoryItemStatus,
    pub related_vehicle_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartsQuery {
    pub search: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemsQuery {
    pub status: Option<InventoryItemStatus>,
}

#[derive(Debug, Serialize)]
pub struct PartCreatedResponse {
    pub part: Part,
    pub items: Vec<InventoryItem>,
}
