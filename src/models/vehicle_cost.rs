//! Modelo de VehicleCost

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::fine::Fine;
use super::inventory::{InventoryItem, Part};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "cost_type", rename_all = "snake_case")]
pub enum CostType {
    Manutencao,
    Combustivel,
    Pedagio,
    Seguro,
    Pneu,
    PecasComponentes,
    Multa,
    Outros,
}

impl CostType {
    /// Etiqueta legible usada en el dashboard
    pub fn label(&self) -> &'static str {
        match self {
            CostType::Manutencao => "Manutenção",
            CostType::Combustivel => "Combustível",
            CostType::Pedagio => "Pedágio",
            CostType::Seguro => "Seguro",
            CostType::Pneu => "Pneu",
            CostType::PecasComponentes => "Peças e Componentes",
            CostType::Multa => "Multa",
            CostType::Outros => "Outros",
        }
    }
}

/// VehicleCost - mapea a la tabla vehicle_costs
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VehicleCost {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub vehicle_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub cost_type: CostType,
    pub fine_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVehicleCost {
    pub organization_id: Uuid,
    pub vehicle_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub cost_type: CostType,
}

impl VehicleCost {
    pub fn from_new(new: NewVehicleCost, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            vehicle_id: new.vehicle_id,
            description: new.description,
            amount: new.amount,
            date: new.date,
            cost_type: new.cost_type,
            fine_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Costo pareado con una multa
    pub fn for_fine(fine: &Fine, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: fine.organization_id,
            vehicle_id: fine.vehicle_id,
            description: fine_cost_description(&fine.description),
            amount: fine.value,
            date: fine.date,
            cost_type: CostType::Multa,
            fine_id: Some(fine.id),
            created_at: now,
            updated_at: now,
        }
    }

    /// Costo de una pieza instalada en el vehículo
    pub fn for_installation(
        part: &Part,
        item: &InventoryItem,
        vehicle_id: Uuid,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self::from_new(
            NewVehicleCost {
                organization_id: item.organization_id,
                vehicle_id,
                description: format!("Instalação: {} #{}", part.name, item.item_identifier),
                amount,
                date: now.date_naive(),
                cost_type: CostType::PecasComponentes,
            },
            now,
        )
    }

    /// Copia los campos compartidos desde la multa pareada
    pub fn sync_with_fine(&mut self, fine: &Fine, now: DateTime<Utc>) {
        self.vehicle_id = fine.vehicle_id;
        self.description = fine_cost_description(&fine.description);
        self.amount = fine.value;
        self.date = fine.date;
        self.updated_at = now;
    }
}

fn fine_cost_description(description: &str) -> String {
    format!("Multa: {}", description)
}
