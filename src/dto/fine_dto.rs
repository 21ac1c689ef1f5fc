use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::fine::{Fine, FineStatus, NewFine};
use crate::models::vehicle_cost::{CostType, NewVehicleCost, VehicleCost};
use crate::utils::validation::not_blank;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFineRequest {
    pub vehicle_id: Uuid,
    pub driver_id: Option<Uuid>,
    #[validate(length(max = 500), custom = "not_blank")]
    pub description: String,
    #[validate(length(max = 50))]
    pub infraction_code: Option<String>,
    pub date: NaiveDate,
    pub value: Decimal,
    pub status: Option<FineStatus>,
}

impl CreateFineRequest {
    pub fn into_new(self, organization_id: Uuid) -> NewFine {
        NewFine {
            organization_id,
            vehicle_id: self.vehicle_id,
            driver_id: self.driver_id,
            description: self.description,
            infraction_code: self.infraction_code,
            date: self.date,
            value: self.value,
            status: self.status,
        }
    }
}

/// Multa junto a su costo pareado
#[derive(Debug, Serialize)]
pub struct FineWithCost {
    pub fine: Fine,
    pub cost: VehicleCost,
}

impl From<(Fine, VehicleCost)> for FineWithCost {
    fn from((fine, cost): (Fine, VehicleCost)) -> Self {
        Self { fine, cost }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCostRequest {
    pub vehicle_id: Uuid,
    #[validate(length(max = 500), custom = "not_blank")]
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub cost_type: CostType,
}

impl CreateCostRequest {
    pub fn into_new(self, organization_id: Uuid) -> NewVehicleCost {
        NewVehicleCost {
            organization_id,
            vehicle_id: self.vehicle_id,
            description: self.description,
            amount: self.amount,
            date: self.date,
            cost_type: self.cost_type,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CostsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
