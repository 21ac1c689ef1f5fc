use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::models::auth::Principal;
use crate::models::vehicle_cost::{CostType, NewVehicleCost, VehicleCost};
use crate::repositories::VehicleCostRepository;
use crate::utils::errors::{not_found_error, validation_error, AppResult};

pub struct VehicleCostService {
    costs: Arc<dyn VehicleCostRepository>,
}

impl VehicleCostService {
    pub fn new(costs: Arc<dyn VehicleCostRepository>) -> Self {
        Self { costs }
    }

    /// Costos manuales; los de tipo Multa sólo nacen de una multa
    pub async fn create(&self, principal: &Principal, mut new: NewVehicleCost) -> AppResult<VehicleCost> {
        principal.require_manager("register vehicle cost")?;
        if new.cost_type == CostType::Multa {
            return Err(validation_error("cost_type", "fine costs are created by registering a fine"));
        }
        if new.amount <= Decimal::ZERO {
            return Err(validation_error("amount", "amount must be greater than zero"));
        }
        new.organization_id = principal.organization_id;

        let cost = self.costs.create(new).await?;
        info!("Cost {} booked on vehicle {}", cost.id, cost.vehicle_id);
        Ok(cost)
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> AppResult<VehicleCost> {
        self.costs
            .find_by_id(id, principal.organization_id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle cost", id))
    }

    pub async fn list(
        &self,
        principal: &Principal,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<Vec<VehicleCost>> {
        principal.require_manager("list vehicle costs")?;
        self.costs.list(principal.organization_id, from, to).await
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> AppResult<()> {
        principal.require_manager("delete vehicle cost")?;
        self.costs.delete(id, principal.organization_id).await
    }
}
