//! Modelo de Fine (multa de tránsito)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::utils::errors::{validation_error, AppResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "fine_status", rename_all = "snake_case")]
pub enum FineStatus {
    Pendente,
    Paga,
    EmRecurso,
    Cancelada,
}

/// Fine - mapea a la tabla fines
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Fine {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub description: String,
    pub infraction_code: Option<String>,
    pub date: NaiveDate,
    pub value: Decimal,
    pub status: FineStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFine {
    pub organization_id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub description: String,
    pub infraction_code: Option<String>,
    pub date: NaiveDate,
    pub value: Decimal,
    pub status: Option<FineStatus>,
}

/// Actualización parcial; sólo los campos presentes se aplican
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinePatch {
    pub vehicle_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub description: Option<String>,
    pub infraction_code: Option<String>,
    pub date: Option<NaiveDate>,
    pub value: Option<Decimal>,
    pub status: Option<FineStatus>,
}

impl FinePatch {
    /// Indica si el cambio afecta al costo pareado
    pub fn touches_cost(&self) -> bool {
        self.value.is_some()
            || self.description.is_some()
            || self.date.is_some()
            || self.vehicle_id.is_some()
    }
}

pub(crate) fn ensure_positive_value(value: Decimal) -> AppResult<()> {
    if value <= Decimal::ZERO {
        return Err(validation_error("value", "fine value must be greater than zero"));
    }
    Ok(())
}

impl Fine {
    pub fn from_new(new: NewFine, now: DateTime<Utc>) -> AppResult<Self> {
        ensure_positive_value(new.value)?;
        Ok(Self {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            vehicle_id: new.vehicle_id,
            driver_id: new.driver_id,
            description: new.description,
            infraction_code: new.infraction_code,
            date: new.date,
            value: new.value,
            status: new.status.unwrap_or(FineStatus::Pendente),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_patch(&mut self, patch: &FinePatch, now: DateTime<Utc>) -> AppResult<()> {
        if let Some(value) = patch.value {
            ensure_positive_value(value)?;
            self.value = value;
        }
        if let Some(vehicle_id) = patch.vehicle_id {
            self.vehicle_id = vehicle_id;
        }
        if patch.driver_id.is_some() {
            self.driver_id = patch.driver_id;
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if patch.infraction_code.is_some() {
            self.infraction_code = patch.infraction_code.clone();
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vehicle_cost::{CostType, VehicleCost};

    fn new_fine(value: Decimal) -> NewFine {
        NewFine {
            organization_id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            driver_id: None,
            description: "Excesso de velocidade".to_string(),
            infraction_code: Some("745-50".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            value,
            status: None,
        }
    }

    #[test]
    fn test_new_fine_is_pending_and_pairs_with_cost() {
        let fine = Fine::from_new(new_fine(Decimal::new(15000, 2)), Utc::now()).unwrap();
        assert_eq!(fine.status, FineStatus::Pendente);

        let cost = VehicleCost::for_fine(&fine, Utc::now());
        assert_eq!(cost.cost_type, CostType::Multa);
        assert_eq!(cost.amount, fine.value);
        assert_eq!(cost.date, fine.date);
        assert_eq!(cost.fine_id, Some(fine.id));
    }

    #[test]
    fn test_value_must_be_positive() {
        assert!(Fine::from_new(new_fine(Decimal::ZERO), Utc::now()).is_err());

        let mut fine = Fine::from_new(new_fine(Decimal::ONE), Utc::now()).unwrap();
        let patch = FinePatch {
            value: Some(Decimal::new(-1, 0)),
            ..Default::default()
        };
        assert!(fine.apply_patch(&patch, Utc::now()).is_err());
        assert_eq!(fine.value, Decimal::ONE);
    }

    #[test]
    fn test_patch_syncs_cost() {
        let mut fine = Fine::from_new(new_fine(Decimal::ONE), Utc::now()).unwrap();
        let mut cost = VehicleCost::for_fine(&fine, Utc::now());
        let patch = FinePatch {
            value: Some(Decimal::new(20000, 2)),
            description: Some("Estacionamento irregular".to_string()),
            ..Default::default()
        };
        assert!(patch.touches_cost());
        fine.apply_patch(&patch, Utc::now()).unwrap();
        cost.sync_with_fine(&fine, Utc::now());
        assert_eq!(cost.amount, Decimal::new(20000, 2));
        assert_eq!(cost.description, "Multa: Estacionamento irregular");

        let status_only = FinePatch {
            status: Some(FineStatus::Paga),
            ..Default::default()
        };
        assert!(!status_only.touches_cost());
    }
}
