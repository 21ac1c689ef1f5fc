//! Vistas agregadas para los dashboards

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::journey::Journey;

/// Ventana temporal del dashboard de gestor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardPeriod {
    Last7Days,
    ThisMonth,
    #[default]
    Last30Days,
}

impl DashboardPeriod {
    pub fn start_date(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DashboardPeriod::Last7Days => now - Duration::days(7),
            DashboardPeriod::ThisMonth => Utc
                .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                .single()
                .unwrap_or(now),
            DashboardPeriod::Last30Days => now - Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Kpis {
    pub total_vehicles: i64,
    pub total_drivers: i64,
    pub total_distance: f64,
    pub total_fuel: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EfficiencyKpis {
    pub average_consumption: f64,
    pub average_cost_per_km: f64,
}

impl EfficiencyKpis {
    /// km/l y costo por km; cero cuando falta el denominador
    pub fn compute(kpis: &Kpis, total_costs: Decimal) -> Self {
        let average_consumption = if kpis.total_fuel > 0.0 {
            kpis.total_distance / kpis.total_fuel
        } else {
            0.0
        };
        let average_cost_per_km = if kpis.total_distance > 0.0 {
            total_costs.to_f64().unwrap_or_default() / kpis.total_distance
        } else {
            0.0
        };
        Self {
            average_consumption,
            average_cost_per_km,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostByCategory {
    pub category: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct KmPerDay {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerDashboard {
    pub period: DashboardPeriod,
    pub kpis: Kpis,
    pub efficiency_kpis: EfficiencyKpis,
    pub costs_by_category: Vec<CostByCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub km_per_day_last_30_days: Option<Vec<KmPerDay>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoResourceLimit {
    pub current: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoStats {
    pub vehicles: DemoResourceLimit,
    pub users: DemoResourceLimit,
    pub parts: DemoResourceLimit,
    pub documents: DemoResourceLimit,
    pub fines: DemoResourceLimit,
    pub freight_orders: DemoResourceLimit,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct VehiclePosition {
    pub vehicle_id: Uuid,
    pub license_plate: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverDashboard {
    pub total_distance: i64,
    pub journey_count: i64,
    pub pending_freight_orders: i64,
    pub active_journey: Option<Journey>,
}
