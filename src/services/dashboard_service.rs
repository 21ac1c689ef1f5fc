//! Agregador de dashboards
//!
//! Cada vista lanza sus consultas en paralelo dentro de la misma tarea y
//! las une con `try_join!`: el primer error cancela el resto y la vista
//! completa falla. Cada rama escribe en su propio valor; el resultado se
//! arma sólo después de la unión. El conjunto está acotado por el timeout
//! configurado.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::config::DemoLimits;
use crate::models::auth::Principal;
use crate::models::dashboard::{
    CostByCategory, DashboardPeriod, DemoResourceLimit, DemoStats, DriverDashboard, EfficiencyKpis,
    Kpis, ManagerDashboard, VehiclePosition,
};
use crate::repositories::{DashboardRepository, JourneyRepository};
use crate::utils::errors::{AppError, AppResult};

pub struct DashboardService {
    dashboard: Arc<dyn DashboardRepository>,
    journeys: Arc<dyn JourneyRepository>,
    timeout: Duration,
    demo_limits: DemoLimits,
}

impl DashboardService {
    pub fn new(
        dashboard: Arc<dyn DashboardRepository>,
        journeys: Arc<dyn JourneyRepository>,
        timeout: Duration,
        demo_limits: DemoLimits,
    ) -> Self {
        Self {
            dashboard,
            journeys,
            timeout,
            demo_limits,
        }
    }

    async fn bounded<T>(&self, view: &str, work: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} dashboard exceeded {:?}", view, self.timeout);
                Err(AppError::Timeout(format!(
                    "{} dashboard did not finish within {} ms",
                    view,
                    self.timeout.as_millis()
                )))
            }
        }
    }

    pub async fn manager_dashboard(
        &self,
        principal: &Principal,
        period: DashboardPeriod,
    ) -> AppResult<ManagerDashboard> {
        principal.require_manager("view fleet dashboard")?;
        let org = principal.organization_id;
        let now = Utc::now();
        let since = period.start_date(now);
        let repo = &self.dashboard;

        let km_per_day = async {
            if principal.is_premium() {
                let last_30_days = DashboardPeriod::Last30Days.start_date(now);
                repo.km_per_day_since(org, last_30_days).await.map(Some)
            } else {
                Ok(None)
            }
        };

        let (total_vehicles, total_drivers, total_distance, total_fuel, costs, km_per_day) = self
            .bounded("manager", async {
                tokio::try_join!(
                    repo.count_vehicles(org),
                    repo.count_drivers(org),
                    repo.sum_distance_since(org, since, None),
                    repo.sum_fuel_since(org, since),
                    repo.costs_by_category_since(org, since),
                    km_per_day,
                )
            })
            .await?;

        let kpis = Kpis {
            total_vehicles,
            total_drivers,
            total_distance,
            total_fuel,
        };
        let total_costs: Decimal = costs.iter().map(|(_, amount)| *amount).sum();
        let efficiency_kpis = EfficiencyKpis::compute(&kpis, total_costs);

        let mut costs_by_category: Vec<CostByCategory> = costs
            .into_iter()
            .map(|(cost_type, amount)| CostByCategory {
                category: cost_type.label().to_string(),
                amount,
            })
            .collect();
        costs_by_category.sort_by(|a, b| a.category.cmp(&b.category));

        debug!("Manager dashboard built for organization {}", org);
        Ok(ManagerDashboard {
            period,
            kpis,
            efficiency_kpis,
            costs_by_category,
            km_per_day_last_30_days: km_per_day,
        })
    }

    /// Uso actual frente a los límites del plan demo
    pub async fn demo_stats(&self, principal: &Principal) -> AppResult<DemoStats> {
        principal.require_manager("view plan usage")?;
        let org = principal.organization_id;
        let month_start = DashboardPeriod::ThisMonth.start_date(Utc::now());
        let repo = &self.dashboard;

        let (vehicles, users, parts, documents, fines, freight_orders) = self
            .bounded("demo", async {
                tokio::try_join!(
                    repo.count_vehicles(org),
                    repo.count_users(org),
                    repo.count_parts(org),
                    repo.count_documents(org),
                    repo.count_fines_since(org, month_start),
                    repo.count_freight_orders_since(org, month_start),
                )
            })
            .await?;

        let limits = self.demo_limits;
        let usage = |current, limit| DemoResourceLimit { current, limit };
        Ok(DemoStats {
            vehicles: usage(vehicles, limits.vehicles),
            users: usage(users, limits.users),
            parts: usage(parts, limits.parts),
            documents: usage(documents, limits.documents),
            fines: usage(fines, limits.fines_per_month),
            freight_orders: usage(freight_orders, limits.freight_orders_per_month),
        })
    }

    pub async fn vehicle_positions(&self, principal: &Principal) -> AppResult<Vec<VehiclePosition>> {
        self.bounded("positions", self.dashboard.vehicle_positions(principal.organization_id))
            .await
    }

    pub async fn driver_dashboard(
        &self,
        principal: &Principal,
        period: DashboardPeriod,
    ) -> AppResult<DriverDashboard> {
        let org = principal.organization_id;
        let driver = principal.user_id;
        let since = period.start_date(Utc::now());
        let repo = &self.dashboard;

        let (total_distance, journey_count, pending_freight_orders, active_journey) = self
            .bounded("driver", async {
                tokio::try_join!(
                    repo.sum_distance_since(org, since, Some(driver)),
                    repo.count_journeys(org, driver),
                    repo.count_pending_freight_for_driver(org, driver),
                    self.journeys.find_active_by_driver(driver, org),
                )
            })
            .await?;

        Ok(DriverDashboard {
            total_distance: total_distance.round() as i64,
            journey_count,
            pending_freight_orders,
            active_journey,
        })
    }
}
