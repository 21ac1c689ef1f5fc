mod common;

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;

use common::Harness;
use fleet_ops::models::auth::{Principal, Role};
use fleet_ops::models::dashboard::DashboardPeriod;
use fleet_ops::models::fine::NewFine;
use fleet_ops::models::journey::{JourneyEnd, TripDetails};
use fleet_ops::models::vehicle_cost::{CostType, NewVehicleCost};
use fleet_ops::repositories::memory::FaultPoint;
use fleet_ops::utils::errors::AppError;

async fn drive(h: &Harness, plate: &str, km: i32) {
    let vehicle = h.vehicle(plate).await;
    let driver = h.driver();
    let (journey, _) = h
        .services
        .journeys
        .start(&driver, vehicle.id, TripDetails::default())
        .await
        .unwrap();
    h.services
        .journeys
        .end(
            &driver,
            journey.id,
            JourneyEnd {
                end_mileage: Some(km),
                end_engine_hours: None,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_manager_dashboard_aggregates_all_sources() {
    let h = Harness::new();
    drive(&h, "DSH0A00", 300).await;
    drive(&h, "DSH0B00", 100).await;
    h.store.seed_fuel_log(h.org, 50.0, Utc::now());

    let vehicle = h.vehicle("DSH0C00").await;
    let today = Utc::now().date_naive();
    h.services
        .costs
        .create(
            &h.manager,
            NewVehicleCost {
                organization_id: h.org,
                vehicle_id: vehicle.id,
                description: "Diesel".to_string(),
                amount: Decimal::new(30000, 2),
                date: today,
                cost_type: CostType::Combustivel,
            },
        )
        .await
        .unwrap();
    h.services
        .fines
        .create(
            &h.manager,
            NewFine {
                organization_id: h.org,
                vehicle_id: vehicle.id,
                driver_id: None,
                description: "Estacionamento irregular".to_string(),
                infraction_code: None,
                date: today,
                value: Decimal::new(10000, 2),
                status: None,
            },
        )
        .await
        .unwrap();

    let dashboard = h
        .services
        .dashboard
        .manager_dashboard(&h.manager, DashboardPeriod::Last30Days)
        .await
        .unwrap();

    assert_eq!(dashboard.kpis.total_vehicles, 3);
    assert_eq!(dashboard.kpis.total_drivers, 2);
    assert_eq!(dashboard.kpis.total_distance, 400.0);
    assert_eq!(dashboard.kpis.total_fuel, 50.0);
    assert_eq!(dashboard.efficiency_kpis.average_consumption, 8.0);
    assert_eq!(dashboard.efficiency_kpis.average_cost_per_km, 1.0);

    let categories: Vec<&str> = dashboard
        .costs_by_category
        .iter()
        .map(|c| c.category.as_str())
        .collect();
    assert_eq!(categories, vec!["Combustível", "Multa"]);

    // ClienteAtivo recibe la serie diaria
    let per_day = dashboard.km_per_day_last_30_days.unwrap();
    assert_eq!(per_day.iter().map(|d| d.total).sum::<f64>(), 400.0);
}

#[tokio::test]
async fn test_demo_plan_has_no_daily_series() {
    let h = Harness::new();
    let demo = Principal::new(h.store.seed_user(h.org, Role::ClienteDemo), h.org, Role::ClienteDemo);
    let dashboard = h
        .services
        .dashboard
        .manager_dashboard(&demo, DashboardPeriod::Last7Days)
        .await
        .unwrap();
    assert!(dashboard.km_per_day_last_30_days.is_none());
    assert_eq!(dashboard.efficiency_kpis.average_consumption, 0.0);
}

#[tokio::test]
async fn test_slow_source_times_out() {
    let h = Harness::with_timeout(Duration::from_millis(50));
    h.store.set_dashboard_delay(Some(Duration::from_millis(500)));

    let err = h
        .services
        .dashboard
        .manager_dashboard(&h.manager, DashboardPeriod::ThisMonth)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Timeout(_)));

    h.store.set_dashboard_delay(None);
    assert!(h
        .services
        .dashboard
        .manager_dashboard(&h.manager, DashboardPeriod::ThisMonth)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_one_failing_query_fails_the_view() {
    let h = Harness::new();
    h.store.fail_next(FaultPoint::DashboardQuery);

    let err = h
        .services
        .dashboard
        .manager_dashboard(&h.manager, DashboardPeriod::Last30Days)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
}

#[tokio::test]
async fn test_demo_stats_report_usage_against_limits() {
    let h = Harness::new();
    h.vehicle("DMO0A00").await;
    h.vehicle("DMO0B00").await;
    h.driver();
    h.store.seed_document(h.org);

    let stats = h.services.dashboard.demo_stats(&h.manager).await.unwrap();
    assert_eq!(stats.vehicles.current, 2);
    assert_eq!(stats.vehicles.limit, 10);
    // el gestor sembrado más el conductor
    assert_eq!(stats.users.current, 2);
    assert_eq!(stats.users.limit, 5);
    assert_eq!(stats.documents.current, 1);
    assert_eq!(stats.fines.current, 0);
    assert_eq!(stats.freight_orders.limit, 10);
}

#[tokio::test]
async fn test_driver_dashboard_shows_own_activity() {
    let h = Harness::new();
    let vehicle = h.vehicle("DRV0A00").await;
    let driver = h.driver();

    let (journey, _) = h
        .services
        .journeys
        .start(&driver, vehicle.id, TripDetails::default())
        .await
        .unwrap();
    h.services
        .journeys
        .end(
            &driver,
            journey.id,
            JourneyEnd {
                end_mileage: Some(75),
                end_engine_hours: None,
            },
        )
        .await
        .unwrap();
    h.services
        .journeys
        .start(&driver, vehicle.id, TripDetails::default())
        .await
        .unwrap();

    let dashboard = h
        .services
        .dashboard
        .driver_dashboard(&driver, DashboardPeriod::Last30Days)
        .await
        .unwrap();
    assert_eq!(dashboard.total_distance, 75);
    assert_eq!(dashboard.journey_count, 2);
    assert_eq!(dashboard.pending_freight_orders, 0);
    assert_eq!(dashboard.active_journey.map(|j| j.vehicle_id), Some(vehicle.id));
}

#[tokio::test]
async fn test_drivers_cannot_see_fleet_dashboard() {
    let h = Harness::new();
    let driver = h.driver();
    assert!(matches!(
        h.services
            .dashboard
            .manager_dashboard(&driver, DashboardPeriod::Last30Days)
            .await,
        Err(AppError::Forbidden(_))
    ));
}
