mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::Harness;
use fleet_ops::models::freight_order::{
    FreightOrder, FreightStatus, NewFreightOrder, NewStopPoint, StopPointStatus, StopPointType,
};
use fleet_ops::models::journey::{JourneyEnd, TripDetails};
use fleet_ops::models::notification::NotificationType;
use fleet_ops::models::vehicle::VehicleStatus;
use fleet_ops::repositories::Page;
use fleet_ops::utils::errors::AppError;

fn order_with_stops(h: &Harness, stops: &[(i32, StopPointType)]) -> NewFreightOrder {
    let now = Utc::now();
    NewFreightOrder {
        organization_id: h.org,
        client_id: Uuid::new_v4(),
        description: Some("Soja a granel".to_string()),
        scheduled_start_time: Some(now),
        scheduled_end_time: Some(now + Duration::hours(10)),
        stop_points: stops
            .iter()
            .map(|(seq, kind)| NewStopPoint {
                sequence_order: *seq,
                stop_type: *kind,
                address: format!("Armazém {}", seq),
                cargo_description: None,
                scheduled_time: now + Duration::hours(i64::from(*seq)),
            })
            .collect(),
    }
}

async fn two_stop_order(h: &Harness) -> FreightOrder {
    h.services
        .freight_orders
        .create(
            &h.manager,
            order_with_stops(h, &[(2, StopPointType::Delivery), (1, StopPointType::Pickup)]),
        )
        .await
        .unwrap()
}

fn end_at(km: i32) -> JourneyEnd {
    JourneyEnd {
        end_mileage: Some(km),
        end_engine_hours: None,
    }
}

#[tokio::test]
async fn test_order_is_delivered_after_last_stop() {
    let mut h = Harness::new();
    let vehicle = h.vehicle("FRT0A00").await;
    let driver = h.driver();
    let order = two_stop_order(&h).await;
    assert_eq!(order.status, FreightStatus::Open);
    let first = order.stop_points[0].id;
    let second = order.stop_points[1].id;

    let open = h.services.freight_orders.list_open(&driver).await.unwrap();
    assert_eq!(open.len(), 1);

    let claimed = h
        .services
        .freight_orders
        .claim(&driver, order.id, vehicle.id)
        .await
        .unwrap();
    assert_eq!(claimed.status, FreightStatus::Claimed);
    assert_eq!(claimed.driver_id, Some(driver.user_id));

    let pending = h
        .services
        .freight_orders
        .list_pending_for_driver(&driver)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    let leg = h
        .services
        .freight_orders
        .start_journey_for_stop(&driver, order.id, first, TripDetails::default())
        .await
        .unwrap();
    assert_eq!(leg.order.status, FreightStatus::InTransit);
    assert_eq!(leg.vehicle.status, VehicleStatus::InUse);
    assert_eq!(leg.journey.stop_point_id, Some(first));

    let done = h
        .services
        .freight_orders
        .complete_stop_point(&driver, order.id, first, leg.journey.id, end_at(80))
        .await
        .unwrap();
    assert!(!done.delivered);
    assert_eq!(done.order.status, FreightStatus::InTransit);
    assert_eq!(done.vehicle.status, VehicleStatus::Available);

    let leg = h
        .services
        .freight_orders
        .start_journey_for_stop(&driver, order.id, second, TripDetails::default())
        .await
        .unwrap();
    let done = h
        .services
        .freight_orders
        .complete_stop_point(&driver, order.id, second, leg.journey.id, end_at(230))
        .await
        .unwrap();
    assert!(done.delivered);
    assert_eq!(done.order.status, FreightStatus::Delivered);
    assert!(done
        .order
        .stop_points
        .iter()
        .all(|sp| sp.status == StopPointStatus::Completed && sp.actual_arrival_time.is_some()));
    assert_eq!(done.vehicle.current_km, 230);

    let kinds: Vec<NotificationType> = h
        .drain_events()
        .into_iter()
        .map(|n| n.notification_type)
        .collect();
    assert_eq!(
        kinds,
        vec![NotificationType::FreightAssigned, NotificationType::FreightUpdated]
    );
}

#[tokio::test]
async fn test_delivered_order_cannot_regress() {
    let h = Harness::new();
    let vehicle = h.vehicle("FRT0B00").await;
    let driver = h.driver();
    let order = h
        .services
        .freight_orders
        .create(&h.manager, order_with_stops(&h, &[(1, StopPointType::Delivery)]))
        .await
        .unwrap();
    let stop = order.stop_points[0].id;

    h.services.freight_orders.claim(&driver, order.id, vehicle.id).await.unwrap();
    let leg = h
        .services
        .freight_orders
        .start_journey_for_stop(&driver, order.id, stop, TripDetails::default())
        .await
        .unwrap();
    h.services
        .freight_orders
        .complete_stop_point(&driver, order.id, stop, leg.journey.id, end_at(40))
        .await
        .unwrap();

    assert!(matches!(
        h.services.freight_orders.cancel(&h.manager, order.id).await,
        Err(AppError::InvalidTransition(_))
    ));
    assert!(matches!(
        h.services
            .freight_orders
            .start_journey_for_stop(&driver, order.id, stop, TripDetails::default())
            .await,
        Err(AppError::InvalidTransition(_))
    ));
    assert!(matches!(
        h.services.freight_orders.claim(&driver, order.id, vehicle.id).await,
        Err(AppError::InvalidTransition(_))
    ));
}

#[tokio::test]
async fn test_only_assigned_driver_operates_order() {
    let h = Harness::new();
    let vehicle = h.vehicle("FRT0C00").await;
    let driver = h.driver();
    let stranger = h.driver();
    let order = two_stop_order(&h).await;
    let first = order.stop_points[0].id;

    h.services.freight_orders.claim(&driver, order.id, vehicle.id).await.unwrap();

    let err = h
        .services
        .freight_orders
        .start_journey_for_stop(&stranger, order.id, first, TripDetails::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::FreightNotAssigned(id) if id == order.id));
    assert_eq!(h.store.journey_count(), 0);

    let leg = h
        .services
        .freight_orders
        .start_journey_for_stop(&driver, order.id, first, TripDetails::default())
        .await
        .unwrap();
    let err = h
        .services
        .freight_orders
        .complete_stop_point(&stranger, order.id, first, leg.journey.id, end_at(10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::FreightNotAssigned(_)));
}

#[tokio::test]
async fn test_stops_must_follow_sequence() {
    let h = Harness::new();
    let vehicle = h.vehicle("FRT0D00").await;
    let driver = h.driver();
    let order = two_stop_order(&h).await;
    let second = order.stop_points[1].id;

    h.services.freight_orders.claim(&driver, order.id, vehicle.id).await.unwrap();
    let err = h
        .services
        .freight_orders
        .start_journey_for_stop(&driver, order.id, second, TripDetails::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    // Nada cambió: la orden sigue Claimed y el vehículo libre
    let order = h.services.freight_orders.get(&driver, order.id).await.unwrap();
    assert_eq!(order.status, FreightStatus::Claimed);
    let vehicle = h.services.vehicles.get(&h.manager, vehicle.id).await.unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Available);
}

#[tokio::test]
async fn test_cancel_is_refused_while_journey_active() {
    let h = Harness::new();
    let vehicle = h.vehicle("FRT0E00").await;
    let driver = h.driver();
    let order = two_stop_order(&h).await;
    let first = order.stop_points[0].id;

    h.services.freight_orders.claim(&driver, order.id, vehicle.id).await.unwrap();
    let leg = h
        .services
        .freight_orders
        .start_journey_for_stop(&driver, order.id, first, TripDetails::default())
        .await
        .unwrap();

    assert!(matches!(
        h.services.freight_orders.cancel(&h.manager, order.id).await,
        Err(AppError::InvalidTransition(_))
    ));

    h.services
        .freight_orders
        .complete_stop_point(&driver, order.id, first, leg.journey.id, end_at(15))
        .await
        .unwrap();
    let canceled = h.services.freight_orders.cancel(&h.manager, order.id).await.unwrap();
    assert_eq!(canceled.status, FreightStatus::Canceled);
}

#[tokio::test]
async fn test_order_needs_unique_sequence() {
    let h = Harness::new();
    let err = h
        .services
        .freight_orders
        .create(
            &h.manager,
            order_with_stops(&h, &[(1, StopPointType::Pickup), (1, StopPointType::Delivery)]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = h
        .services
        .freight_orders
        .create(&h.manager, order_with_stops(&h, &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_drivers_do_not_list_all_orders() {
    let h = Harness::new();
    two_stop_order(&h).await;
    let driver = h.driver();

    let as_driver = h.services.freight_orders.list(&driver, Page::default()).await.unwrap();
    assert!(as_driver.is_empty());
    let as_manager = h
        .services
        .freight_orders
        .list(&h.manager, Page::default())
        .await
        .unwrap();
    assert_eq!(as_manager.len(), 1);
}

#[tokio::test]
async fn test_freight_leg_ends_only_through_its_stop() {
    let h = Harness::new();
    let vehicle = h.vehicle("FRT0F00").await;
    let driver = h.driver();
    let order = two_stop_order(&h).await;
    let first = order.stop_points[0].id;

    h.services.freight_orders.claim(&driver, order.id, vehicle.id).await.unwrap();
    let leg = h
        .services
        .freight_orders
        .start_journey_for_stop(&driver, order.id, first, TripDetails::default())
        .await
        .unwrap();

    for principal in [&driver, &h.manager] {
        let err = h
            .services
            .journeys
            .end(principal, leg.journey.id, end_at(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    // La jornada sigue activa y el vehículo ocupado
    let journey = h.services.journeys.get(&driver, leg.journey.id).await.unwrap();
    assert!(journey.is_active);
    let in_use = h.services.vehicles.get(&h.manager, vehicle.id).await.unwrap();
    assert_eq!(in_use.status, VehicleStatus::InUse);

    let done = h
        .services
        .freight_orders
        .complete_stop_point(&driver, order.id, first, leg.journey.id, end_at(50))
        .await
        .unwrap();
    assert_eq!(done.order.stop_points[0].status, StopPointStatus::Completed);
    assert_eq!(done.vehicle.status, VehicleStatus::Available);
}
