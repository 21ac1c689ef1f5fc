mod common;

use common::Harness;
use fleet_ops::models::journey::{JourneyEnd, JourneyFilters, TripDetails};
use fleet_ops::models::notification::NotificationType;
use fleet_ops::models::vehicle::VehicleStatus;
use fleet_ops::repositories::Page;
use fleet_ops::utils::errors::AppError;

fn trip(destination: &str) -> TripDetails {
    TripDetails {
        trip_type: Some("entrega".to_string()),
        destination_address: Some(destination.to_string()),
        trip_description: None,
    }
}

#[tokio::test]
async fn test_second_driver_cannot_take_vehicle_in_use() {
    let mut h = Harness::new();
    let vehicle = h.vehicle("ABC1D23").await;
    let d1 = h.driver();
    let d2 = h.driver();

    let (journey, in_use) = h
        .services
        .journeys
        .start(&d1, vehicle.id, trip("Porto Alegre"))
        .await
        .unwrap();
    assert!(journey.is_active);
    assert_eq!(in_use.status, VehicleStatus::InUse);

    let err = h
        .services
        .journeys
        .start(&d2, vehicle.id, TripDetails::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::VehicleNotAvailable(id) if id == vehicle.id));

    let (ended, released) = h
        .services
        .journeys
        .end(
            &d1,
            journey.id,
            JourneyEnd {
                end_mileage: Some(500),
                end_engine_hours: None,
            },
        )
        .await
        .unwrap();
    assert!(!ended.is_active);
    assert!(ended.end_time.is_some());
    assert_eq!(released.status, VehicleStatus::Available);
    assert_eq!(released.current_km, 500);

    let kinds: Vec<NotificationType> = h
        .drain_events()
        .into_iter()
        .map(|n| n.notification_type)
        .collect();
    assert_eq!(
        kinds,
        vec![NotificationType::JourneyStarted, NotificationType::JourneyEnded]
    );
}

#[tokio::test]
async fn test_mileage_cannot_go_backwards() {
    let h = Harness::new();
    let vehicle = h.vehicle("KMS0K00").await;
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
                end_mileage: Some(120),
                end_engine_hours: None,
            },
        )
        .await
        .unwrap();

    let (journey, _) = h
        .services
        .journeys
        .start(&driver, vehicle.id, TripDetails::default())
        .await
        .unwrap();
    assert_eq!(journey.start_mileage, 120);

    let err = h
        .services
        .journeys
        .end(
            &driver,
            journey.id,
            JourneyEnd {
                end_mileage: Some(100),
                end_engine_hours: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // El fallo no toca ni la jornada ni el vehículo
    let still_active = h.services.journeys.get(&driver, journey.id).await.unwrap();
    assert!(still_active.is_active);
    assert_eq!(h.store.active_journeys_for(vehicle.id), 1);
}

#[tokio::test]
async fn test_other_driver_cannot_end_journey() {
    let h = Harness::new();
    let vehicle = h.vehicle("OWN3R00").await;
    let owner = h.driver();
    let intruder = h.driver();

    let (journey, _) = h
        .services
        .journeys
        .start(&owner, vehicle.id, TripDetails::default())
        .await
        .unwrap();

    // Para otro conductor la jornada no es visible
    let err = h
        .services
        .journeys
        .end(&intruder, journey.id, JourneyEnd::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_) | AppError::Forbidden(_)));

    // Un gestor sí puede cerrarla
    let (ended, _) = h
        .services
        .journeys
        .end(&h.manager, journey.id, JourneyEnd::default())
        .await
        .unwrap();
    assert!(!ended.is_active);
}

#[tokio::test]
async fn test_vehicle_in_maintenance_is_not_available() {
    let h = Harness::new();
    let vehicle = h.vehicle("MNT4N00").await;
    let driver = h.driver();

    let v = h
        .services
        .vehicles
        .enter_maintenance(&h.manager, vehicle.id)
        .await
        .unwrap();
    assert_eq!(v.status, VehicleStatus::Maintenance);

    let err = h
        .services
        .journeys
        .start(&driver, vehicle.id, TripDetails::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::VehicleNotAvailable(_)));

    let v = h
        .services
        .vehicles
        .leave_maintenance(&h.manager, vehicle.id)
        .await
        .unwrap();
    assert_eq!(v.status, VehicleStatus::Available);
}

#[tokio::test]
async fn test_active_journey_cannot_be_deleted() {
    let h = Harness::new();
    let vehicle = h.vehicle("DEL3T00").await;
    let driver = h.driver();
    let (journey, _) = h
        .services
        .journeys
        .start(&driver, vehicle.id, TripDetails::default())
        .await
        .unwrap();

    let err = h
        .services
        .journeys
        .delete(&h.manager, journey.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    h.services
        .journeys
        .end(&driver, journey.id, JourneyEnd::default())
        .await
        .unwrap();
    h.services
        .journeys
        .delete(&h.manager, journey.id)
        .await
        .unwrap();
    assert_eq!(h.store.journey_count(), 0);
}

#[tokio::test]
async fn test_drivers_only_list_their_own_journeys() {
    let h = Harness::new();
    let v1 = h.vehicle("LST1A00").await;
    let v2 = h.vehicle("LST2B00").await;
    let d1 = h.driver();
    let d2 = h.driver();

    h.services.journeys.start(&d1, v1.id, TripDetails::default()).await.unwrap();
    h.services.journeys.start(&d2, v2.id, TripDetails::default()).await.unwrap();

    let mine = h
        .services
        .journeys
        .list(&d1, JourneyFilters::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].driver_id, d1.user_id);

    let all = h
        .services
        .journeys
        .list(&h.manager, JourneyFilters::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let active = h.services.journeys.active_for_current_driver(&d2).await.unwrap();
    assert_eq!(active.map(|j| j.vehicle_id), Some(v2.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_admit_exactly_one() {
    let h = Harness::new();
    let vehicle_id = h.vehicle("RACE000").await.id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let journeys = h.services.journeys.clone();
        let driver = h.driver();
        handles.push(tokio::spawn(async move {
            journeys
                .start(&driver, vehicle_id, TripDetails::default())
                .await
        }));
    }

    let mut started = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => started += 1,
            Err(AppError::VehicleNotAvailable(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(started, 1);
    assert_eq!(h.store.active_journeys_for(vehicle_id), 1);
}
