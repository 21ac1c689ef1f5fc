mod common;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use common::Harness;
use fleet_ops::models::fine::{FinePatch, FineStatus, NewFine};
use fleet_ops::models::notification::NotificationType;
use fleet_ops::models::vehicle_cost::{CostType, NewVehicleCost};
use fleet_ops::repositories::memory::FaultPoint;
use fleet_ops::repositories::Page;
use fleet_ops::utils::errors::AppError;

fn fine_for(h: &Harness, vehicle_id: Uuid, driver_id: Option<Uuid>, cents: i64) -> NewFine {
    NewFine {
        organization_id: h.org,
        vehicle_id,
        driver_id,
        description: "Excesso de velocidade".to_string(),
        infraction_code: Some("745-50".to_string()),
        date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
        value: Decimal::new(cents, 2),
        status: None,
    }
}

#[tokio::test]
async fn test_fine_registers_paired_cost() {
    let mut h = Harness::new();
    let vehicle = h.vehicle("FIN3A00").await;

    let (fine, cost) = h
        .services
        .fines
        .create(&h.manager, fine_for(&h, vehicle.id, None, 15000))
        .await
        .unwrap();
    assert_eq!(fine.status, FineStatus::Pendente);
    assert_eq!(cost.fine_id, Some(fine.id));

    let costs = h.services.costs.list(&h.manager, None, None).await.unwrap();
    assert_eq!(costs.len(), 1);
    assert_eq!(costs[0].amount, Decimal::new(15000, 2));
    assert_eq!(costs[0].cost_type, CostType::Multa);
    assert_eq!(costs[0].fine_id, Some(fine.id));

    let events = h.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].notification_type, NotificationType::NewFineRegistered);
}

#[tokio::test]
async fn test_update_keeps_cost_in_sync() {
    let h = Harness::new();
    let vehicle = h.vehicle("FIN3B00").await;
    let other = h.vehicle("FIN3C00").await;
    let (fine, _) = h
        .services
        .fines
        .create(&h.manager, fine_for(&h, vehicle.id, None, 15000))
        .await
        .unwrap();

    let (updated, cost) = h
        .services
        .fines
        .update(
            &h.manager,
            fine.id,
            FinePatch {
                value: Some(Decimal::new(29347, 2)),
                vehicle_id: Some(other.id),
                status: Some(FineStatus::Paga),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, FineStatus::Paga);
    assert_eq!(cost.amount, Decimal::new(29347, 2));
    assert_eq!(cost.vehicle_id, other.id);
    assert_eq!(cost.fine_id, Some(fine.id));
}

#[tokio::test]
async fn test_failed_cost_insert_rolls_back_fine() {
    let h = Harness::new();
    let vehicle = h.vehicle("FIN3D00").await;

    h.store.fail_next(FaultPoint::CostInsert);
    let err = h
        .services
        .fines
        .create(&h.manager, fine_for(&h, vehicle.id, None, 8800))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    assert_eq!(h.store.fine_count(), 0);
    assert!(h.services.costs.list(&h.manager, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_removes_both_records() {
    let h = Harness::new();
    let vehicle = h.vehicle("FIN3E00").await;
    let (fine, cost) = h
        .services
        .fines
        .create(&h.manager, fine_for(&h, vehicle.id, None, 13016))
        .await
        .unwrap();

    // El costo pareado no se borra por su cuenta
    let err = h.services.costs.delete(&h.manager, cost.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    h.services.fines.delete(&h.manager, fine.id).await.unwrap();
    assert_eq!(h.store.fine_count(), 0);
    assert!(h.services.costs.list(&h.manager, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_without_paired_cost_is_inconsistent() {
    let h = Harness::new();
    let vehicle = h.vehicle("FIN3F00").await;
    let (fine, _) = h
        .services
        .fines
        .create(&h.manager, fine_for(&h, vehicle.id, None, 5000))
        .await
        .unwrap();

    h.store.detach_cost_from_fine(fine.id);
    let err = h
        .services
        .fines
        .update(
            &h.manager,
            fine.id,
            FinePatch {
                status: Some(FineStatus::EmRecurso),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::LedgerInconsistency(_)));

    let unchanged = h.services.fines.get(&h.manager, fine.id).await.unwrap();
    assert_eq!(unchanged.status, FineStatus::Pendente);

    // El borrado aplica la misma regla de pareo
    let err = h.services.fines.delete(&h.manager, fine.id).await.unwrap_err();
    assert!(matches!(err, AppError::LedgerInconsistency(_)));
    assert_eq!(h.store.fine_count(), 1);
}

#[tokio::test]
async fn test_fine_value_must_be_positive() {
    let h = Harness::new();
    let vehicle = h.vehicle("FIN3G00").await;
    let err = h
        .services
        .fines
        .create(&h.manager, fine_for(&h, vehicle.id, None, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.store.fine_count(), 0);
}

#[tokio::test]
async fn test_drivers_see_only_their_fines() {
    let h = Harness::new();
    let vehicle = h.vehicle("FIN3H00").await;
    let driver = h.driver();
    let other = h.driver();

    let (mine, _) = h
        .services
        .fines
        .create(&h.manager, fine_for(&h, vehicle.id, Some(driver.user_id), 1000))
        .await
        .unwrap();
    let (theirs, _) = h
        .services
        .fines
        .create(&h.manager, fine_for(&h, vehicle.id, Some(other.user_id), 2000))
        .await
        .unwrap();

    let listed = h.services.fines.list(&driver, Page::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, mine.id);

    assert!(matches!(
        h.services.fines.get(&driver, theirs.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        h.services.fines.create(&driver, fine_for(&h, vehicle.id, None, 1000)).await,
        Err(AppError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_manual_costs_cannot_be_fines() {
    let h = Harness::new();
    let vehicle = h.vehicle("CST0A00").await;
    let manual = |cost_type| NewVehicleCost {
        organization_id: h.org,
        vehicle_id: vehicle.id,
        description: "Troca de óleo".to_string(),
        amount: Decimal::new(45000, 2),
        date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        cost_type,
    };

    assert!(matches!(
        h.services.costs.create(&h.manager, manual(CostType::Multa)).await,
        Err(AppError::Validation(_))
    ));

    let cost = h
        .services
        .costs
        .create(&h.manager, manual(CostType::Manutencao))
        .await
        .unwrap();
    assert_eq!(cost.fine_id, None);
    h.services.costs.delete(&h.manager, cost.id).await.unwrap();
}

#[tokio::test]
async fn test_vehicle_with_fines_cannot_be_deleted() {
    let h = Harness::new();
    let vehicle = h.vehicle("FIN3I00").await;
    let spare = h.vehicle("FIN3J00").await;
    h.services
        .fines
        .create(&h.manager, fine_for(&h, vehicle.id, None, 7500))
        .await
        .unwrap();

    let err = h.services.vehicles.delete(&h.manager, vehicle.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(h.store.fine_count(), 1);
    assert!(h.services.vehicles.get(&h.manager, vehicle.id).await.is_ok());

    // Sin historial el borrado procede
    h.services.vehicles.delete(&h.manager, spare.id).await.unwrap();
    assert!(matches!(
        h.services.vehicles.get(&h.manager, spare.id).await,
        Err(AppError::NotFound(_))
    ));
}
