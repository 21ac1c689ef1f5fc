mod common;

use rust_decimal::Decimal;

use common::Harness;
use fleet_ops::models::inventory::{InventoryItemStatus, NewPart, Part, PartCategory, TransactionType};
use fleet_ops::models::notification::NotificationType;
use fleet_ops::models::vehicle_cost::CostType;
use fleet_ops::repositories::memory::FaultPoint;
use fleet_ops::repositories::Page;
use fleet_ops::utils::errors::AppError;

fn filter_part(h: &Harness, minimum_stock: i32, value: Option<Decimal>) -> NewPart {
    NewPart {
        organization_id: h.org,
        name: "Filtro de óleo".to_string(),
        category: PartCategory::Peca,
        value,
        part_number: Some("FO-220".to_string()),
        serial_number: None,
        brand: Some("Mann".to_string()),
        location: Some("Prateleira B2".to_string()),
        notes: None,
        minimum_stock,
        lifespan_km: Some(15_000),
    }
}

async fn part_with(h: &Harness, minimum_stock: i32, value: Option<Decimal>) -> Part {
    let (part, items) = h
        .services
        .inventory
        .create_part(&h.manager, filter_part(h, minimum_stock, value), 0)
        .await
        .unwrap();
    assert!(items.is_empty());
    part
}

#[tokio::test]
async fn test_low_stock_is_emitted_once() {
    let mut h = Harness::new();
    let part = part_with(&h, 2, None).await;

    let items = h
        .services
        .inventory
        .add_items(&h.manager, part.id, 3, Some("Compra NF 1021".to_string()))
        .await
        .unwrap();
    assert_eq!(items.len(), 3);

    for item in items.iter().take(2) {
        h.services
            .inventory
            .set_item_status(&h.manager, item.id, InventoryItemStatus::FimDeVida, None, None)
            .await
            .unwrap();
    }

    let stock = h.services.inventory.get_part(&h.manager, part.id).await.unwrap();
    assert_eq!(stock.available_stock, 1);

    let low_stock = h
        .drain_events()
        .into_iter()
        .filter(|n| n.notification_type == NotificationType::LowStock)
        .count();
    assert_eq!(low_stock, 1);
}

#[tokio::test]
async fn test_add_items_writes_one_transaction_per_item() {
    let h = Harness::new();
    let part = part_with(&h, 0, None).await;

    let first = h
        .services
        .inventory
        .add_items(&h.manager, part.id, 4, None)
        .await
        .unwrap();
    let second = h
        .services
        .inventory
        .add_items(&h.manager, part.id, 2, None)
        .await
        .unwrap();

    let identifiers: Vec<i32> = first
        .iter()
        .chain(second.iter())
        .map(|i| i.item_identifier)
        .collect();
    assert_eq!(identifiers, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(h.store.item_count_for_part(part.id), 6);
    assert_eq!(h.store.transaction_count_for_part(part.id), 6);

    let history = h
        .services
        .inventory
        .history(&h.manager, part.id, Page::default())
        .await
        .unwrap();
    assert!(history.iter().all(|t| t.transaction_type == TransactionType::Entrada));
}

#[tokio::test]
async fn test_initial_stock_is_an_adjustment() {
    let h = Harness::new();
    let (part, items) = h
        .services
        .inventory
        .create_part(&h.manager, filter_part(&h, 1, None), 5)
        .await
        .unwrap();
    assert_eq!(items.len(), 5);

    let history = h
        .services
        .inventory
        .history(&h.manager, part.id, Page::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 5);
    assert!(history
        .iter()
        .all(|t| t.transaction_type == TransactionType::AjusteInicial));
}

#[tokio::test]
async fn test_batch_bounds_are_enforced() {
    let h = Harness::new();
    let part = part_with(&h, 0, None).await;

    for quantity in [0, 1001] {
        let err = h
            .services
            .inventory
            .add_items(&h.manager, part.id, quantity, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
    assert_eq!(h.store.item_count_for_part(part.id), 0);
}

#[tokio::test]
async fn test_failed_transaction_rolls_back_batch() {
    let h = Harness::new();
    let part = part_with(&h, 0, None).await;

    h.store.fail_next(FaultPoint::InventoryTransactionInsert);
    let err = h
        .services
        .inventory
        .add_items(&h.manager, part.id, 3, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    assert_eq!(h.store.item_count_for_part(part.id), 0);
    assert_eq!(h.store.transaction_count_for_part(part.id), 0);
}

#[tokio::test]
async fn test_install_books_parts_cost() {
    let h = Harness::new();
    let vehicle = h.vehicle("PEC4S00").await;
    let part = part_with(&h, 0, Some(Decimal::new(8990, 2))).await;
    let items = h
        .services
        .inventory
        .add_items(&h.manager, part.id, 1, None)
        .await
        .unwrap();

    let outcome = h
        .services
        .inventory
        .set_item_status(
            &h.manager,
            items[0].id,
            InventoryItemStatus::EmUso,
            Some(vehicle.id),
            Some("Revisão 30 mil".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(outcome.item.installed_on_vehicle_id, Some(vehicle.id));
    assert_eq!(outcome.transaction.transaction_type, TransactionType::Instalacao);
    let cost = outcome.cost.unwrap();
    assert_eq!(cost.cost_type, CostType::PecasComponentes);
    assert_eq!(cost.amount, Decimal::new(8990, 2));

    // Retorno al estoque
    let back = h
        .services
        .inventory
        .set_item_status(&h.manager, items[0].id, InventoryItemStatus::Disponivel, None, None)
        .await
        .unwrap();
    assert_eq!(back.transaction.transaction_type, TransactionType::Retorno);
    assert_eq!(back.item.installed_on_vehicle_id, None);
}

#[tokio::test]
async fn test_end_of_life_is_terminal() {
    let h = Harness::new();
    let part = part_with(&h, 0, None).await;
    let items = h
        .services
        .inventory
        .add_items(&h.manager, part.id, 1, None)
        .await
        .unwrap();

    h.services
        .inventory
        .set_item_status(&h.manager, items[0].id, InventoryItemStatus::FimDeVida, None, None)
        .await
        .unwrap();
    let err = h
        .services
        .inventory
        .set_item_status(&h.manager, items[0].id, InventoryItemStatus::Disponivel, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    assert_eq!(h.store.transaction_count_for_part(part.id), 2);
}

#[tokio::test]
async fn test_install_requires_vehicle() {
    let h = Harness::new();
    let part = part_with(&h, 0, None).await;
    let items = h
        .services
        .inventory
        .add_items(&h.manager, part.id, 1, None)
        .await
        .unwrap();

    let err = h
        .services
        .inventory
        .set_item_status(&h.manager, items[0].id, InventoryItemStatus::EmUso, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let still = h
        .services
        .inventory
        .items_for_part(&h.manager, part.id, Some(InventoryItemStatus::Disponivel))
        .await
        .unwrap();
    assert_eq!(still.len(), 1);
}

#[tokio::test]
async fn test_history_lists_newest_entry_first_within_batch() {
    let h = Harness::new();
    let part = part_with(&h, 0, None).await;
    let items = h
        .services
        .inventory
        .add_items(&h.manager, part.id, 4, None)
        .await
        .unwrap();

    let history = h
        .services
        .inventory
        .history(&h.manager, part.id, Page::default())
        .await
        .unwrap();
    let listed: Vec<_> = history.iter().map(|t| t.item_id).collect();
    let newest_first: Vec<_> = items.iter().rev().map(|i| i.id).collect();
    assert_eq!(listed, newest_first);
}
