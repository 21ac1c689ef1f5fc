use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::vehicle_cost_repository::{ensure_vehicle_in_org, insert_cost};
use super::{InventoryRepository, Page};
use crate::models::inventory::{
    InventoryItem, InventoryItemStatus, InventoryTransaction, ItemStatusChange, ItemStatusOutcome,
    NewPart, Part, PartWithStock, StockLevel, TransactionType,
};
use crate::models::vehicle_cost::VehicleCost;
use crate::utils::errors::{not_found_error, AppResult};

const PART_WITH_STOCK: &str = r#"
    SELECT p.*,
           (SELECT COUNT(*) FROM inventory_items i
             WHERE i.part_id = p.id AND i.status = 'disponivel') AS available_stock
    FROM parts p
"#;

pub struct PgInventoryRepository {
    pool: PgPool,
}

impl PgInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn lock_part(conn: &mut PgConnection, id: Uuid, organization_id: Uuid) -> AppResult<Part> {
    sqlx::query_as::<_, Part>(
        "SELECT * FROM parts WHERE id = $1 AND organization_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| not_found_error("Part", id))
}

async fn available_count(conn: &mut PgConnection, part_id: Uuid) -> AppResult<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM inventory_items WHERE part_id = $1 AND status = 'disponivel'",
    )
    .bind(part_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

async fn insert_transaction(conn: &mut PgConnection, tx: &InventoryTransaction) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_transactions (id, organization_id, item_id, part_id, user_id,
                                            transaction_type, target_status, notes,
                                            related_vehicle_id, related_user_id, timestamp)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(tx.id)
    .bind(tx.organization_id)
    .bind(tx.item_id)
    .bind(tx.part_id)
    .bind(tx.user_id)
    .bind(tx.transaction_type)
    .bind(tx.target_status)
    .bind(&tx.notes)
    .bind(tx.related_vehicle_id)
    .bind(tx.related_user_id)
    .bind(tx.timestamp)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Inserta `quantity` ítems con su transacción; la pieza debe estar bloqueada
async fn receive_items(
    conn: &mut PgConnection,
    part: &Part,
    quantity: u32,
    kind: TransactionType,
    user_id: Uuid,
    notes: Option<String>,
) -> AppResult<Vec<InventoryItem>> {
    let (last_identifier,): (i32,) = sqlx::query_as(
        "SELECT COALESCE(MAX(item_identifier), 0) FROM inventory_items WHERE part_id = $1",
    )
    .bind(part.id)
    .fetch_one(&mut *conn)
    .await?;

    let now = Utc::now();
    let mut items = Vec::with_capacity(quantity as usize);
    for offset in 1..=quantity as i32 {
        let (item, tx) =
            InventoryItem::receive(part, last_identifier + offset, kind, user_id, notes.clone(), now);

        let item = sqlx::query_as::<_, InventoryItem>(
            r#"
            INSERT INTO inventory_items (id, organization_id, part_id, item_identifier, status,
                                         created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(item.organization_id)
        .bind(item.part_id)
        .bind(item.item_identifier)
        .bind(item.status)
        .bind(item.created_at)
        .bind(item.updated_at)
        .fetch_one(&mut *conn)
        .await?;

        insert_transaction(conn, &tx).await?;
        items.push(item);
    }
    Ok(items)
}

#[async_trait]
impl InventoryRepository for PgInventoryRepository {
    async fn create_part(
        &self,
        new: NewPart,
        initial_quantity: u32,
        user_id: Uuid,
    ) -> AppResult<(Part, Vec<InventoryItem>)> {
        let part = Part::from_new(new, Utc::now());
        let mut tx = self.pool.begin().await?;

        let part = sqlx::query_as::<_, Part>(
            r#"
            INSERT INTO parts (id, organization_id, name, category, value, part_number, serial_number,
                               brand, location, notes, minimum_stock, lifespan_km, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(part.id)
        .bind(part.organization_id)
        .bind(&part.name)
        .bind(part.category)
        .bind(part.value)
        .bind(&part.part_number)
        .bind(&part.serial_number)
        .bind(&part.brand)
        .bind(&part.location)
        .bind(&part.notes)
        .bind(part.minimum_stock)
        .bind(part.lifespan_km)
        .bind(part.created_at)
        .bind(part.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let items = receive_items(
            &mut tx,
            &part,
            initial_quantity,
            TransactionType::AjusteInicial,
            user_id,
            Some("Estoque inicial".to_string()),
        )
        .await?;

        tx.commit().await?;
        Ok((part, items))
    }

    async fn find_part(&self, id: Uuid, organization_id: Uuid) -> AppResult<Option<PartWithStock>> {
        let part = sqlx::query_as::<_, PartWithStock>(&format!(
            "{} WHERE p.id = $1 AND p.organization_id = $2",
            PART_WITH_STOCK
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(part)
    }

    async fn list_parts(
        &self,
        organization_id: Uuid,
        search: Option<&str>,
        page: Page,
    ) -> AppResult<Vec<PartWithStock>> {
        let pattern = search.map(|s| format!("%{}%", s));
        let parts = sqlx::query_as::<_, PartWithStock>(&format!(
            r#"{}
            WHERE p.organization_id = $1
              AND ($2::text IS NULL OR p.name ILIKE $2 OR p.part_number ILIKE $2 OR p.brand ILIKE $2)
            ORDER BY p.name
            OFFSET $3 LIMIT $4"#,
            PART_WITH_STOCK
        ))
        .bind(organization_id)
        .bind(pattern)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(parts)
    }

    async fn add_items(
        &self,
        part_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        quantity: u32,
        notes: Option<String>,
    ) -> AppResult<Vec<InventoryItem>> {
        let mut tx = self.pool.begin().await?;
        let part = lock_part(&mut tx, part_id, organization_id).await?;
        let items = receive_items(
            &mut tx,
            &part,
            quantity,
            TransactionType::Entrada,
            user_id,
            notes,
        )
        .await?;
        tx.commit().await?;
        Ok(items)
    }

    async fn set_item_status(&self, change: ItemStatusChange) -> AppResult<ItemStatusOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut item = sqlx::query_as::<_, InventoryItem>(
            "SELECT * FROM inventory_items WHERE id = $1 AND organization_id = $2 FOR UPDATE",
        )
        .bind(change.item_id)
        .bind(change.organization_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found_error("Inventory item", change.item_id))?;

        let part = lock_part(&mut tx, item.part_id, change.organization_id).await?;
        if let Some(vehicle_id) = change.related_vehicle_id {
            ensure_vehicle_in_org(&mut tx, vehicle_id, change.organization_id).await?;
        }

        let available_before = available_count(&mut tx, part.id).await?;
        let transaction = item.transition(&change, now)?;

        let item = sqlx::query_as::<_, InventoryItem>(
            r#"
            UPDATE inventory_items
            SET status = $2, installed_on_vehicle_id = $3, installed_at = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(item.status)
        .bind(item.installed_on_vehicle_id)
        .bind(item.installed_at)
        .bind(item.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        insert_transaction(&mut tx, &transaction).await?;

        let cost = match (transaction.transaction_type, part.billable_value(), item.installed_on_vehicle_id) {
            (TransactionType::Instalacao, Some(amount), Some(vehicle_id)) => {
                let cost = VehicleCost::for_installation(&part, &item, vehicle_id, amount, now);
                Some(insert_cost(&mut tx, &cost).await?)
            }
            _ => None,
        };

        let available_after = available_count(&mut tx, part.id).await?;
        tx.commit().await?;

        Ok(ItemStatusOutcome {
            stock: StockLevel {
                part_id: part.id,
                minimum_stock: part.minimum_stock,
                available_before,
                available_after,
            },
            item,
            part,
            transaction,
            cost,
        })
    }

    async fn items_for_part(
        &self,
        part_id: Uuid,
        organization_id: Uuid,
        status: Option<InventoryItemStatus>,
    ) -> AppResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT * FROM inventory_items
            WHERE part_id = $1 AND organization_id = $2
              AND ($3::inventory_item_status IS NULL OR status = $3)
            ORDER BY item_identifier
            "#,
        )
        .bind(part_id)
        .bind(organization_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn history(
        &self,
        part_id: Uuid,
        organization_id: Uuid,
        page: Page,
    ) -> AppResult<Vec<InventoryTransaction>> {
        let transactions = sqlx::query_as::<_, InventoryTransaction>(
            r#"
            SELECT * FROM inventory_transactions
            WHERE part_id = $1 AND organization_id = $2
            ORDER BY timestamp DESC, seq DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(part_id)
        .bind(organization_id)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }
}
