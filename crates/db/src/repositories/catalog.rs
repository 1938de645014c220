use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::Row;

use orderdesk_core::domain::customer::{Customer, CustomerId};
use orderdesk_core::domain::item::{Item, ItemId, ItemVariant, VariantId};
use orderdesk_core::domain::OrganizationId;
use orderdesk_core::errors::StoreError;
use orderdesk_core::ports::CatalogStore;
use orderdesk_core::snapshot::CatalogSnapshot;

use super::{backend, decode};
use crate::DbPool;

pub struct SqlCatalogStore {
    pool: DbPool,
}

impl SqlCatalogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer, StoreError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode)?;
    let name: String = row.try_get("name").map_err(decode)?;
    let contact_email: Option<String> = row.try_get("contact_email").map_err(decode)?;
    let contact_phone: Option<String> = row.try_get("contact_phone").map_err(decode)?;
    let notes: Option<String> = row.try_get("notes").map_err(decode)?;
    let item_notes_json: String = row.try_get("item_notes_json").map_err(decode)?;

    let raw_notes: BTreeMap<String, String> =
        serde_json::from_str(&item_notes_json).map_err(decode)?;
    let item_notes = raw_notes.into_iter().map(|(key, value)| (ItemId(key), value)).collect();

    Ok(Customer {
        id: CustomerId(id),
        organization_id: OrganizationId(organization_id),
        name,
        contact_email,
        contact_phone,
        notes,
        item_notes,
    })
}

#[async_trait]
impl CatalogStore for SqlCatalogStore {
    async fn load_snapshot(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<CatalogSnapshot, StoreError> {
        let customer_rows = sqlx::query(
            "SELECT id, organization_id, name, contact_email, contact_phone, notes, item_notes_json
             FROM customer WHERE organization_id = ? ORDER BY name",
        )
        .bind(&organization_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let customers =
            customer_rows.iter().map(row_to_customer).collect::<Result<Vec<_>, _>>()?;

        let item_rows = sqlx::query(
            "SELECT id, organization_id, sku, name FROM item
             WHERE organization_id = ? ORDER BY name",
        )
        .bind(&organization_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let variant_rows = sqlx::query(
            "SELECT v.id, v.item_id, v.code, v.name, v.notes
             FROM item_variant v JOIN item i ON i.id = v.item_id
             WHERE i.organization_id = ? ORDER BY v.code",
        )
        .bind(&organization_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut variants_by_item: BTreeMap<String, Vec<ItemVariant>> = BTreeMap::new();
        for row in &variant_rows {
            let item_id: String = row.try_get("item_id").map_err(decode)?;
            let variant = ItemVariant {
                id: VariantId(row.try_get("id").map_err(decode)?),
                code: row.try_get("code").map_err(decode)?,
                name: row.try_get("name").map_err(decode)?,
                notes: row.try_get("notes").map_err(decode)?,
            };
            variants_by_item.entry(item_id).or_default().push(variant);
        }

        let mut items = Vec::with_capacity(item_rows.len());
        for row in &item_rows {
            let id: String = row.try_get("id").map_err(decode)?;
            items.push(Item {
                variants: variants_by_item.remove(&id).unwrap_or_default(),
                id: ItemId(id),
                organization_id: OrganizationId(
                    row.try_get::<String, _>("organization_id").map_err(decode)?,
                ),
                sku: row.try_get("sku").map_err(decode)?,
                name: row.try_get("name").map_err(decode)?,
            });
        }

        Ok(CatalogSnapshot::new(organization_id.clone(), customers, items))
    }
}
