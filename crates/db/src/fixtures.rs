use sqlx::Row;

use orderdesk_core::errors::StoreError;

use crate::repositories::backend;
use crate::DbPool;

pub const SEED_ORGANIZATION: &str = "org-greenleaf";
pub const SEED_INTAKE_EVENT: &str = "intake-seed-001";
pub const SEED_ORDER: &str = "ord-seed-friday";

struct SeedCustomer {
    id: &'static str,
    name: &'static str,
    email: &'static str,
}

struct SeedItem {
    id: &'static str,
    sku: &'static str,
    name: &'static str,
}

const SEED_CUSTOMERS: &[SeedCustomer] = &[
    SeedCustomer { id: "cust-bluedoor", name: "Blue Door Bistro", email: "orders@bluedoor.example" },
    SeedCustomer {
        id: "cust-harvest",
        name: "Harvest Table Kitchen",
        email: "chef@harvesttable.example",
    },
];

const SEED_ITEMS: &[SeedItem] = &[
    SeedItem { id: "item-anise", sku: "ANI-001", name: "Anise Hyssop" },
    SeedItem { id: "item-cilantro", sku: "CIL-001", name: "Cilantro" },
    SeedItem { id: "item-sunflower", sku: "SUN-001", name: "Sunflower" },
    SeedItem { id: "item-shiso", sku: "SHI-001", name: "Shiso Green" },
];

const SEED_DELIVERY_DATE: &str = "2026-03-06";
const SEED_TIMESTAMP: &str = "2026-03-01T08:00:00+00:00";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub customers: usize,
    pub items: usize,
    pub orders: usize,
    pub intake_events: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub passed: bool,
    pub failures: Vec<String>,
}

/// Deterministic demo dataset: a greenhouse catalog, two customers, one
/// upcoming Friday order, and the intake event the demo flows hang off.
/// Safe to run repeatedly.
pub async fn seed(pool: &DbPool) -> Result<SeedResult, StoreError> {
    for customer in SEED_CUSTOMERS {
        sqlx::query(
            "INSERT INTO customer (id, organization_id, name, contact_email, contact_phone,
                                   notes, item_notes_json, created_at)
             VALUES (?, ?, ?, ?, NULL, NULL, '{}', ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(customer.id)
        .bind(SEED_ORGANIZATION)
        .bind(customer.name)
        .bind(customer.email)
        .bind(SEED_TIMESTAMP)
        .execute(pool)
        .await
        .map_err(backend)?;
    }

    for item in SEED_ITEMS {
        sqlx::query(
            "INSERT INTO item (id, organization_id, sku, name) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(item.id)
        .bind(SEED_ORGANIZATION)
        .bind(item.sku)
        .bind(item.name)
        .execute(pool)
        .await
        .map_err(backend)?;

        for (suffix, code, variant_name) in [("s", "S", "Small"), ("l", "L", "Large")] {
            sqlx::query(
                "INSERT INTO item_variant (id, item_id, code, name, notes)
                 VALUES (?, ?, ?, ?, NULL)
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(format!("{}-{suffix}", item.id))
            .bind(item.id)
            .bind(code)
            .bind(variant_name)
            .execute(pool)
            .await
            .map_err(backend)?;
        }
    }

    sqlx::query(
        "INSERT INTO customer_order (id, organization_id, customer_id, customer_name,
                                     delivery_date, status, created_at, updated_at)
         VALUES (?, ?, 'cust-bluedoor', 'Blue Door Bistro', ?, 'ready', ?, ?)
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(SEED_ORDER)
    .bind(SEED_ORGANIZATION)
    .bind(SEED_DELIVERY_DATE)
    .bind(SEED_TIMESTAMP)
    .bind(SEED_TIMESTAMP)
    .execute(pool)
    .await
    .map_err(backend)?;

    for (line_id, number, item_id, variant_id, name) in [
        ("ord-seed-friday-l1", 1, "item-cilantro", "item-cilantro-l", "Cilantro"),
        ("ord-seed-friday-l2", 2, "item-sunflower", "item-sunflower-l", "Sunflower"),
    ] {
        sqlx::query(
            "INSERT INTO order_line (id, order_id, line_number, item_id, variant_id,
                                     product_name, quantity, status)
             VALUES (?, ?, ?, ?, ?, ?, 1, 'active')
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(line_id)
        .bind(SEED_ORDER)
        .bind(number)
        .bind(item_id)
        .bind(variant_id)
        .bind(name)
        .execute(pool)
        .await
        .map_err(backend)?;
    }

    sqlx::query(
        "INSERT INTO intake_event (id, organization_id, channel, raw_content, received_at)
         VALUES (?, ?, 'sms', 'add 2 large shiso green to friday', ?)
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(SEED_INTAKE_EVENT)
    .bind(SEED_ORGANIZATION)
    .bind(SEED_TIMESTAMP)
    .execute(pool)
    .await
    .map_err(backend)?;

    Ok(SeedResult {
        customers: SEED_CUSTOMERS.len(),
        items: SEED_ITEMS.len(),
        orders: 1,
        intake_events: 1,
    })
}

/// Contract check over the seeded dataset; used by the CLI doctor/seed
/// commands and the seed contract test.
pub async fn verify(pool: &DbPool) -> Result<VerificationResult, StoreError> {
    let mut failures = Vec::new();

    let checks: &[(&str, &str, i64)] = &[
        ("customers", "SELECT COUNT(*) AS count FROM customer WHERE organization_id = ?", 2),
        ("items", "SELECT COUNT(*) AS count FROM item WHERE organization_id = ?", 4),
        (
            "variants",
            "SELECT COUNT(*) AS count FROM item_variant v JOIN item i ON i.id = v.item_id
             WHERE i.organization_id = ?",
            8,
        ),
        ("orders", "SELECT COUNT(*) AS count FROM customer_order WHERE organization_id = ?", 1),
        (
            "intake events",
            "SELECT COUNT(*) AS count FROM intake_event WHERE organization_id = ?",
            1,
        ),
    ];

    for (label, query, expected) in checks {
        let count: i64 = sqlx::query(query)
            .bind(SEED_ORGANIZATION)
            .fetch_one(pool)
            .await
            .map_err(backend)?
            .try_get("count")
            .map_err(|error| StoreError::Decode(error.to_string()))?;
        if count != *expected {
            failures.push(format!("expected {expected} seeded {label}, found {count}"));
        }
    }

    let line_count: i64 =
        sqlx::query("SELECT COUNT(*) AS count FROM order_line WHERE order_id = ?")
            .bind(SEED_ORDER)
            .fetch_one(pool)
            .await
            .map_err(backend)?
            .try_get("count")
            .map_err(|error| StoreError::Decode(error.to_string()))?;
    if line_count != 2 {
        failures.push(format!("expected 2 lines on the seed order, found {line_count}"));
    }

    Ok(VerificationResult { passed: failures.is_empty(), failures })
}
