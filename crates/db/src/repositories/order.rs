use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use orderdesk_core::domain::customer::CustomerId;
use orderdesk_core::domain::events::{OrderEvent, OrderEventId, OrderEventKind};
use orderdesk_core::domain::item::{ItemId, VariantId};
use orderdesk_core::domain::order::{
    Order, OrderId, OrderLine, OrderLineId, OrderLineStatus, OrderStatus,
};
use orderdesk_core::domain::proposal::ProposalId;
use orderdesk_core::domain::OrganizationId;
use orderdesk_core::errors::StoreError;
use orderdesk_core::ports::OrderStore;

use super::{backend, decode};
use crate::DbPool;

pub struct SqlOrderStore {
    pool: DbPool,
}

impl SqlOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn lines_for(&self, order_id: &str) -> Result<Vec<OrderLine>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, order_id, line_number, item_id, variant_id, product_name, quantity, status
             FROM order_line WHERE order_id = ? ORDER BY line_number",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_line).collect()
    }

    async fn hydrate(&self, rows: Vec<sqlx::sqlite::SqliteRow>) -> Result<Vec<Order>, StoreError> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut order = row_to_order(row)?;
            order.lines = self.lines_for(&order.id.0).await?;
            orders.push(order);
        }
        Ok(orders)
    }
}

const ORDER_COLUMNS: &str = "id, organization_id, customer_id, customer_name, delivery_date, \
                             status, created_at, updated_at";

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order, StoreError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode)?;
    let customer_id: Option<String> = row.try_get("customer_id").map_err(decode)?;
    let customer_name: String = row.try_get("customer_name").map_err(decode)?;
    let delivery_date_str: String = row.try_get("delivery_date").map_err(decode)?;
    let status_str: String = row.try_get("status").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;
    let updated_at_str: String = row.try_get("updated_at").map_err(decode)?;

    let delivery_date = delivery_date_str
        .parse::<NaiveDate>()
        .map_err(|_| StoreError::Decode(format!("invalid delivery_date `{delivery_date_str}`")))?;
    let status = OrderStatus::parse(&status_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown order status `{status_str}`")))?;

    Ok(Order {
        id: OrderId(id),
        organization_id: OrganizationId(organization_id),
        customer_id: customer_id.map(CustomerId),
        customer_name,
        delivery_date,
        status,
        lines: Vec::new(),
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn row_to_line(row: &sqlx::sqlite::SqliteRow) -> Result<OrderLine, StoreError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let order_id: String = row.try_get("order_id").map_err(decode)?;
    let line_number: i64 = row.try_get("line_number").map_err(decode)?;
    let item_id: Option<String> = row.try_get("item_id").map_err(decode)?;
    let variant_id: Option<String> = row.try_get("variant_id").map_err(decode)?;
    let product_name: String = row.try_get("product_name").map_err(decode)?;
    let quantity: i64 = row.try_get("quantity").map_err(decode)?;
    let status_str: String = row.try_get("status").map_err(decode)?;

    let status = OrderLineStatus::parse(&status_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown line status `{status_str}`")))?;

    Ok(OrderLine {
        id: OrderLineId(id),
        order_id: OrderId(order_id),
        line_number: line_number as u32,
        item_id: item_id.map(ItemId),
        variant_id: variant_id.map(VariantId),
        product_name,
        quantity: quantity as u32,
        status,
    })
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<OrderEvent, StoreError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let order_id: String = row.try_get("order_id").map_err(decode)?;
    let proposal_id: Option<String> = row.try_get("proposal_id").map_err(decode)?;
    let kind_str: String = row.try_get("kind").map_err(decode)?;
    let summary: String = row.try_get("summary").map_err(decode)?;
    let payload_json: String = row.try_get("payload_json").map_err(decode)?;
    let occurred_at_str: String = row.try_get("occurred_at").map_err(decode)?;

    let kind = OrderEventKind::parse(&kind_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown event kind `{kind_str}`")))?;
    let payload = serde_json::from_str(&payload_json).map_err(decode)?;

    Ok(OrderEvent {
        id: OrderEventId(id),
        order_id: OrderId(order_id),
        proposal_id: proposal_id.map(ProposalId),
        kind,
        summary,
        payload,
        occurred_at: parse_timestamp(&occurred_at_str),
    })
}

#[async_trait]
impl OrderStore for SqlOrderStore {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(ref row) => {
                let mut order = row_to_order(row)?;
                order.lines = self.lines_for(&order.id.0).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn upcoming_for_customer(
        &self,
        organization_id: &OrganizationId,
        customer_id: &CustomerId,
        on_or_after: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order
             WHERE organization_id = ? AND customer_id = ? AND status != 'cancelled'
               AND delivery_date >= ?
             ORDER BY delivery_date ASC LIMIT ?"
        ))
        .bind(&organization_id.0)
        .bind(&customer_id.0)
        .bind(on_or_after.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        self.hydrate(rows).await
    }

    async fn recent_for_customer(
        &self,
        organization_id: &OrganizationId,
        customer_id: &CustomerId,
        before: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order
             WHERE organization_id = ? AND customer_id = ? AND status != 'cancelled'
               AND delivery_date < ?
             ORDER BY delivery_date DESC LIMIT ?"
        ))
        .bind(&organization_id.0)
        .bind(&customer_id.0)
        .bind(before.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        self.hydrate(rows).await
    }

    async fn upcoming_for_organization(
        &self,
        organization_id: &OrganizationId,
        on_or_after: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order
             WHERE organization_id = ? AND status != 'cancelled' AND delivery_date >= ?
             ORDER BY delivery_date ASC LIMIT ?"
        ))
        .bind(&organization_id.0)
        .bind(on_or_after.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        self.hydrate(rows).await
    }

    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO customer_order (id, organization_id, customer_id, customer_name,
                                         delivery_date, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 customer_id = excluded.customer_id,
                 customer_name = excluded.customer_name,
                 delivery_date = excluded.delivery_date,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
        )
        .bind(&order.id.0)
        .bind(&order.organization_id.0)
        .bind(order.customer_id.as_ref().map(|id| id.0.as_str()))
        .bind(&order.customer_name)
        .bind(order.delivery_date.to_string())
        .bind(order.status.as_str())
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        // Lines are only ever added or updated in place; deleted lines stay
        // as rows with status 'deleted'.
        for line in &order.lines {
            sqlx::query(
                "INSERT INTO order_line (id, order_id, line_number, item_id, variant_id,
                                         product_name, quantity, status)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     item_id = excluded.item_id,
                     variant_id = excluded.variant_id,
                     product_name = excluded.product_name,
                     quantity = excluded.quantity,
                     status = excluded.status",
            )
            .bind(&line.id.0)
            .bind(&line.order_id.0)
            .bind(line.line_number)
            .bind(line.item_id.as_ref().map(|id| id.0.as_str()))
            .bind(line.variant_id.as_ref().map(|id| id.0.as_str()))
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)
    }

    async fn append_event(&self, event: &OrderEvent) -> Result<(), StoreError> {
        let payload_json = serde_json::to_string(&event.payload).map_err(decode)?;

        sqlx::query(
            "INSERT INTO order_event (id, order_id, proposal_id, kind, summary, payload_json,
                                      occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id.0)
        .bind(&event.order_id.0)
        .bind(event.proposal_id.as_ref().map(|id| id.0.as_str()))
        .bind(event.kind.as_str())
        .bind(&event.summary)
        .bind(payload_json)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn events_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, order_id, proposal_id, kind, summary, payload_json, occurred_at
             FROM order_event WHERE order_id = ? ORDER BY occurred_at ASC, id ASC",
        )
        .bind(&order_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_event).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use orderdesk_core::domain::customer::CustomerId;
    use orderdesk_core::domain::events::{OrderEvent, OrderEventKind};
    use orderdesk_core::domain::order::{OrderId, OrderLineStatus, OrderStatus};
    use orderdesk_core::domain::OrganizationId;
    use orderdesk_core::ports::OrderStore;

    use super::SqlOrderStore;
    use crate::{connect_with_settings, fixtures, migrations};

    async fn seeded_store() -> SqlOrderStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        fixtures::seed(&pool).await.expect("seed");
        SqlOrderStore::new(pool)
    }

    fn org() -> OrganizationId {
        OrganizationId(fixtures::SEED_ORGANIZATION.to_string())
    }

    #[tokio::test]
    async fn find_by_id_hydrates_lines_in_line_number_order() {
        let store = seeded_store().await;

        let order = store
            .find_by_id(&OrderId("ord-seed-friday".to_string()))
            .await
            .expect("query")
            .expect("seed order");

        assert_eq!(order.status, OrderStatus::Ready);
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[0].line_number, 1);
        assert_eq!(order.lines[0].product_name, "Cilantro");
        assert_eq!(order.lines[1].product_name, "Sunflower");
    }

    #[tokio::test]
    async fn upcoming_query_applies_date_window_and_excludes_cancelled() {
        let store = seeded_store().await;
        let pivot = NaiveDate::from_ymd_opt(2026, 3, 2).expect("date");

        let upcoming = store
            .upcoming_for_customer(&org(), &CustomerId("cust-bluedoor".to_string()), pivot, 5)
            .await
            .expect("query");
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id.0, "ord-seed-friday");

        let after = NaiveDate::from_ymd_opt(2026, 3, 7).expect("date");
        let none = store
            .upcoming_for_customer(&org(), &CustomerId("cust-bluedoor".to_string()), after, 5)
            .await
            .expect("query");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn save_round_trips_status_and_line_mutations() {
        let store = seeded_store().await;
        let id = OrderId("ord-seed-friday".to_string());

        let mut order = store.find_by_id(&id).await.expect("query").expect("order");
        order.transition_to(OrderStatus::PendingReview).expect("transition");
        order.lines[0].status = OrderLineStatus::Deleted;
        store.save(&order).await.expect("save");

        let reloaded = store.find_by_id(&id).await.expect("query").expect("order");
        assert_eq!(reloaded.status, OrderStatus::PendingReview);
        assert_eq!(reloaded.lines[0].status, OrderLineStatus::Deleted);
        assert_eq!(reloaded.lines.len(), 2, "deleted lines are retained");
    }

    #[tokio::test]
    async fn events_append_and_read_back_in_order() {
        let store = seeded_store().await;
        let id = OrderId("ord-seed-friday".to_string());

        store
            .append_event(&OrderEvent::new(
                id.clone(),
                None,
                OrderEventKind::ProposalCreated,
                "1 add(s) proposed",
                json!({ "adds": 1 }),
            ))
            .await
            .expect("append");

        let events = store.events_for_order(&id).await.expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, OrderEventKind::ProposalCreated);
        assert_eq!(events[0].payload["adds"], 1);
    }
}
