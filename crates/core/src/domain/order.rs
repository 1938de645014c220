use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::item::{ItemId, VariantId};
use crate::domain::OrganizationId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLineId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Ready,
    PendingReview,
    Cancelled,
    PushedToErp,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Ready => "ready",
            Self::PendingReview => "pending_review",
            Self::Cancelled => "cancelled",
            Self::PushedToErp => "pushed_to_erp",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "ready" => Some(Self::Ready),
            "pending_review" => Some(Self::PendingReview),
            "cancelled" => Some(Self::Cancelled),
            "pushed_to_erp" => Some(Self::PushedToErp),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderLineStatus {
    Active,
    Deleted,
}

impl OrderLineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// One line of an order. Deleted lines are retained for audit; they keep
/// their line number forever.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub line_number: u32,
    pub item_id: Option<ItemId>,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub quantity: u32,
    pub status: OrderLineStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub organization_id: OrganizationId,
    pub customer_id: Option<CustomerId>,
    /// Denormalized snapshot of the customer name at order time.
    pub customer_name: String,
    pub delivery_date: NaiveDate,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn active_lines(&self) -> Vec<&OrderLine> {
        self.lines.iter().filter(|line| line.status == OrderLineStatus::Active).collect()
    }

    /// Line numbers are unique and stable. Deleted lines still occupy their
    /// number, so the next number ranges over every line ever written.
    pub fn next_line_number(&self) -> u32 {
        self.lines.iter().map(|line| line.line_number).max().unwrap_or(0) + 1
    }

    pub fn line_by_id(&self, id: &OrderLineId) -> Option<&OrderLine> {
        self.lines.iter().find(|line| &line.id == id)
    }

    pub fn line_by_id_mut(&mut self, id: &OrderLineId) -> Option<&mut OrderLine> {
        self.lines.iter_mut().find(|line| &line.id == id)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self.status, next),
            (OrderStatus::Draft, OrderStatus::Ready)
                | (OrderStatus::Draft, OrderStatus::PendingReview)
                | (OrderStatus::Ready, OrderStatus::PendingReview)
                | (OrderStatus::PushedToErp, OrderStatus::PendingReview)
                | (OrderStatus::PendingReview, OrderStatus::Ready)
                | (OrderStatus::Ready, OrderStatus::PushedToErp)
                | (
                    OrderStatus::Draft
                        | OrderStatus::Ready
                        | OrderStatus::PendingReview
                        | OrderStatus::PushedToErp,
                    OrderStatus::Cancelled,
                )
        )
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use crate::domain::item::{ItemId, VariantId};
    use crate::domain::OrganizationId;
    use crate::errors::DomainError;

    use super::{Order, OrderId, OrderLine, OrderLineId, OrderLineStatus, OrderStatus};

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId("ord-1".to_string()),
            organization_id: OrganizationId("org-1".to_string()),
            customer_id: None,
            customer_name: "Blue Door Bistro".to_string(),
            delivery_date: NaiveDate::from_ymd_opt(2026, 3, 6).expect("valid date"),
            status,
            lines: vec![
                OrderLine {
                    id: OrderLineId("line-1".to_string()),
                    order_id: OrderId("ord-1".to_string()),
                    line_number: 1,
                    item_id: Some(ItemId("item-cilantro".to_string())),
                    variant_id: Some(VariantId("var-cil-l".to_string())),
                    product_name: "Cilantro".to_string(),
                    quantity: 1,
                    status: OrderLineStatus::Active,
                },
                OrderLine {
                    id: OrderLineId("line-2".to_string()),
                    order_id: OrderId("ord-1".to_string()),
                    line_number: 2,
                    item_id: Some(ItemId("item-sunflower".to_string())),
                    variant_id: None,
                    product_name: "Sunflower".to_string(),
                    quantity: 2,
                    status: OrderLineStatus::Deleted,
                },
            ],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn active_lines_exclude_deleted_lines() {
        let order = order(OrderStatus::Ready);
        let active = order.active_lines();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id.0, "line-1");
    }

    #[test]
    fn next_line_number_counts_deleted_lines() {
        let order = order(OrderStatus::Ready);
        assert_eq!(order.next_line_number(), 3);
    }

    #[test]
    fn allows_review_soft_lock_and_release() {
        let mut order = order(OrderStatus::Ready);
        order.transition_to(OrderStatus::PendingReview).expect("ready -> pending_review");
        order.transition_to(OrderStatus::Ready).expect("pending_review -> ready");
        assert_eq!(order.status, OrderStatus::Ready);
    }

    #[test]
    fn blocks_reviving_a_cancelled_order() {
        let mut order = order(OrderStatus::Cancelled);
        let error = order
            .transition_to(OrderStatus::Ready)
            .expect_err("cancelled orders must stay cancelled");
        assert!(matches!(error, DomainError::InvalidOrderTransition { .. }));
    }

    #[test]
    fn cancelling_twice_is_rejected() {
        let mut order = order(OrderStatus::Cancelled);
        assert!(order.transition_to(OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn status_round_trips_from_storage_encoding() {
        for status in [
            OrderStatus::Draft,
            OrderStatus::Ready,
            OrderStatus::PendingReview,
            OrderStatus::Cancelled,
            OrderStatus::PushedToErp,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
    }
}
