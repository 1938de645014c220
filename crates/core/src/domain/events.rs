use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::OrderId;
use crate::domain::proposal::ProposalId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderEventId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Created,
    Exported,
    ProposalCreated,
    ChangeAccepted,
    ChangeRejected,
    Cancelled,
}

impl OrderEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Exported => "exported",
            Self::ProposalCreated => "proposal_created",
            Self::ChangeAccepted => "change_accepted",
            Self::ChangeRejected => "change_rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "created" => Some(Self::Created),
            "exported" => Some(Self::Exported),
            "proposal_created" => Some(Self::ProposalCreated),
            "change_accepted" => Some(Self::ChangeAccepted),
            "change_rejected" => Some(Self::ChangeRejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Append-only audit row keyed to an order. Never mutated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: OrderEventId,
    pub order_id: OrderId,
    pub proposal_id: Option<ProposalId>,
    pub kind: OrderEventKind,
    pub summary: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn new(
        order_id: OrderId,
        proposal_id: Option<ProposalId>,
        kind: OrderEventKind,
        summary: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: OrderEventId(Uuid::new_v4().to_string()),
            order_id,
            proposal_id,
            kind,
            summary: summary.into(),
            payload,
            occurred_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::domain::order::OrderId;
    use crate::domain::proposal::ProposalId;

    use super::{OrderEvent, OrderEventKind};

    #[test]
    fn event_kind_round_trips_from_storage_encoding() {
        for kind in [
            OrderEventKind::Created,
            OrderEventKind::Exported,
            OrderEventKind::ProposalCreated,
            OrderEventKind::ChangeAccepted,
            OrderEventKind::ChangeRejected,
            OrderEventKind::Cancelled,
        ] {
            assert_eq!(OrderEventKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn new_event_carries_proposal_linkage_and_payload() {
        let event = OrderEvent::new(
            OrderId("ord-1".to_string()),
            Some(ProposalId("prop-1".to_string())),
            OrderEventKind::ProposalCreated,
            "2 changes proposed",
            json!({ "adds": 1, "modifies": 1, "removes": 0 }),
        );

        assert_eq!(event.order_id.0, "ord-1");
        assert_eq!(event.proposal_id.as_ref().map(|id| id.0.as_str()), Some("prop-1"));
        assert_eq!(event.payload["adds"], 1);
        assert!(!event.id.0.is_empty());
    }
}
