use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::intake::IntakeEventId;
use crate::domain::item::{ItemId, VariantId};
use crate::domain::order::{OrderId, OrderLineId};
use crate::domain::OrganizationId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalLineId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    NewOrder,
    ChangeOrder,
    CancelOrder,
}

impl ProposalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewOrder => "new_order",
            Self::ChangeOrder => "change_order",
            Self::CancelOrder => "cancel_order",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new_order" => Some(Self::NewOrder),
            "change_order" => Some(Self::ChangeOrder),
            "cancel_order" => Some(Self::CancelOrder),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderFrequency {
    #[default]
    OneTime,
    Recurring,
}

impl OrderFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one_time",
            Self::Recurring => "recurring",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "one_time" => Some(Self::OneTime),
            "recurring" => Some(Self::Recurring),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineChangeType {
    Add,
    Modify,
    Remove,
}

impl LineChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Modify => "modify",
            Self::Remove => "remove",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "add" => Some(Self::Add),
            "modify" => Some(Self::Modify),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// Comparison of what the reviewer submitted against what the pipeline
/// proposed, captured at resolution time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionAudit {
    pub was_edited: bool,
    pub submitted_line_count: usize,
    pub proposed_line_count: usize,
}

/// A reviewable, not-yet-applied description of a new order or a
/// change/cancellation to an existing one. `order_id = None` proposes a
/// brand-new order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub organization_id: OrganizationId,
    pub order_id: Option<OrderId>,
    pub intake_event_id: IntakeEventId,
    pub kind: ProposalKind,
    pub status: ProposalStatus,
    pub order_frequency: OrderFrequency,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub audit: Option<ResolutionAudit>,
    pub reviewer_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    fn ensure_pending(&self) -> Result<(), DomainError> {
        if self.status == ProposalStatus::Pending {
            return Ok(());
        }

        Err(DomainError::ProposalAlreadyResolved { proposal_id: self.id.clone(), status: self.status })
    }

    /// pending -> accepted. Terminal; a second resolution attempt fails
    /// with `ProposalAlreadyResolved`.
    pub fn accept(
        &mut self,
        reviewed_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = ProposalStatus::Accepted;
        self.reviewed_by = Some(reviewed_by.into());
        self.reviewed_at = Some(now);
        Ok(())
    }

    /// pending -> rejected. Terminal.
    pub fn reject(
        &mut self,
        reviewed_by: impl Into<String>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = ProposalStatus::Rejected;
        self.reviewed_by = Some(reviewed_by.into());
        self.reviewed_at = Some(now);
        self.reviewer_notes = notes;
        Ok(())
    }
}

/// One proposed line change. Created atomically with its proposal and
/// immutable thereafter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalLine {
    pub id: ProposalLineId,
    pub proposal_id: ProposalId,
    pub line_number: u32,
    pub change_type: LineChangeType,
    pub item_id: Option<ItemId>,
    pub variant_id: Option<VariantId>,
    pub item_name: String,
    /// Null for `add`; required for `modify`/`remove`.
    pub order_line_id: Option<OrderLineId>,
    pub quantity: u32,
    pub variant_code: Option<String>,
    pub previous_quantity: Option<u32>,
    pub previous_variant_code: Option<String>,
    /// The extracted reference had no catalog match; a reviewer must fix
    /// the line before it can be applied.
    pub unmatched: bool,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::intake::IntakeEventId;
    use crate::domain::OrganizationId;
    use crate::errors::DomainError;

    use super::{OrderFrequency, Proposal, ProposalId, ProposalKind, ProposalStatus};

    fn proposal(status: ProposalStatus) -> Proposal {
        Proposal {
            id: ProposalId("prop-1".to_string()),
            organization_id: OrganizationId("org-1".to_string()),
            order_id: None,
            intake_event_id: IntakeEventId("intake-1".to_string()),
            kind: ProposalKind::NewOrder,
            status,
            order_frequency: OrderFrequency::OneTime,
            customer_id: None,
            customer_name: None,
            delivery_date: None,
            audit: None,
            reviewer_notes: None,
            reviewed_at: None,
            reviewed_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pending_proposal_can_be_accepted_once() {
        let mut proposal = proposal(ProposalStatus::Pending);
        proposal.accept("reviewer@desk", Utc::now()).expect("pending -> accepted");
        assert_eq!(proposal.status, ProposalStatus::Accepted);
        assert_eq!(proposal.reviewed_by.as_deref(), Some("reviewer@desk"));
        assert!(proposal.reviewed_at.is_some());
    }

    #[test]
    fn resolving_an_accepted_proposal_fails() {
        let mut proposal = proposal(ProposalStatus::Accepted);
        let error = proposal.reject("reviewer@desk", None, Utc::now()).expect_err("terminal");
        assert!(matches!(error, DomainError::ProposalAlreadyResolved { .. }));
    }

    #[test]
    fn resolving_a_rejected_proposal_fails() {
        let mut proposal = proposal(ProposalStatus::Rejected);
        let error = proposal.accept("reviewer@desk", Utc::now()).expect_err("terminal");
        assert!(matches!(error, DomainError::ProposalAlreadyResolved { .. }));
    }

    #[test]
    fn reject_records_reviewer_notes() {
        let mut proposal = proposal(ProposalStatus::Pending);
        proposal
            .reject("reviewer@desk", Some("duplicate request".to_string()), Utc::now())
            .expect("pending -> rejected");
        assert_eq!(proposal.status, ProposalStatus::Rejected);
        assert_eq!(proposal.reviewer_notes.as_deref(), Some("duplicate request"));
    }

    #[test]
    fn kind_and_status_round_trip_from_storage_encoding() {
        for kind in [ProposalKind::NewOrder, ProposalKind::ChangeOrder, ProposalKind::CancelOrder] {
            assert_eq!(ProposalKind::parse(kind.as_str()), Some(kind));
        }
        for status in
            [ProposalStatus::Pending, ProposalStatus::Accepted, ProposalStatus::Rejected]
        {
            assert_eq!(ProposalStatus::parse(status.as_str()), Some(status));
        }
        for frequency in [OrderFrequency::OneTime, OrderFrequency::Recurring] {
            assert_eq!(OrderFrequency::parse(frequency.as_str()), Some(frequency));
        }
    }
}
