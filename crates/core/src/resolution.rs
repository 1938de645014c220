use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::customer::CustomerId;
use crate::domain::events::{OrderEvent, OrderEventKind};
use crate::domain::item::{ItemId, VariantId};
use crate::domain::order::{
    Order, OrderId, OrderLine, OrderLineId, OrderLineStatus, OrderStatus,
};
use crate::domain::proposal::{
    LineChangeType, Proposal, ProposalId, ProposalKind, ProposalLine, ResolutionAudit,
};
use crate::domain::OrganizationId;
use crate::errors::ResolutionError;
use crate::ports::{OrderStore, ProposalStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Accept,
    Reject,
}

/// One line as submitted by the human reviewer. May differ from the
/// original proposal lines; the audit step measures exactly that.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedLine {
    pub change_type: LineChangeType,
    pub item_id: Option<ItemId>,
    pub variant_id: Option<VariantId>,
    pub item_name: String,
    pub order_line_id: Option<OrderLineId>,
    pub quantity: u32,
    pub variant_code: Option<String>,
}

impl SubmittedLine {
    pub fn from_proposal_line(line: &ProposalLine) -> Self {
        Self {
            change_type: line.change_type,
            item_id: line.item_id.clone(),
            variant_id: line.variant_id.clone(),
            item_name: line.item_name.clone(),
            order_line_id: line.order_line_id.clone(),
            quantity: line.quantity,
            variant_code: line.variant_code.clone(),
        }
    }
}

/// Input from the review surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub proposal_id: ProposalId,
    pub action: ReviewAction,
    /// Reviewer-edited lines; `None` accepts the proposal as proposed.
    pub submitted_lines: Option<Vec<SubmittedLine>>,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub reviewed_by: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub proposal: Proposal,
    pub order: Option<Order>,
    pub audit: Option<ResolutionAudit>,
}

/// Request shape for creating a ledger order outside the proposal flow
/// (the tool-calling runtime uses this directly).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub organization_id: OrganizationId,
    pub customer_id: Option<CustomerId>,
    pub customer_name: String,
    pub delivery_date: NaiveDate,
    pub lines: Vec<SubmittedLine>,
    pub proposal_id: Option<ProposalId>,
}

/// The only surface through which the order ledger is mutated. The direct
/// pipeline's resolution engine implements it, and the autonomous
/// tool-calling runtime drives the very same primitives.
#[async_trait]
pub trait OrderMutationPort: Send + Sync {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ResolutionError>;

    async fn apply_change(
        &self,
        order_id: &OrderId,
        changes: &[SubmittedLine],
    ) -> Result<Order, ResolutionError>;

    async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, ResolutionError>;
}

/// Owns proposal status transitions and every order-ledger mutation.
/// Exactly one resolution attempt per proposal may be in flight; callers
/// serialize concurrent decisions.
pub struct ResolutionEngine {
    orders: Arc<dyn OrderStore>,
    proposals: Arc<dyn ProposalStore>,
}

impl ResolutionEngine {
    pub fn new(orders: Arc<dyn OrderStore>, proposals: Arc<dyn ProposalStore>) -> Self {
        Self { orders, proposals }
    }

    pub async fn resolve(
        &self,
        decision: ReviewDecision,
    ) -> Result<ResolutionOutcome, ResolutionError> {
        let proposal = self
            .proposals
            .find_by_id(&decision.proposal_id)
            .await?
            .ok_or_else(|| ResolutionError::ProposalNotFound(decision.proposal_id.clone()))?;

        match decision.action {
            ReviewAction::Accept => self.accept(proposal, decision).await,
            ReviewAction::Reject => self.reject(proposal, decision).await,
        }
    }

    async fn accept(
        &self,
        mut proposal: Proposal,
        decision: ReviewDecision,
    ) -> Result<ResolutionOutcome, ResolutionError> {
        // Fails here, before any store write, if the proposal is terminal.
        proposal.accept(&decision.reviewed_by, Utc::now())?;

        let original = self.proposals.lines_for_proposal(&proposal.id).await?;
        let submitted = decision
            .submitted_lines
            .clone()
            .unwrap_or_else(|| original.iter().map(SubmittedLine::from_proposal_line).collect());

        let audit = build_audit(&submitted, &original);
        proposal.audit = Some(audit.clone());
        if decision.notes.is_some() {
            proposal.reviewer_notes = decision.notes.clone();
        }

        let order = match proposal.kind {
            ProposalKind::NewOrder => {
                let delivery_date =
                    decision.delivery_date.or(proposal.delivery_date).ok_or_else(|| {
                        ResolutionError::InvalidSubmission(
                            "a new order needs a delivery date".to_string(),
                        )
                    })?;
                let request = CreateOrderRequest {
                    organization_id: proposal.organization_id.clone(),
                    customer_id: decision.customer_id.clone().or_else(|| proposal.customer_id.clone()),
                    customer_name: decision
                        .customer_name
                        .clone()
                        .or_else(|| proposal.customer_name.clone())
                        .unwrap_or_else(|| "unassigned".to_string()),
                    delivery_date,
                    lines: submitted,
                    proposal_id: Some(proposal.id.clone()),
                };
                Some(self.create_order_inner(request).await?)
            }
            ProposalKind::ChangeOrder => {
                let order_id = proposal
                    .order_id
                    .clone()
                    .ok_or_else(|| ResolutionError::MissingBoundOrder(proposal.id.clone()))?;
                Some(
                    self.apply_change_inner(&order_id, &submitted, Some(&proposal.id), Some(&audit))
                        .await?,
                )
            }
            ProposalKind::CancelOrder => match proposal.order_id.clone() {
                Some(order_id) => {
                    Some(self.cancel_order_inner(&order_id, Some(&proposal.id)).await?)
                }
                // Unbound cancel: nothing in the ledger to touch; accepting
                // just closes the review item.
                None => None,
            },
        };

        self.proposals.save(&proposal).await?;
        info!(
            event_name = "resolution.accepted",
            proposal_id = %proposal.id.0,
            kind = proposal.kind.as_str(),
            was_edited = audit.was_edited,
            "proposal accepted"
        );

        Ok(ResolutionOutcome { proposal, order, audit: Some(audit) })
    }

    async fn reject(
        &self,
        mut proposal: Proposal,
        decision: ReviewDecision,
    ) -> Result<ResolutionOutcome, ResolutionError> {
        proposal.reject(&decision.reviewed_by, decision.notes.clone(), Utc::now())?;

        let mut order = None;
        if let Some(order_id) = proposal.order_id.clone() {
            match self.orders.find_by_id(&order_id).await? {
                Some(mut bound) => {
                    if bound.status == OrderStatus::PendingReview {
                        bound.transition_to(OrderStatus::Ready)?;
                        bound.updated_at = Utc::now();
                        self.orders.save(&bound).await?;
                    }
                    self.orders
                        .append_event(&OrderEvent::new(
                            bound.id.clone(),
                            Some(proposal.id.clone()),
                            OrderEventKind::ChangeRejected,
                            "proposed change rejected",
                            json!({ "notes": proposal.reviewer_notes }),
                        ))
                        .await?;
                    order = Some(bound);
                }
                None => {
                    warn!(
                        event_name = "resolution.reject_missing_order",
                        proposal_id = %proposal.id.0,
                        order_id = %order_id.0,
                        "bound order vanished; rejecting the proposal anyway"
                    );
                }
            }
        }

        self.proposals.save(&proposal).await?;
        info!(
            event_name = "resolution.rejected",
            proposal_id = %proposal.id.0,
            kind = proposal.kind.as_str(),
            "proposal rejected"
        );

        Ok(ResolutionOutcome { proposal, order, audit: None })
    }

    async fn create_order_inner(
        &self,
        request: CreateOrderRequest,
    ) -> Result<Order, ResolutionError> {
        let now = Utc::now();
        let order_id = OrderId(Uuid::new_v4().to_string());

        let lines: Vec<OrderLine> = request
            .lines
            .iter()
            // A removal on a brand-new order has nothing to remove.
            .filter(|line| line.change_type != LineChangeType::Remove)
            .enumerate()
            .map(|(index, line)| OrderLine {
                id: OrderLineId(Uuid::new_v4().to_string()),
                order_id: order_id.clone(),
                line_number: index as u32 + 1,
                item_id: line.item_id.clone(),
                variant_id: line.variant_id.clone(),
                product_name: line.item_name.clone(),
                quantity: line.quantity,
                status: OrderLineStatus::Active,
            })
            .collect();

        let order = Order {
            id: order_id,
            organization_id: request.organization_id,
            customer_id: request.customer_id,
            customer_name: request.customer_name,
            delivery_date: request.delivery_date,
            // "Accepted and forwarded": the order goes straight out.
            status: OrderStatus::PushedToErp,
            lines,
            created_at: now,
            updated_at: now,
        };

        self.orders.save(&order).await?;
        self.orders
            .append_event(&OrderEvent::new(
                order.id.clone(),
                request.proposal_id.clone(),
                OrderEventKind::Created,
                format!("order created with {} line(s)", order.lines.len()),
                json!({ "line_count": order.lines.len() }),
            ))
            .await?;
        self.orders
            .append_event(&OrderEvent::new(
                order.id.clone(),
                request.proposal_id,
                OrderEventKind::Exported,
                "order forwarded for fulfillment",
                json!({}),
            ))
            .await?;

        Ok(order)
    }

    async fn apply_change_inner(
        &self,
        order_id: &OrderId,
        changes: &[SubmittedLine],
        proposal_id: Option<&ProposalId>,
        audit: Option<&ResolutionAudit>,
    ) -> Result<Order, ResolutionError> {
        let mut order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ResolutionError::OrderNotFound(order_id.clone()))?;

        let mut adds = 0u32;
        let mut modifies = 0u32;
        let mut removes = 0u32;

        for change in changes {
            match change.change_type {
                LineChangeType::Add => {
                    let line = OrderLine {
                        id: OrderLineId(Uuid::new_v4().to_string()),
                        order_id: order.id.clone(),
                        line_number: order.next_line_number(),
                        item_id: change.item_id.clone(),
                        variant_id: change.variant_id.clone(),
                        product_name: change.item_name.clone(),
                        quantity: change.quantity,
                        status: OrderLineStatus::Active,
                    };
                    order.lines.push(line);
                    adds += 1;
                }
                LineChangeType::Modify => {
                    let target = target_line(&mut order, change)?;
                    target.quantity = change.quantity;
                    if change.variant_id.is_some() {
                        target.variant_id = change.variant_id.clone();
                    }
                    modifies += 1;
                }
                LineChangeType::Remove => {
                    // Deleted, never physically removed; the line keeps its
                    // number for audit.
                    let target = target_line(&mut order, change)?;
                    target.status = OrderLineStatus::Deleted;
                    removes += 1;
                }
            }
        }

        if order.status == OrderStatus::PendingReview {
            order.transition_to(OrderStatus::Ready)?;
        }
        order.updated_at = Utc::now();
        self.orders.save(&order).await?;

        let payload = match audit {
            Some(audit) => json!({
                "adds": adds,
                "modifies": modifies,
                "removes": removes,
                "was_edited": audit.was_edited,
                "submitted_line_count": audit.submitted_line_count,
                "proposed_line_count": audit.proposed_line_count,
            }),
            None => json!({ "adds": adds, "modifies": modifies, "removes": removes }),
        };
        self.orders
            .append_event(&OrderEvent::new(
                order.id.clone(),
                proposal_id.cloned(),
                OrderEventKind::ChangeAccepted,
                format!("{adds} add(s), {modifies} modification(s), {removes} removal(s) applied"),
                payload,
            ))
            .await?;

        Ok(order)
    }

    async fn cancel_order_inner(
        &self,
        order_id: &OrderId,
        proposal_id: Option<&ProposalId>,
    ) -> Result<Order, ResolutionError> {
        let mut order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ResolutionError::OrderNotFound(order_id.clone()))?;

        order.transition_to(OrderStatus::Cancelled)?;
        order.updated_at = Utc::now();
        self.orders.save(&order).await?;
        self.orders
            .append_event(&OrderEvent::new(
                order.id.clone(),
                proposal_id.cloned(),
                OrderEventKind::Cancelled,
                "order cancelled",
                json!({}),
            ))
            .await?;

        Ok(order)
    }
}

fn target_line<'a>(
    order: &'a mut Order,
    change: &SubmittedLine,
) -> Result<&'a mut OrderLine, ResolutionError> {
    let line_id = change.order_line_id.as_ref().ok_or_else(|| {
        ResolutionError::InvalidSubmission(format!(
            "{} line for {} is missing its order_line_id",
            change.change_type.as_str(),
            change.item_name
        ))
    })?;
    let line_id = line_id.clone();
    order.line_by_id_mut(&line_id).ok_or_else(|| {
        ResolutionError::InvalidSubmission(format!(
            "order line {} does not exist on the bound order",
            line_id.0
        ))
    })
}

#[async_trait]
impl OrderMutationPort for ResolutionEngine {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ResolutionError> {
        self.create_order_inner(request).await
    }

    async fn apply_change(
        &self,
        order_id: &OrderId,
        changes: &[SubmittedLine],
    ) -> Result<Order, ResolutionError> {
        self.apply_change_inner(order_id, changes, None, None).await
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, ResolutionError> {
        self.cancel_order_inner(order_id, None).await
    }
}

/// Compare what the reviewer submitted against what the pipeline proposed.
/// Edited means the counts differ or some submitted line has no original
/// counterpart with the same item, change type, and quantity.
pub fn build_audit(submitted: &[SubmittedLine], original: &[ProposalLine]) -> ResolutionAudit {
    let mut unmatched_originals: Vec<&ProposalLine> = original.iter().collect();

    let mut edited = submitted.len() != original.len();
    for line in submitted {
        let position = unmatched_originals.iter().position(|candidate| {
            candidate.item_id == line.item_id
                && candidate.change_type == line.change_type
                && candidate.quantity == line.quantity
        });
        match position {
            Some(index) => {
                unmatched_originals.swap_remove(index);
            }
            None => edited = true,
        }
    }

    ResolutionAudit {
        was_edited: edited,
        submitted_line_count: submitted.len(),
        proposed_line_count: original.len(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, Utc};

    use crate::domain::events::OrderEventKind;
    use crate::domain::intake::IntakeEventId;
    use crate::domain::item::{ItemId, VariantId};
    use crate::domain::order::{
        Order, OrderId, OrderLine, OrderLineId, OrderLineStatus, OrderStatus,
    };
    use crate::domain::proposal::{
        LineChangeType, OrderFrequency, Proposal, ProposalId, ProposalKind, ProposalLine,
        ProposalLineId, ProposalStatus,
    };
    use crate::domain::OrganizationId;
    use crate::errors::ResolutionError;
    use crate::ports::{InMemoryOrderStore, InMemoryProposalStore, OrderStore, ProposalStore};

    use super::{
        build_audit, ResolutionEngine, ReviewAction, ReviewDecision, SubmittedLine,
    };

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date")
    }

    fn order_with_lines(id: &str, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId(id.to_string()),
            organization_id: OrganizationId("org-1".to_string()),
            customer_id: None,
            customer_name: "Blue Door Bistro".to_string(),
            delivery_date: date(6),
            status,
            lines: vec![OrderLine {
                id: OrderLineId("line-1".to_string()),
                order_id: OrderId(id.to_string()),
                line_number: 1,
                item_id: Some(ItemId("item-cilantro".to_string())),
                variant_id: Some(VariantId("var-cil-l".to_string())),
                product_name: "Cilantro".to_string(),
                quantity: 1,
                status: OrderLineStatus::Active,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    fn proposal(id: &str, kind: ProposalKind, order_id: Option<&str>) -> Proposal {
        Proposal {
            id: ProposalId(id.to_string()),
            organization_id: OrganizationId("org-1".to_string()),
            order_id: order_id.map(|o| OrderId(o.to_string())),
            intake_event_id: IntakeEventId("intake-1".to_string()),
            kind,
            status: ProposalStatus::Pending,
            order_frequency: OrderFrequency::OneTime,
            customer_id: None,
            customer_name: Some("Blue Door Bistro".to_string()),
            delivery_date: Some(date(6)),
            audit: None,
            reviewer_notes: None,
            reviewed_at: None,
            reviewed_by: None,
            created_at: Utc::now(),
        }
    }

    fn proposal_line(
        proposal_id: &str,
        number: u32,
        change_type: LineChangeType,
        item: &str,
        name: &str,
        order_line_id: Option<&str>,
        quantity: u32,
    ) -> ProposalLine {
        ProposalLine {
            id: ProposalLineId(format!("{proposal_id}-l{number}")),
            proposal_id: ProposalId(proposal_id.to_string()),
            line_number: number,
            change_type,
            item_id: Some(ItemId(item.to_string())),
            variant_id: None,
            item_name: name.to_string(),
            order_line_id: order_line_id.map(|id| OrderLineId(id.to_string())),
            quantity,
            variant_code: None,
            previous_quantity: None,
            previous_variant_code: None,
            unmatched: false,
        }
    }

    fn decision(proposal_id: &str, action: ReviewAction) -> ReviewDecision {
        ReviewDecision {
            proposal_id: ProposalId(proposal_id.to_string()),
            action,
            submitted_lines: None,
            customer_id: None,
            customer_name: None,
            delivery_date: None,
            notes: None,
            reviewed_by: "reviewer@desk".to_string(),
        }
    }

    async fn engine_with(
        orders: Vec<Order>,
        proposals: Vec<(Proposal, Vec<ProposalLine>)>,
    ) -> (ResolutionEngine, Arc<InMemoryOrderStore>, Arc<InMemoryProposalStore>) {
        let order_store = Arc::new(InMemoryOrderStore::default());
        for order in orders {
            order_store.insert(order).await;
        }
        let proposal_store = Arc::new(InMemoryProposalStore::default());
        for (proposal, lines) in proposals {
            proposal_store.create(&proposal, &lines).await.expect("seed proposal");
        }
        let engine = ResolutionEngine::new(order_store.clone(), proposal_store.clone());
        (engine, order_store, proposal_store)
    }

    #[tokio::test]
    async fn accepting_a_new_order_proposal_creates_and_exports_the_order() {
        let lines = vec![
            proposal_line("prop-1", 1, LineChangeType::Add, "item-shiso", "Shiso Green", None, 2),
            proposal_line("prop-1", 2, LineChangeType::Add, "item-cilantro", "Cilantro", None, 1),
        ];
        let (engine, orders, _) =
            engine_with(vec![], vec![(proposal("prop-1", ProposalKind::NewOrder, None), lines)])
                .await;

        let outcome =
            engine.resolve(decision("prop-1", ReviewAction::Accept)).await.expect("accept");

        let order = outcome.order.expect("order created");
        assert_eq!(order.status, OrderStatus::PushedToErp);
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[0].line_number, 1);
        assert_eq!(order.lines[1].line_number, 2);
        assert_eq!(outcome.proposal.status, ProposalStatus::Accepted);
        assert_eq!(outcome.audit.as_ref().map(|a| a.was_edited), Some(false));

        let events = orders.events_for_order(&order.id).await.expect("events");
        let kinds: Vec<OrderEventKind> = events.iter().map(|event| event.kind).collect();
        assert_eq!(kinds, vec![OrderEventKind::Created, OrderEventKind::Exported]);
    }

    #[tokio::test]
    async fn accepting_a_change_applies_adds_modifies_and_soft_removes() {
        let lines = vec![
            proposal_line(
                "prop-1",
                1,
                LineChangeType::Modify,
                "item-cilantro",
                "Cilantro",
                Some("line-1"),
                3,
            ),
            proposal_line("prop-1", 2, LineChangeType::Add, "item-shiso", "Shiso Green", None, 2),
        ];
        let (engine, orders, _) = engine_with(
            vec![order_with_lines("ord-1", OrderStatus::PendingReview)],
            vec![(proposal("prop-1", ProposalKind::ChangeOrder, Some("ord-1")), lines)],
        )
        .await;

        let outcome =
            engine.resolve(decision("prop-1", ReviewAction::Accept)).await.expect("accept");

        let order = outcome.order.expect("order updated");
        assert_eq!(order.status, OrderStatus::Ready, "soft lock released");
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[0].quantity, 3);
        assert_eq!(order.lines[1].line_number, 2);
        assert_eq!(order.lines[1].product_name, "Shiso Green");

        let events = orders.events_for_order(&order.id).await.expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, OrderEventKind::ChangeAccepted);
        assert_eq!(events[0].payload["was_edited"], false);
    }

    #[tokio::test]
    async fn removes_soft_delete_and_preserve_line_numbers() {
        let lines = vec![proposal_line(
            "prop-1",
            1,
            LineChangeType::Remove,
            "item-cilantro",
            "Cilantro",
            Some("line-1"),
            1,
        )];
        let (engine, _, _) = engine_with(
            vec![order_with_lines("ord-1", OrderStatus::PendingReview)],
            vec![(proposal("prop-1", ProposalKind::ChangeOrder, Some("ord-1")), lines)],
        )
        .await;

        let outcome =
            engine.resolve(decision("prop-1", ReviewAction::Accept)).await.expect("accept");

        let order = outcome.order.expect("order updated");
        assert_eq!(order.lines.len(), 1, "deleted lines are retained");
        assert_eq!(order.lines[0].status, OrderLineStatus::Deleted);
        assert_eq!(order.lines[0].line_number, 1);
        assert_eq!(order.next_line_number(), 2);
    }

    #[tokio::test]
    async fn accepting_a_cancel_proposal_cancels_the_order() {
        let (engine, orders, _) = engine_with(
            vec![order_with_lines("ord-1", OrderStatus::PendingReview)],
            vec![(proposal("prop-1", ProposalKind::CancelOrder, Some("ord-1")), vec![])],
        )
        .await;

        let outcome =
            engine.resolve(decision("prop-1", ReviewAction::Accept)).await.expect("accept");

        assert_eq!(outcome.order.expect("order").status, OrderStatus::Cancelled);
        let events =
            orders.events_for_order(&OrderId("ord-1".to_string())).await.expect("events");
        assert_eq!(events[0].kind, OrderEventKind::Cancelled);
    }

    #[tokio::test]
    async fn accepting_an_unbound_cancel_touches_no_order() {
        let (engine, _, _) = engine_with(
            vec![],
            vec![(proposal("prop-1", ProposalKind::CancelOrder, None), vec![])],
        )
        .await;

        let outcome =
            engine.resolve(decision("prop-1", ReviewAction::Accept)).await.expect("accept");

        assert!(outcome.order.is_none());
        assert_eq!(outcome.proposal.status, ProposalStatus::Accepted);
    }

    #[tokio::test]
    async fn rejecting_releases_the_soft_lock_without_ledger_changes() {
        let (engine, orders, _) = engine_with(
            vec![order_with_lines("ord-1", OrderStatus::PendingReview)],
            vec![(
                proposal("prop-1", ProposalKind::ChangeOrder, Some("ord-1")),
                vec![proposal_line(
                    "prop-1",
                    1,
                    LineChangeType::Modify,
                    "item-cilantro",
                    "Cilantro",
                    Some("line-1"),
                    5,
                )],
            )],
        )
        .await;

        let mut reject = decision("prop-1", ReviewAction::Reject);
        reject.notes = Some("customer called it off".to_string());
        let outcome = engine.resolve(reject).await.expect("reject");

        assert_eq!(outcome.proposal.status, ProposalStatus::Rejected);
        assert_eq!(outcome.proposal.reviewer_notes.as_deref(), Some("customer called it off"));

        let order = outcome.order.expect("order");
        assert_eq!(order.status, OrderStatus::Ready);
        assert_eq!(order.lines[0].quantity, 1, "no ledger mutation on reject");

        let events = orders.events_for_order(&order.id).await.expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, OrderEventKind::ChangeRejected);
    }

    #[tokio::test]
    async fn second_resolution_attempt_fails_without_mutation() {
        let (engine, orders, _) = engine_with(
            vec![order_with_lines("ord-1", OrderStatus::PendingReview)],
            vec![(proposal("prop-1", ProposalKind::CancelOrder, Some("ord-1")), vec![])],
        )
        .await;

        engine.resolve(decision("prop-1", ReviewAction::Accept)).await.expect("first accept");
        let error = engine
            .resolve(decision("prop-1", ReviewAction::Reject))
            .await
            .expect_err("second resolution must fail");

        assert!(matches!(
            error,
            ResolutionError::Domain(crate::errors::DomainError::ProposalAlreadyResolved { .. })
        ));

        let order = orders
            .find_by_id(&OrderId("ord-1".to_string()))
            .await
            .expect("find")
            .expect("order");
        assert_eq!(order.status, OrderStatus::Cancelled, "first resolution stands");
    }

    #[tokio::test]
    async fn reviewer_edits_are_applied_and_flagged_in_the_audit() {
        let lines = vec![proposal_line(
            "prop-1",
            1,
            LineChangeType::Add,
            "item-shiso",
            "Shiso Green",
            None,
            2,
        )];
        let (engine, _, proposals) =
            engine_with(vec![], vec![(proposal("prop-1", ProposalKind::NewOrder, None), lines)])
                .await;

        let mut accept = decision("prop-1", ReviewAction::Accept);
        accept.submitted_lines = Some(vec![SubmittedLine {
            change_type: LineChangeType::Add,
            item_id: Some(ItemId("item-shiso".to_string())),
            variant_id: None,
            item_name: "Shiso Green".to_string(),
            order_line_id: None,
            quantity: 5,
            variant_code: None,
        }]);

        let outcome = engine.resolve(accept).await.expect("accept");

        assert_eq!(outcome.order.expect("order").lines[0].quantity, 5);
        assert_eq!(outcome.audit.map(|a| a.was_edited), Some(true));

        let stored = proposals
            .find_by_id(&ProposalId("prop-1".to_string()))
            .await
            .expect("find")
            .expect("proposal");
        assert_eq!(stored.audit.map(|a| a.was_edited), Some(true));
    }

    #[test]
    fn audit_counts_and_matching_detect_edits() {
        let original = vec![
            proposal_line("prop-1", 1, LineChangeType::Add, "item-a", "A", None, 2),
            proposal_line("prop-1", 2, LineChangeType::Add, "item-b", "B", None, 1),
        ];
        let untouched: Vec<SubmittedLine> =
            original.iter().map(SubmittedLine::from_proposal_line).collect();

        assert!(!build_audit(&untouched, &original).was_edited);

        let mut changed_quantity = untouched.clone();
        changed_quantity[1].quantity = 9;
        assert!(build_audit(&changed_quantity, &original).was_edited);

        let fewer = vec![untouched[0].clone()];
        let audit = build_audit(&fewer, &original);
        assert!(audit.was_edited);
        assert_eq!(audit.submitted_line_count, 1);
        assert_eq!(audit.proposed_line_count, 2);
    }
}
