use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::diff::{diff_order_lines, LineChange};
use crate::domain::customer::CustomerId;
use crate::domain::events::{OrderEvent, OrderEventKind};
use crate::domain::intake::{IntakeEvent, IntakeEventId};
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::proposal::{
    LineChangeType, OrderFrequency, Proposal, ProposalId, ProposalKind, ProposalLine,
    ProposalLineId, ProposalStatus,
};
use crate::errors::PipelineError;
use crate::extraction::ExtractionOutcome;
use crate::grouping::{group_by_delivery_date, DateGroup};
use crate::intent::{IntentResolver, OrderIntent};
use crate::matching::{MatchLimits, OrderMatcher};
use crate::oracle::{ExtractionOracle, ExtractionRequest};
use crate::ports::{CatalogStore, OrderStore, ProposalStore};
use crate::snapshot::{CatalogSnapshot, ResolvedLine};

/// Result of processing one delivery-date group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GroupOutcome {
    ProposalCreated {
        proposal_id: ProposalId,
        kind: ProposalKind,
        date: Option<NaiveDate>,
    },
    /// The request matched the ledger exactly; nothing to review.
    NoChanges { order_id: OrderId, date: Option<NaiveDate> },
    Failed { date: Option<NaiveDate>, error: String },
}

/// Result of processing one intake event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeOutcome {
    pub intake_event_id: IntakeEventId,
    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub groups: Vec<GroupOutcome>,
}

/// The order change proposal pipeline. One invocation handles one intake
/// event end to end; the unit of failure is the delivery-date group, so a
/// bad group never costs its siblings their proposals.
pub struct IntakePipeline {
    catalog: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
    proposals: Arc<dyn ProposalStore>,
    oracle: Arc<dyn ExtractionOracle>,
    limits: MatchLimits,
}

impl IntakePipeline {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        orders: Arc<dyn OrderStore>,
        proposals: Arc<dyn ProposalStore>,
        oracle: Arc<dyn ExtractionOracle>,
        limits: MatchLimits,
    ) -> Self {
        Self { catalog, orders, proposals, oracle, limits }
    }

    pub async fn process(
        &self,
        event: &IntakeEvent,
        today: NaiveDate,
    ) -> Result<IntakeOutcome, PipelineError> {
        // Advisory idempotency check; the proposal store's unique index is
        // the hard backstop under concurrent redelivery.
        if self.proposals.count_for_intake_event(&event.id).await? > 0 {
            info!(
                event_name = "pipeline.skipped",
                intake_event_id = %event.id.0,
                "intake event already has proposals; skipping"
            );
            return Ok(IntakeOutcome {
                intake_event_id: event.id.clone(),
                skipped: true,
                skip_reason: Some("already_processed".to_string()),
                groups: Vec::new(),
            });
        }

        let snapshot = self.catalog.load_snapshot(&event.organization_id).await?;
        let context_orders = self
            .orders
            .upcoming_for_organization(&event.organization_id, today, self.limits.organization_scan)
            .await?;

        let extraction = match self
            .oracle
            .extract(ExtractionRequest {
                event,
                snapshot: &snapshot,
                existing_orders: &context_orders,
            })
            .await
        {
            Ok(extraction) => extraction,
            Err(error) => {
                // Extraction failure still yields a reviewable (empty)
                // new-order proposal instead of dropping the message.
                warn!(
                    event_name = "pipeline.extraction_failed",
                    intake_event_id = %event.id.0,
                    error = %error,
                    "extraction failed; continuing with an empty outcome"
                );
                ExtractionOutcome::default()
            }
        };

        let customer_id = match extraction.customer_id.clone() {
            Some(id) if snapshot.customer(&id).is_some() => Some(id),
            Some(id) => {
                warn!(
                    event_name = "pipeline.unknown_customer",
                    intake_event_id = %event.id.0,
                    customer_id = %id.0,
                    "extracted customer not in catalog; falling back to organization scan"
                );
                None
            }
            None => None,
        };

        let groups = group_by_delivery_date(
            &extraction.line_items,
            extraction.requested_delivery_date,
            &extraction.cancel_dates,
        );

        let matcher = OrderMatcher::new(self.orders.clone(), self.limits);
        let resolver = IntentResolver::new(self.oracle.clone());

        let mut outcomes = Vec::with_capacity(groups.len());
        for group in &groups {
            let outcome = self
                .process_group(
                    event,
                    &snapshot,
                    customer_id.as_ref(),
                    &extraction,
                    group,
                    &matcher,
                    &resolver,
                    today,
                )
                .await;
            outcomes.push(match outcome {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(
                        event_name = "pipeline.group_failed",
                        intake_event_id = %event.id.0,
                        date = ?group.date,
                        error = %error,
                        "delivery-date group failed; siblings continue"
                    );
                    GroupOutcome::Failed { date: group.date, error: error.to_string() }
                }
            });
        }

        Ok(IntakeOutcome {
            intake_event_id: event.id.clone(),
            skipped: false,
            skip_reason: None,
            groups: outcomes,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_group(
        &self,
        event: &IntakeEvent,
        snapshot: &CatalogSnapshot,
        customer_id: Option<&CustomerId>,
        extraction: &ExtractionOutcome,
        group: &DateGroup,
        matcher: &OrderMatcher,
        resolver: &IntentResolver,
        today: NaiveDate,
    ) -> Result<GroupOutcome, PipelineError> {
        let candidates = matcher.candidates(&event.organization_id, customer_id, today).await?;
        let decision = resolver.resolve(&event.raw_content, group, &candidates).await;
        let resolved: Vec<ResolvedLine> =
            group.lines.iter().map(|line| snapshot.resolve_line(line)).collect();

        match decision.intent {
            OrderIntent::NewOrder | OrderIntent::Unknown => {
                self.create_new_order_proposal(event, snapshot, customer_id, extraction, group, &resolved)
                    .await
            }
            OrderIntent::ChangeOrder => {
                let Some(order_id) = decision.matched_order_id else {
                    warn!(
                        event_name = "pipeline.unbound_change",
                        intake_event_id = %event.id.0,
                        date = ?group.date,
                        "change intent without a bound order; proposing a new order instead"
                    );
                    return self
                        .create_new_order_proposal(
                            event, snapshot, customer_id, extraction, group, &resolved,
                        )
                        .await;
                };

                let order = self
                    .orders
                    .find_by_id(&order_id)
                    .await?
                    .ok_or(PipelineError::OrderNotFound { order_id })?;

                let changes = diff_order_lines(&order, &resolved, snapshot);
                if changes.is_empty() {
                    info!(
                        event_name = "pipeline.no_changes",
                        intake_event_id = %event.id.0,
                        order_id = %order.id.0,
                        "request matches the order as it stands"
                    );
                    return Ok(GroupOutcome::NoChanges { order_id: order.id, date: group.date });
                }

                let proposal = self.build_proposal(
                    event,
                    ProposalKind::ChangeOrder,
                    Some(order.id.clone()),
                    order.customer_id.clone(),
                    Some(order.customer_name.clone()),
                    group.date,
                    extraction.order_frequency,
                );
                let lines = proposal_lines_from_changes(&proposal.id, &changes);
                self.proposals.create(&proposal, &lines).await?;
                self.lock_for_review(order, &proposal, &changes).await?;

                Ok(GroupOutcome::ProposalCreated {
                    proposal_id: proposal.id,
                    kind: ProposalKind::ChangeOrder,
                    date: group.date,
                })
            }
            OrderIntent::CancelOrder => {
                let bound = match decision.matched_order_id {
                    Some(order_id) => Some(
                        self.orders
                            .find_by_id(&order_id)
                            .await?
                            .ok_or(PipelineError::OrderNotFound { order_id })?,
                    ),
                    None => None,
                };

                let proposal = self.build_proposal(
                    event,
                    ProposalKind::CancelOrder,
                    bound.as_ref().map(|order| order.id.clone()),
                    bound.as_ref().and_then(|order| order.customer_id.clone()),
                    bound.as_ref().map(|order| order.customer_name.clone()),
                    group.date,
                    extraction.order_frequency,
                );
                // Cancellations carry no lines; the whole order is the
                // subject.
                self.proposals.create(&proposal, &[]).await?;

                if let Some(order) = bound {
                    self.lock_for_review(order, &proposal, &[]).await?;
                } else {
                    warn!(
                        event_name = "pipeline.unbound_cancel",
                        intake_event_id = %event.id.0,
                        date = ?group.date,
                        "cancel request with no matching order; surfaced for manual follow-up"
                    );
                }

                Ok(GroupOutcome::ProposalCreated {
                    proposal_id: proposal.id,
                    kind: ProposalKind::CancelOrder,
                    date: group.date,
                })
            }
        }
    }

    async fn create_new_order_proposal(
        &self,
        event: &IntakeEvent,
        snapshot: &CatalogSnapshot,
        customer_id: Option<&CustomerId>,
        extraction: &ExtractionOutcome,
        group: &DateGroup,
        resolved: &[ResolvedLine],
    ) -> Result<GroupOutcome, PipelineError> {
        let customer = customer_id.and_then(|id| snapshot.customer(id));
        let proposal = self.build_proposal(
            event,
            ProposalKind::NewOrder,
            None,
            customer.map(|customer| customer.id.clone()),
            customer.map(|customer| customer.name.clone()),
            group.date,
            extraction.order_frequency,
        );
        let lines = proposal_lines_from_resolved(&proposal.id, resolved);
        self.proposals.create(&proposal, &lines).await?;

        Ok(GroupOutcome::ProposalCreated {
            proposal_id: proposal.id,
            kind: ProposalKind::NewOrder,
            date: group.date,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_proposal(
        &self,
        event: &IntakeEvent,
        kind: ProposalKind,
        order_id: Option<OrderId>,
        customer_id: Option<CustomerId>,
        customer_name: Option<String>,
        delivery_date: Option<NaiveDate>,
        order_frequency: OrderFrequency,
    ) -> Proposal {
        Proposal {
            id: ProposalId(Uuid::new_v4().to_string()),
            organization_id: event.organization_id.clone(),
            order_id,
            intake_event_id: event.id.clone(),
            kind,
            status: ProposalStatus::Pending,
            order_frequency,
            customer_id,
            customer_name,
            delivery_date,
            audit: None,
            reviewer_notes: None,
            reviewed_at: None,
            reviewed_by: None,
            created_at: Utc::now(),
        }
    }

    /// Soft-lock the order while a change/cancel proposal is outstanding
    /// and record the proposal on the order's audit trail.
    async fn lock_for_review(
        &self,
        mut order: Order,
        proposal: &Proposal,
        changes: &[LineChange],
    ) -> Result<(), PipelineError> {
        if order.status != OrderStatus::PendingReview {
            order.transition_to(OrderStatus::PendingReview)?;
            order.updated_at = Utc::now();
            self.orders.save(&order).await?;
        }

        let adds = changes.iter().filter(|c| c.change_type == LineChangeType::Add).count();
        let modifies = changes.iter().filter(|c| c.change_type == LineChangeType::Modify).count();
        let removes = changes.iter().filter(|c| c.change_type == LineChangeType::Remove).count();
        let summary = match proposal.kind {
            ProposalKind::CancelOrder => "cancellation proposed".to_string(),
            _ => format!("{adds} add(s), {modifies} modification(s), {removes} removal(s) proposed"),
        };

        self.orders
            .append_event(&OrderEvent::new(
                order.id.clone(),
                Some(proposal.id.clone()),
                OrderEventKind::ProposalCreated,
                summary,
                json!({
                    "kind": proposal.kind.as_str(),
                    "adds": adds,
                    "modifies": modifies,
                    "removes": removes,
                }),
            ))
            .await?;

        Ok(())
    }
}

fn proposal_lines_from_changes(proposal_id: &ProposalId, changes: &[LineChange]) -> Vec<ProposalLine> {
    changes
        .iter()
        .enumerate()
        .map(|(index, change)| ProposalLine {
            id: ProposalLineId(Uuid::new_v4().to_string()),
            proposal_id: proposal_id.clone(),
            line_number: index as u32 + 1,
            change_type: change.change_type,
            item_id: change.item_id.clone(),
            variant_id: change.variant_id.clone(),
            item_name: change.item_name.clone(),
            order_line_id: change.order_line_id.clone(),
            quantity: change.quantity,
            variant_code: change.variant_code.clone(),
            previous_quantity: change.previous_quantity,
            previous_variant_code: change.previous_variant_code.clone(),
            unmatched: change.unmatched,
        })
        .collect()
}

fn proposal_lines_from_resolved(
    proposal_id: &ProposalId,
    resolved: &[ResolvedLine],
) -> Vec<ProposalLine> {
    resolved
        .iter()
        // A removal directive cannot apply to an order that does not exist
        // yet.
        .filter(|line| !line.remove)
        .enumerate()
        .map(|(index, line)| ProposalLine {
            id: ProposalLineId(Uuid::new_v4().to_string()),
            proposal_id: proposal_id.clone(),
            line_number: index as u32 + 1,
            change_type: LineChangeType::Add,
            item_id: line.item_id.clone(),
            variant_id: line.variant_id.clone(),
            item_name: line.item_name.clone(),
            order_line_id: None,
            quantity: line.quantity,
            variant_code: line.variant_code.clone(),
            previous_quantity: None,
            previous_variant_code: None,
            unmatched: line.unmatched,
        })
        .collect()
}
