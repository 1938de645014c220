use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::order::OrderId;
use crate::grouping::DateGroup;
use crate::matching::CandidateOrders;
use crate::oracle::{ClassificationRequest, ExtractionOracle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderIntent {
    NewOrder,
    ChangeOrder,
    CancelOrder,
    Unknown,
}

impl OrderIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewOrder => "new_order",
            Self::ChangeOrder => "change_order",
            Self::CancelOrder => "cancel_order",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new_order" => Some(Self::NewOrder),
            "change_order" => Some(Self::ChangeOrder),
            "cancel_order" => Some(Self::CancelOrder),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Rule,
    Oracle,
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentDecision {
    pub intent: OrderIntent,
    pub matched_order_id: Option<OrderId>,
    pub confidence: f32,
    pub reasoning: String,
    pub source: DecisionSource,
}

impl IntentDecision {
    fn rule(
        intent: OrderIntent,
        matched_order_id: Option<OrderId>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            intent,
            matched_order_id,
            confidence: 1.0,
            reasoning: reasoning.into(),
            source: DecisionSource::Rule,
        }
    }

    fn fallback(matched_order_id: Option<OrderId>, reasoning: impl Into<String>) -> Self {
        let intent =
            if matched_order_id.is_some() { OrderIntent::ChangeOrder } else { OrderIntent::NewOrder };
        Self {
            intent,
            matched_order_id,
            confidence: 0.5,
            reasoning: reasoning.into(),
            source: DecisionSource::Fallback,
        }
    }
}

/// Classifies a date-group as NEW/CHANGE/CANCEL and binds the target order.
/// Deterministic rules run first; the oracle is only consulted for groups
/// the rules cannot settle, and its verdict is clamped so it can never
/// override the exact-date rule.
pub struct IntentResolver {
    oracle: Arc<dyn ExtractionOracle>,
}

impl IntentResolver {
    pub fn new(oracle: Arc<dyn ExtractionOracle>) -> Self {
        Self { oracle }
    }

    pub async fn resolve(
        &self,
        raw_text: &str,
        group: &DateGroup,
        candidates: &CandidateOrders,
    ) -> IntentDecision {
        let exact = group.date.and_then(|date| candidates.exact_date_match(date));

        // Rule 1: explicit cancel dates force CANCEL_ORDER. With no order
        // on that date the proposal surfaces unbound for manual follow-up.
        if group.cancel_only {
            return match exact {
                Some(order) => IntentDecision::rule(
                    OrderIntent::CancelOrder,
                    Some(order.id.clone()),
                    "explicit cancel date with an order on that date",
                ),
                None => IntentDecision::rule(
                    OrderIntent::CancelOrder,
                    None,
                    "explicit cancel date with no matching order",
                ),
            };
        }

        // Rule 2: an exact-date match with requested lines is a change to
        // that order; no oracle call needed.
        if let Some(order) = exact {
            if !group.lines.is_empty() {
                return IntentDecision::rule(
                    OrderIntent::ChangeOrder,
                    Some(order.id.clone()),
                    "requested lines target a date with an existing order",
                );
            }
        }

        let request = ClassificationRequest { raw_text, group, candidates };
        match self.oracle.classify_intent(request).await {
            Ok(classification) => {
                let mut decision = IntentDecision {
                    intent: classification.intent,
                    matched_order_id: classification.matched_order_id,
                    confidence: classification.confidence,
                    reasoning: classification.reasoning,
                    source: DecisionSource::Oracle,
                };
                if let Some(order) = exact {
                    decision = clamp_to_exact_match(decision, &order.id);
                }
                decision
            }
            Err(error) => {
                warn!(
                    event_name = "intent.oracle_fallback",
                    error = %error,
                    date = ?group.date,
                    "intent oracle failed; defaulting so the message stays reviewable"
                );
                // The exact-date rule survives oracle outages: a group
                // targeting an order's date can never become NEW_ORDER.
                IntentDecision::fallback(
                    exact.map(|order| order.id.clone()),
                    format!("oracle failure: {error}"),
                )
            }
        }
    }
}

/// The exact-date rule outranks the oracle. NEW/UNKNOWN verdicts become
/// CHANGE bound to the exact match; CHANGE/CANCEL verdicts keep their
/// intent but are rebound if the oracle failed to bind.
fn clamp_to_exact_match(mut decision: IntentDecision, exact_order_id: &OrderId) -> IntentDecision {
    match decision.intent {
        OrderIntent::NewOrder | OrderIntent::Unknown => {
            decision.intent = OrderIntent::ChangeOrder;
            decision.matched_order_id = Some(exact_order_id.clone());
            decision.source = DecisionSource::Rule;
            decision.reasoning =
                format!("exact-date match overrides oracle verdict ({})", decision.reasoning);
        }
        OrderIntent::ChangeOrder | OrderIntent::CancelOrder => {
            if decision.matched_order_id.is_none() {
                decision.matched_order_id = Some(exact_order_id.clone());
            }
        }
    }
    decision
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, Utc};

    use crate::domain::item::ItemId;
    use crate::domain::order::{Order, OrderId, OrderStatus};
    use crate::domain::OrganizationId;
    use crate::errors::OracleError;
    use crate::extraction::ExtractedLineItem;
    use crate::grouping::DateGroup;
    use crate::matching::CandidateOrders;
    use crate::oracle::{IntentClassification, ScriptedOracle};

    use super::{DecisionSource, IntentResolver, OrderIntent};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date")
    }

    fn order(id: &str, delivery: NaiveDate) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId(id.to_string()),
            organization_id: OrganizationId("org-1".to_string()),
            customer_id: None,
            customer_name: "Blue Door Bistro".to_string(),
            delivery_date: delivery,
            status: OrderStatus::Ready,
            lines: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn line(item: &str) -> ExtractedLineItem {
        ExtractedLineItem {
            item_id: Some(ItemId(item.to_string())),
            variant_code: None,
            quantity: 1,
            delivery_date: None,
            remove: false,
            raw_text: None,
        }
    }

    fn group(date_day: u32, lines: Vec<ExtractedLineItem>, cancel_only: bool) -> DateGroup {
        DateGroup { date: Some(date(date_day)), lines, cancel_only }
    }

    #[tokio::test]
    async fn cancel_only_group_binds_exact_match_without_oracle() {
        let oracle = Arc::new(ScriptedOracle::default());
        let resolver = IntentResolver::new(oracle);
        let candidates =
            CandidateOrders { upcoming: vec![order("ord-friday", date(6))], recent: vec![] };

        let decision = resolver.resolve("cancel friday", &group(6, vec![], true), &candidates).await;

        assert_eq!(decision.intent, OrderIntent::CancelOrder);
        assert_eq!(decision.matched_order_id.as_ref().map(|id| id.0.as_str()), Some("ord-friday"));
        assert_eq!(decision.source, DecisionSource::Rule);
    }

    #[tokio::test]
    async fn cancel_only_group_without_match_surfaces_unbound() {
        let oracle = Arc::new(ScriptedOracle::default());
        let resolver = IntentResolver::new(oracle);

        let decision = resolver
            .resolve("cancel friday", &group(6, vec![], true), &CandidateOrders::default())
            .await;

        assert_eq!(decision.intent, OrderIntent::CancelOrder);
        assert!(decision.matched_order_id.is_none());
    }

    #[tokio::test]
    async fn exact_date_match_with_lines_skips_the_oracle() {
        let oracle = Arc::new(ScriptedOracle::default());
        let resolver = IntentResolver::new(oracle);
        let candidates =
            CandidateOrders { upcoming: vec![order("ord-friday", date(6))], recent: vec![] };

        let decision = resolver
            .resolve("two more cilantro", &group(6, vec![line("item-cilantro")], false), &candidates)
            .await;

        assert_eq!(decision.intent, OrderIntent::ChangeOrder);
        assert_eq!(decision.matched_order_id.as_ref().map(|id| id.0.as_str()), Some("ord-friday"));
        assert_eq!(decision.source, DecisionSource::Rule);
    }

    #[tokio::test]
    async fn oracle_new_order_verdict_is_clamped_by_exact_date_match() {
        let oracle = Arc::new(ScriptedOracle::default());
        oracle.push_classification(Ok(IntentClassification {
            intent: OrderIntent::NewOrder,
            matched_order_id: None,
            confidence: 0.9,
            reasoning: "looks new to me".to_string(),
        }));
        let resolver = IntentResolver::new(oracle);
        let candidates =
            CandidateOrders { upcoming: vec![order("ord-friday", date(6))], recent: vec![] };

        let decision =
            resolver.resolve("about friday...", &group(6, vec![], false), &candidates).await;

        assert_eq!(decision.intent, OrderIntent::ChangeOrder);
        assert_eq!(decision.matched_order_id.as_ref().map(|id| id.0.as_str()), Some("ord-friday"));
        assert_eq!(decision.source, DecisionSource::Rule);
    }

    #[tokio::test]
    async fn oracle_cancel_verdict_is_rebound_to_exact_match_when_unbound() {
        let oracle = Arc::new(ScriptedOracle::default());
        oracle.push_classification(Ok(IntentClassification {
            intent: OrderIntent::CancelOrder,
            matched_order_id: None,
            confidence: 0.8,
            reasoning: "kitchen closed, no item named".to_string(),
        }));
        let resolver = IntentResolver::new(oracle);
        let candidates =
            CandidateOrders { upcoming: vec![order("ord-friday", date(6))], recent: vec![] };

        let decision = resolver
            .resolve("please cancel our friday order", &group(6, vec![], false), &candidates)
            .await;

        assert_eq!(decision.intent, OrderIntent::CancelOrder);
        assert_eq!(decision.matched_order_id.as_ref().map(|id| id.0.as_str()), Some("ord-friday"));
    }

    #[tokio::test]
    async fn oracle_failure_defaults_to_new_order_at_half_confidence() {
        let oracle = Arc::new(ScriptedOracle::default());
        oracle.push_classification(Err(OracleError::Unavailable("timeout".to_string())));
        let resolver = IntentResolver::new(oracle);

        let decision = resolver
            .resolve(
                "three trays of sunflower",
                &group(6, vec![line("item-sunflower")], false),
                &CandidateOrders::default(),
            )
            .await;

        assert_eq!(decision.intent, OrderIntent::NewOrder);
        assert_eq!(decision.confidence, 0.5);
        assert_eq!(decision.source, DecisionSource::Fallback);
    }

    #[tokio::test]
    async fn oracle_failure_with_exact_match_still_respects_precedence() {
        let oracle = Arc::new(ScriptedOracle::default());
        oracle.push_classification(Err(OracleError::Parse("garbage json".to_string())));
        let resolver = IntentResolver::new(oracle);
        let candidates =
            CandidateOrders { upcoming: vec![order("ord-friday", date(6))], recent: vec![] };

        let decision = resolver.resolve("hm", &group(6, vec![], false), &candidates).await;

        assert_eq!(decision.intent, OrderIntent::ChangeOrder);
        assert_eq!(decision.matched_order_id.as_ref().map(|id| id.0.as_str()), Some("ord-friday"));
    }
}
