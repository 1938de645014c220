use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::intake::IntakeEvent;
use crate::domain::order::{Order, OrderId};
use crate::errors::OracleError;
use crate::extraction::ExtractionOutcome;
use crate::grouping::DateGroup;
use crate::intent::OrderIntent;
use crate::matching::CandidateOrders;
use crate::snapshot::CatalogSnapshot;

/// Everything the oracle sees for an extraction call: the raw message, the
/// organization's catalog, and the bounded set of existing orders.
pub struct ExtractionRequest<'a> {
    pub event: &'a IntakeEvent,
    pub snapshot: &'a CatalogSnapshot,
    pub existing_orders: &'a [Order],
}

/// Context for an ambiguous-intent classification call. The deterministic
/// pre-rules have already run; the oracle only sees groups they could not
/// settle.
pub struct ClassificationRequest<'a> {
    pub raw_text: &'a str,
    pub group: &'a DateGroup,
    pub candidates: &'a CandidateOrders,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: OrderIntent,
    pub matched_order_id: Option<OrderId>,
    pub confidence: f32,
    pub reasoning: String,
}

/// The external NLP service converting free text into structured order
/// lines and intent verdicts. Fallible and possibly low-confidence by
/// contract; nothing downstream trusts it to uphold ledger invariants.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    async fn extract(
        &self,
        request: ExtractionRequest<'_>,
    ) -> Result<ExtractionOutcome, OracleError>;

    async fn classify_intent(
        &self,
        request: ClassificationRequest<'_>,
    ) -> Result<IntentClassification, OracleError>;
}

/// Queue-backed oracle for tests and offline pipeline runs: responses are
/// played back in the order they were scripted.
#[derive(Default)]
pub struct ScriptedOracle {
    extractions: Mutex<VecDeque<Result<ExtractionOutcome, OracleError>>>,
    classifications: Mutex<VecDeque<Result<IntentClassification, OracleError>>>,
}

impl ScriptedOracle {
    pub fn push_extraction(&self, result: Result<ExtractionOutcome, OracleError>) {
        match self.extractions.lock() {
            Ok(mut queue) => queue.push_back(result),
            Err(poisoned) => poisoned.into_inner().push_back(result),
        }
    }

    pub fn push_classification(&self, result: Result<IntentClassification, OracleError>) {
        match self.classifications.lock() {
            Ok(mut queue) => queue.push_back(result),
            Err(poisoned) => poisoned.into_inner().push_back(result),
        }
    }
}

#[async_trait]
impl ExtractionOracle for ScriptedOracle {
    async fn extract(
        &self,
        _request: ExtractionRequest<'_>,
    ) -> Result<ExtractionOutcome, OracleError> {
        let next = match self.extractions.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or_else(|| {
            Err(OracleError::Unavailable("no scripted extraction remaining".to_string()))
        })
    }

    async fn classify_intent(
        &self,
        _request: ClassificationRequest<'_>,
    ) -> Result<IntentClassification, OracleError> {
        let next = match self.classifications.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or_else(|| {
            Err(OracleError::Unavailable("no scripted classification remaining".to_string()))
        })
    }
}
