use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use orderdesk_core::errors::OracleError;
use orderdesk_core::extraction::ExtractionOutcome;
use orderdesk_core::oracle::{
    ClassificationRequest, ExtractionOracle, ExtractionRequest, IntentClassification,
};

use crate::llm::LlmClient;
use crate::prompt::ProfileRegistry;

/// LLM-backed implementation of the extraction oracle: profile prompt in,
/// JSON out. Transport failures surface as `Unavailable`, malformed
/// payloads as `Parse`; the pipeline degrades on both instead of failing.
pub struct LlmOracle {
    client: Arc<dyn LlmClient>,
    profiles: ProfileRegistry,
}

impl LlmOracle {
    pub fn new(client: Arc<dyn LlmClient>, profiles: ProfileRegistry) -> Self {
        Self { client, profiles }
    }
}

#[async_trait]
impl ExtractionOracle for LlmOracle {
    async fn extract(
        &self,
        request: ExtractionRequest<'_>,
    ) -> Result<ExtractionOutcome, OracleError> {
        let profile = self.profiles.for_organization(&request.event.organization_id);
        let prompt = profile
            .render_extraction(&request)
            .map_err(|error| OracleError::Unavailable(format!("prompt rendering: {error}")))?;

        let raw = self
            .client
            .complete(&prompt)
            .await
            .map_err(|error| OracleError::Unavailable(error.to_string()))?;
        debug!(event_name = "oracle.extraction_raw", bytes = raw.len(), "extraction reply");

        parse_json_payload(&raw)
    }

    async fn classify_intent(
        &self,
        request: ClassificationRequest<'_>,
    ) -> Result<IntentClassification, OracleError> {
        // Intent classification has no organization handle of its own; the
        // candidates all belong to one, so borrow it from them, falling
        // back to the default profile.
        let organization_id = request
            .candidates
            .upcoming
            .first()
            .or_else(|| request.candidates.recent.first())
            .map(|order| order.organization_id.clone());
        let profile = match &organization_id {
            Some(organization_id) => self.profiles.for_organization(organization_id),
            None => self.profiles.for_organization(&orderdesk_core::domain::OrganizationId(
                String::new(),
            )),
        };

        let prompt = profile
            .render_classification(&request)
            .map_err(|error| OracleError::Unavailable(format!("prompt rendering: {error}")))?;

        let raw = self
            .client
            .complete(&prompt)
            .await
            .map_err(|error| OracleError::Unavailable(error.to_string()))?;

        parse_json_payload(&raw)
    }
}

/// Extract the first JSON object from an LLM reply, tolerating markdown
/// fences and prose around it.
fn parse_json_payload<T: DeserializeOwned>(raw: &str) -> Result<T, OracleError> {
    let start = raw
        .find('{')
        .ok_or_else(|| OracleError::Parse("reply contains no JSON object".to_string()))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| OracleError::Parse("reply contains no closing brace".to_string()))?;
    if end < start {
        return Err(OracleError::Parse("reply braces are out of order".to_string()));
    }

    serde_json::from_str(&raw[start..=end]).map_err(|error| OracleError::Parse(error.to_string()))
}
