use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use orderdesk_agent::{HttpLlmClient, LlmOracle, ProfileRegistry};
use orderdesk_core::config::LoadOptions;
use orderdesk_core::domain::intake::IntakeEvent;
use orderdesk_core::extraction::ExtractionOutcome;
use orderdesk_core::oracle::{ExtractionOracle, ScriptedOracle};
use orderdesk_core::pipeline::IntakePipeline;
use orderdesk_core::ports::IntakeEventStore;
use orderdesk_db::{SqlCatalogStore, SqlIntakeEventStore, SqlOrderStore, SqlProposalStore};

use crate::bootstrap::bootstrap;
use crate::commands::{runtime, CommandResult};

/// Run the pipeline for one intake event. With `--extraction` the oracle is
/// scripted from a file and classification falls back to the deterministic
/// rules; without it the configured LLM endpoint is used.
pub fn run(event_path: &Path, extraction_path: Option<&Path>) -> CommandResult {
    let event: IntakeEvent = match read_json(event_path) {
        Ok(event) => event,
        Err(message) => return CommandResult::failure("process", "event_file", message, 2),
    };

    let scripted: Option<ExtractionOutcome> = match extraction_path {
        Some(path) => match read_json(path) {
            Ok(extraction) => Some(extraction),
            Err(message) => {
                return CommandResult::failure("process", "extraction_file", message, 2)
            }
        },
        None => None,
    };

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "process",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let app = bootstrap(LoadOptions::default())
            .await
            .map_err(|error| ("bootstrap", error.to_string(), 2u8))?;

        let oracle: Arc<dyn ExtractionOracle> = match scripted {
            Some(extraction) => {
                let oracle = ScriptedOracle::default();
                oracle.push_extraction(Ok(extraction));
                Arc::new(oracle)
            }
            None => {
                let client = HttpLlmClient::new(app.config.oracle.clone())
                    .map_err(|error| ("oracle_init", error.to_string(), 3u8))?;
                Arc::new(LlmOracle::new(Arc::new(client), ProfileRegistry::default()))
            }
        };

        let intake_store = SqlIntakeEventStore::new(app.db_pool.clone());
        intake_store
            .save(&event)
            .await
            .map_err(|error| ("intake_persist", error.to_string(), 4u8))?;

        let pipeline = IntakePipeline::new(
            Arc::new(SqlCatalogStore::new(app.db_pool.clone())),
            Arc::new(SqlOrderStore::new(app.db_pool.clone())),
            Arc::new(SqlProposalStore::new(app.db_pool.clone())),
            oracle,
            app.config.pipeline.match_limits(),
        );

        let outcome = pipeline
            .process(&event, Utc::now().date_naive())
            .await
            .map_err(|error| ("pipeline", error.to_string(), 5u8))?;

        app.db_pool.close().await;
        serde_json::to_string_pretty(&outcome)
            .map_err(|error| ("serialization", error.to_string(), 6u8))
    });

    match result {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("process", error_class, message, exit_code)
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("could not read `{}`: {error}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|error| format!("could not parse `{}`: {error}", path.display()))
}
