use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use orderdesk_core::config::LoadOptions;
use orderdesk_core::domain::proposal::ProposalId;
use orderdesk_core::resolution::{ResolutionEngine, ReviewAction, ReviewDecision, SubmittedLine};
use orderdesk_db::{SqlOrderStore, SqlProposalStore};

use crate::bootstrap::bootstrap;
use crate::commands::{runtime, CommandResult};

pub fn run(
    proposal: &str,
    action: &str,
    notes: Option<String>,
    reviewed_by: &str,
    lines_path: Option<&Path>,
) -> CommandResult {
    let action = match action {
        "accept" => ReviewAction::Accept,
        "reject" => ReviewAction::Reject,
        other => {
            return CommandResult::failure(
                "resolve",
                "invalid_action",
                format!("unknown action `{other}` (expected accept|reject)"),
                2,
            );
        }
    };

    let submitted_lines: Option<Vec<SubmittedLine>> = match lines_path {
        Some(path) => match read_lines(path) {
            Ok(lines) => Some(lines),
            Err(message) => return CommandResult::failure("resolve", "lines_file", message, 2),
        },
        None => None,
    };

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "resolve",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let decision = ReviewDecision {
        proposal_id: ProposalId(proposal.to_string()),
        action,
        submitted_lines,
        customer_id: None,
        customer_name: None,
        delivery_date: None,
        notes,
        reviewed_by: reviewed_by.to_string(),
    };

    let result = runtime.block_on(async {
        let app = bootstrap(LoadOptions::default())
            .await
            .map_err(|error| ("bootstrap", error.to_string(), 2u8))?;

        let engine = ResolutionEngine::new(
            Arc::new(SqlOrderStore::new(app.db_pool.clone())),
            Arc::new(SqlProposalStore::new(app.db_pool.clone())),
        );

        let outcome = engine
            .resolve(decision)
            .await
            .map_err(|error| ("resolution", error.to_string(), 5u8))?;

        app.db_pool.close().await;

        let payload = json!({
            "proposal_id": outcome.proposal.id.0,
            "status": outcome.proposal.status.as_str(),
            "kind": outcome.proposal.kind.as_str(),
            "order_id": outcome.order.as_ref().map(|order| order.id.0.clone()),
            "order_status": outcome.order.as_ref().map(|order| order.status.as_str()),
            "was_edited": outcome.audit.as_ref().map(|audit| audit.was_edited),
        });
        serde_json::to_string_pretty(&payload)
            .map_err(|error| ("serialization", error.to_string(), 6u8))
    });

    match result {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("resolve", error_class, message, exit_code)
        }
    }
}

fn read_lines(path: &Path) -> Result<Vec<SubmittedLine>, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("could not read `{}`: {error}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|error| format!("could not parse `{}`: {error}", path.display()))
}
