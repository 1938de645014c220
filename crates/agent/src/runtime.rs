use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::LlmClient;
use crate::tools::ToolRegistry;

/// One executed step of the agent loop, kept for the transcript the model
/// sees on its next turn.
#[derive(Clone, Debug)]
pub struct AgentStep {
    pub tool: String,
    pub input: Value,
    pub observation: String,
}

#[derive(Clone, Debug)]
pub struct AgentOutcome {
    pub summary: String,
    pub steps: Vec<AgentStep>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AgentDirective {
    Done { done: bool, summary: Option<String> },
    ToolCall { tool: String, input: Value },
}

/// The autonomous tool-calling variant of the pipeline: a bounded loop in
/// which the model chooses `create_order` / `apply_change` /
/// `cancel_order` invocations itself. Every mutation still flows through
/// `OrderMutationPort`, so the ledger rules are identical to the direct
/// pipeline's.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    max_turns: usize,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry) -> Self {
        Self { llm, tools, max_turns: 8 }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub async fn run(&self, objective: &str) -> Result<AgentOutcome> {
        let mut steps: Vec<AgentStep> = Vec::new();

        for turn in 0..self.max_turns {
            let prompt = self.build_prompt(objective, &steps);
            let reply = self.llm.complete(&prompt).await?;
            let directive = parse_directive(&reply)?;

            match directive {
                AgentDirective::Done { done, summary } => {
                    if !done {
                        return Err(anyhow!("agent sent done=false without a tool call"));
                    }
                    info!(event_name = "agent.done", turns = turn, "agent loop finished");
                    return Ok(AgentOutcome {
                        summary: summary.unwrap_or_else(|| "done".to_string()),
                        steps,
                    });
                }
                AgentDirective::ToolCall { tool, input } => {
                    let observation = match self.tools.dispatch(&tool, input.clone()).await {
                        Ok(result) => result.to_string(),
                        // The model sees the failure and can correct course
                        // on the next turn.
                        Err(error) => {
                            warn!(
                                event_name = "agent.tool_failed",
                                tool = %tool,
                                error = %error,
                                "tool execution failed"
                            );
                            format!("error: {error}")
                        }
                    };
                    steps.push(AgentStep { tool, input, observation });
                }
            }
        }

        Err(anyhow!("agent did not finish within {} turns", self.max_turns))
    }

    fn build_prompt(&self, objective: &str, steps: &[AgentStep]) -> String {
        let mut prompt = format!(
            "You operate an order ledger through tools. Available tools: {}.\n\
             Objective:\n{objective}\n\n",
            self.tools.names().join(", ")
        );
        for step in steps {
            prompt.push_str(&format!(
                "Called {} with {} -> {}\n",
                step.tool, step.input, step.observation
            ));
        }
        prompt.push_str(
            "\nRespond with only a JSON object: either\n\
             {\"tool\": \"<name>\", \"input\": { ... }} to act, or\n\
             {\"done\": true, \"summary\": \"...\"} when the objective is met.",
        );
        prompt
    }
}

fn parse_directive(reply: &str) -> Result<AgentDirective> {
    let start = reply.find('{').ok_or_else(|| anyhow!("agent reply contains no JSON"))?;
    let end = reply.rfind('}').ok_or_else(|| anyhow!("agent reply contains no closing brace"))?;
    serde_json::from_str(&reply[start..=end])
        .map_err(|error| anyhow!("unparseable agent directive: {error}"))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};

    use orderdesk_core::domain::customer::CustomerId;
    use orderdesk_core::domain::order::{Order, OrderId, OrderStatus};
    use orderdesk_core::domain::OrganizationId;
    use orderdesk_core::ports::{InMemoryOrderStore, InMemoryProposalStore, OrderStore};
    use orderdesk_core::resolution::ResolutionEngine;

    use crate::llm::LlmClient;
    use crate::tools::mutation_tools;

    use super::AgentRuntime;

    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            let mut replies = self.replies.lock().expect("lock");
            replies.pop_front().ok_or_else(|| anyhow!("no scripted reply remaining"))
        }
    }

    async fn order_store() -> Arc<InMemoryOrderStore> {
        let orders = Arc::new(InMemoryOrderStore::default());
        let now = Utc::now();
        orders
            .insert(Order {
                id: OrderId("ord-1".to_string()),
                organization_id: OrganizationId("org-1".to_string()),
                customer_id: Some(CustomerId("cust-1".to_string())),
                customer_name: "Blue Door Bistro".to_string(),
                delivery_date: NaiveDate::from_ymd_opt(2026, 3, 6).expect("date"),
                status: OrderStatus::Ready,
                lines: vec![],
                created_at: now,
                updated_at: now,
            })
            .await;
        orders
    }

    #[tokio::test]
    async fn agent_drives_a_cancellation_through_the_mutation_port() {
        let orders = order_store().await;
        let engine =
            ResolutionEngine::new(orders.clone(), Arc::new(InMemoryProposalStore::default()));
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"tool": "cancel_order", "input": {"order_id": "ord-1"}}"#,
            r#"{"done": true, "summary": "cancelled the friday order"}"#,
        ]));

        let runtime = AgentRuntime::new(llm, mutation_tools(Arc::new(engine)));
        let outcome = runtime.run("cancel the friday order for Blue Door Bistro").await.expect("run");

        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(outcome.steps[0].tool, "cancel_order");
        assert_eq!(outcome.summary, "cancelled the friday order");

        let order = orders
            .find_by_id(&OrderId("ord-1".to_string()))
            .await
            .expect("find")
            .expect("order");
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn tool_failures_are_fed_back_instead_of_aborting() {
        let orders = order_store().await;
        let engine =
            ResolutionEngine::new(orders.clone(), Arc::new(InMemoryProposalStore::default()));
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"tool": "cancel_order", "input": {"order_id": "ord-missing"}}"#,
            r#"{"tool": "cancel_order", "input": {"order_id": "ord-1"}}"#,
            r#"{"done": true, "summary": "second try worked"}"#,
        ]));

        let runtime = AgentRuntime::new(llm, mutation_tools(Arc::new(engine)));
        let outcome = runtime.run("cancel the friday order").await.expect("run");

        assert_eq!(outcome.steps.len(), 2);
        assert!(outcome.steps[0].observation.starts_with("error:"));
        assert_eq!(outcome.summary, "second try worked");
    }

    #[tokio::test]
    async fn runaway_loops_are_bounded() {
        let orders = order_store().await;
        let engine =
            ResolutionEngine::new(orders.clone(), Arc::new(InMemoryProposalStore::default()));
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"tool": "cancel_order", "input": {"order_id": "ord-missing"}}"#,
            r#"{"tool": "cancel_order", "input": {"order_id": "ord-missing"}}"#,
        ]));

        let runtime = AgentRuntime::new(llm, mutation_tools(Arc::new(engine))).with_max_turns(2);
        let error = runtime.run("cancel something").await.expect_err("must hit the bound");
        assert!(error.to_string().contains("2 turns"));
    }
}
