use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use orderdesk_core::domain::order::OrderId;
use orderdesk_core::resolution::{CreateOrderRequest, OrderMutationPort, SubmittedLine};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    pub async fn dispatch(&self, name: &str, input: Value) -> Result<Value> {
        let tool =
            self.tools.get(name).ok_or_else(|| anyhow!("unknown tool `{name}`"))?;
        tool.execute(input).await
    }
}

/// The standard mutation toolset over `OrderMutationPort`: the same
/// primitives the resolution engine uses, exposed to the tool-calling
/// runtime.
pub fn mutation_tools(port: Arc<dyn OrderMutationPort>) -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    registry.register(CreateOrderTool { port: port.clone() });
    registry.register(ApplyChangeTool { port: port.clone() });
    registry.register(CancelOrderTool { port });
    registry
}

pub struct CreateOrderTool {
    port: Arc<dyn OrderMutationPort>,
}

#[async_trait]
impl Tool for CreateOrderTool {
    fn name(&self) -> &'static str {
        "create_order"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let request: CreateOrderRequest =
            serde_json::from_value(input).context("create_order input")?;
        let order = self.port.create_order(request).await?;
        Ok(json!({
            "order_id": order.id.0,
            "status": order.status.as_str(),
            "line_count": order.lines.len(),
        }))
    }
}

#[derive(Deserialize)]
struct ApplyChangeInput {
    order_id: String,
    changes: Vec<SubmittedLine>,
}

pub struct ApplyChangeTool {
    port: Arc<dyn OrderMutationPort>,
}

#[async_trait]
impl Tool for ApplyChangeTool {
    fn name(&self) -> &'static str {
        "apply_change"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: ApplyChangeInput = serde_json::from_value(input).context("apply_change input")?;
        let order =
            self.port.apply_change(&OrderId(input.order_id), &input.changes).await?;
        Ok(json!({
            "order_id": order.id.0,
            "status": order.status.as_str(),
            "active_line_count": order.active_lines().len(),
        }))
    }
}

#[derive(Deserialize)]
struct CancelOrderInput {
    order_id: String,
}

pub struct CancelOrderTool {
    port: Arc<dyn OrderMutationPort>,
}

#[async_trait]
impl Tool for CancelOrderTool {
    fn name(&self) -> &'static str {
        "cancel_order"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: CancelOrderInput =
            serde_json::from_value(input).context("cancel_order input")?;
        let order = self.port.cancel_order(&OrderId(input.order_id)).await?;
        Ok(json!({ "order_id": order.id.0, "status": order.status.as_str() }))
    }
}
