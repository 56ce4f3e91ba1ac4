use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};

type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, AgentResult<Value>> + Send + Sync>;

/// Maps tool names to their descriptors and handlers. The valid tool set is
/// closed and enumerable: it is populated once at startup and every dispatch
/// goes through it, never through ambient lookup.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<(Tool, ToolHandler)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with its handler. Names must be unique within the
    /// registry.
    pub fn register<F, Fut>(&mut self, tool: Tool, handler: F) -> AgentResult<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<Value>> + Send + 'static,
    {
        if self.tools.iter().any(|(t, _)| t.name == tool.name) {
            return Err(AgentError::Internal(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }
        let handler: ToolHandler = Arc::new(move |arguments| Box::pin(handler(arguments)));
        self.tools.push((tool, handler));
        Ok(())
    }

    /// The descriptors to offer the model, in registration order
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|(tool, _)| tool.clone()).collect()
    }

    /// Validate the call against the declared schema and invoke the handler.
    /// The registry only routes; side effects belong to the tool itself.
    pub async fn dispatch(&self, call: &ToolCall) -> AgentResult<Value> {
        let (tool, handler) = self
            .tools
            .iter()
            .find(|(tool, _)| tool.name == call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        validate_arguments(&tool.parameters, &call.arguments)?;

        debug!(tool = %call.name, "dispatching tool call");
        handler(call.arguments.clone()).await
    }
}

/// Check the argument payload against the tool's schema: it must be an
/// object, every required key must be present, and no key outside the
/// declared properties is accepted.
fn validate_arguments(schema: &Value, arguments: &Value) -> AgentResult<()> {
    let supplied = arguments.as_object().ok_or_else(|| {
        AgentError::InvalidParameters("arguments must be a JSON object".to_string())
    })?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !supplied.contains_key(key) {
                return Err(AgentError::InvalidParameters(format!(
                    "missing required argument '{}'",
                    key
                )));
            }
        }
    }

    let declared = schema.get("properties").and_then(Value::as_object);
    for key in supplied.keys() {
        if !declared.is_some_and(|properties| properties.contains_key(key)) {
            return Err(AgentError::InvalidParameters(format!(
                "undeclared argument '{}'",
                key
            )));
        }
    }

    Ok(())
}
