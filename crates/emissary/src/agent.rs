use std::sync::Arc;

use anyhow::Result;
use futures::stream::BoxStream;
use serde_json::Value;
use tracing::info;

use crate::errors::AgentResult;
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::ToolCall;
use crate::providers::base::Provider;
use crate::registry::ToolRegistry;

/// Maximum model round-trips for a single user turn. Guards against a model
/// that never stops requesting tools.
pub const MAX_TOOL_ROUNDS: usize = 12;

/// What the user sees when a turn hits the round cap instead of producing an
/// answer.
pub const EXHAUSTED_REPLY: &str =
    "I'm sorry, I'm unable to complete that request right now. Please try again.";

/// Drives the bounded tool-calling loop: model call, tool dispatch, repeat,
/// until the model answers in plain text or the round cap is hit.
pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
    system_prompt: String,
}

impl Agent {
    pub fn new<S: Into<String>>(
        provider: Arc<dyn Provider>,
        registry: ToolRegistry,
        system_prompt: S,
    ) -> Self {
        Self {
            provider,
            registry,
            system_prompt: system_prompt.into(),
        }
    }

    /// Dispatch a single requested invocation. A request that already failed
    /// to parse at the provider boundary is forwarded as its error.
    async fn dispatch_tool_call(&self, tool_call: &AgentResult<ToolCall>) -> AgentResult<Value> {
        match tool_call {
            Ok(call) => self.registry.dispatch(call).await,
            Err(e) => Err(e.clone()),
        }
    }

    /// Create a stream that yields each message as it is generated during
    /// the turn: the assistant's responses and any tool-response messages.
    ///
    /// The conversation value is append-only: tool responses are appended in
    /// the same order their invocations were requested, keeping every
    /// response paired one-to-one with the request it answers. The caller
    /// owns the history; messages yielded here must be appended by the
    /// caller to keep the next turn consistent.
    pub async fn reply(&self, messages: &[Message]) -> Result<BoxStream<'_, Result<Message>>> {
        let mut messages = messages.to_vec();
        let tools = self.registry.tools();

        Ok(Box::pin(async_stream::try_stream! {
            let mut rounds = 0;
            loop {
                if rounds == MAX_TOOL_ROUNDS {
                    info!(rounds, "tool loop exhausted, aborting turn");
                    yield Message::assistant().with_text(EXHAUSTED_REPLY);
                    break;
                }
                rounds += 1;

                let (response, _usage) = self
                    .provider
                    .complete(&self.system_prompt, &messages, &tools)
                    .await?;

                yield response.clone();

                let tool_requests: Vec<ToolRequest> =
                    response.tool_requests().into_iter().cloned().collect();

                if tool_requests.is_empty() {
                    // Final answer, end the turn
                    break;
                }

                // Let the response message flush to the caller before the
                // dispatches start running
                tokio::task::yield_now().await;

                let dispatches: Vec<_> = tool_requests
                    .iter()
                    .map(|request| self.dispatch_tool_call(&request.tool_call))
                    .collect();

                let outputs = futures::future::join_all(dispatches).await;

                // Zip results back in request order, whatever order the
                // dispatches finished in
                let mut tool_message = Message::user();
                for (request, output) in tool_requests.iter().zip(outputs.into_iter()) {
                    tool_message = tool_message.with_tool_response(request.id.clone(), output);
                }

                messages.push(response);
                messages.push(tool_message.clone());

                yield tool_message;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::MessageContent;
    use crate::models::tool::Tool;
    use crate::providers::mock::MockProvider;
    use futures::TryStreamExt;
    use serde_json::json;

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                Tool::new(
                    "echo",
                    "Echoes back the input",
                    json!({
                        "type": "object",
                        "properties": {"message": {"type": "string"}},
                        "required": ["message"],
                        "additionalProperties": false
                    }),
                ),
                |arguments| async move {
                    let message = arguments
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    Ok(json!({"echo": message}))
                },
            )
            .unwrap();
        registry
    }

    async fn collect(agent: &Agent, messages: &[Message]) -> Result<Vec<Message>> {
        let mut stream = agent.reply(messages).await?;
        let mut collected = Vec::new();
        while let Some(message) = stream.try_next().await? {
            collected.push(message);
        }
        Ok(collected)
    }

    #[tokio::test]
    async fn test_simple_response() -> Result<()> {
        let response = Message::assistant().with_text("Hello!");
        let provider = MockProvider::new(vec![response.clone()]);
        let agent = Agent::new(
            Arc::new(provider.clone()),
            echo_registry(),
            "You are a helpful assistant.",
        );

        let messages = collect(&agent, &[Message::user().with_text("Hi")]).await?;

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], response);
        // A final answer must come from exactly one model call
        assert_eq!(provider.complete_calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_call() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new("echo", json!({"message": "test"}))),
            ),
            Message::assistant().with_text("Done!"),
        ]);
        let agent = Agent::new(
            Arc::new(provider),
            echo_registry(),
            "You are a helpful assistant.",
        );

        let messages = collect(&agent, &[Message::user().with_text("Echo test")]).await?;

        // Tool request, tool response, and the model's final text
        assert_eq!(messages.len(), 3);
        assert!(messages[0]
            .content
            .iter()
            .any(|c| matches!(c, MessageContent::ToolRequest(_))));
        let response = messages[1].content[0].as_tool_response().unwrap();
        assert_eq!(response.id, "1");
        assert_eq!(response.tool_result, Ok(json!({"echo": "test"})));
        assert_eq!(messages[2].text(), "Done!");
        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_tool_calls_answered_in_request_order() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("echo", json!({"message": "first"}))))
                .with_tool_request("2", Ok(ToolCall::new("echo", json!({"message": "second"}))))
                .with_tool_request("3", Ok(ToolCall::new("echo", json!({"message": "third"})))),
            Message::assistant().with_text("All done!"),
        ]);
        let agent = Agent::new(
            Arc::new(provider),
            echo_registry(),
            "You are a helpful assistant.",
        );

        let messages = collect(&agent, &[Message::user().with_text("Multiple calls")]).await?;

        assert_eq!(messages.len(), 3);

        // Every response answers a request from the immediately preceding
        // assistant message, one-to-one, in invocation order
        let request_ids: Vec<&str> = messages[0]
            .tool_requests()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        let response_ids: Vec<&str> = messages[1]
            .content
            .iter()
            .filter_map(|c| c.as_tool_response())
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(request_ids, vec!["1", "2", "3"]);
        assert_eq!(response_ids, request_ids);
        assert_eq!(messages[2].text(), "All done!");
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_tool_is_surfaced_not_dropped() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("invalid_tool", json!({})))),
            Message::assistant().with_text("Error occurred"),
        ]);
        let agent = Agent::new(
            Arc::new(provider),
            echo_registry(),
            "You are a helpful assistant.",
        );

        let messages = collect(&agent, &[Message::user().with_text("Invalid tool")]).await?;

        assert_eq!(messages.len(), 3);
        let response = messages[1].content[0].as_tool_response().unwrap();
        assert!(matches!(
            response.tool_result,
            Err(crate::errors::AgentError::ToolNotFound(_))
        ));
        assert_eq!(messages[2].text(), "Error occurred");
        Ok(())
    }

    #[tokio::test]
    async fn test_loop_exhaustion_yields_apology() -> Result<()> {
        // A model that never stops asking for the same tool, with arguments
        // that always fail validation
        let responses: Vec<Message> = (0..MAX_TOOL_ROUNDS * 2)
            .map(|i| {
                Message::assistant().with_tool_request(
                    i.to_string(),
                    Ok(ToolCall::new("echo", json!({"wrong_key": "value"}))),
                )
            })
            .collect();
        let provider = MockProvider::new(responses);
        let agent = Agent::new(
            Arc::new(provider.clone()),
            echo_registry(),
            "You are a helpful assistant.",
        );

        let messages = collect(&agent, &[Message::user().with_text("Loop forever")]).await?;

        // 12 rounds of request + response, then the apology instead of a
        // 13th model call
        assert_eq!(provider.complete_calls(), MAX_TOOL_ROUNDS);
        assert_eq!(messages.len(), MAX_TOOL_ROUNDS * 2 + 1);
        assert_eq!(messages.last().unwrap().text(), EXHAUSTED_REPLY);

        // Every round fed a validation error back rather than raising
        for round in messages.chunks(2).take(MAX_TOOL_ROUNDS) {
            let response = round[1].content[0].as_tool_response().unwrap();
            assert!(matches!(
                response.tool_result,
                Err(crate::errors::AgentError::InvalidParameters(_))
            ));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_registry_still_answers() -> Result<()> {
        let provider = MockProvider::new(vec![Message::assistant().with_text("Just text")]);
        let agent = Agent::new(Arc::new(provider), ToolRegistry::new(), "system");

        let messages = collect(&agent, &[Message::user().with_text("Hi")]).await?;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), "Just text");
        Ok(())
    }
}
