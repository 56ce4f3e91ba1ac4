use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};

use crate::agent::Agent;
use crate::models::tool::Tool;
use crate::notify::Notifier;
use crate::providers::base::Provider;
use crate::registry::ToolRegistry;

/// The fixed character the chat agent impersonates, grounded by a system
/// prompt. The summary and profile documents are opaque strings folded into
/// the prompt verbatim; their internal structure is never parsed here.
pub struct Persona {
    pub name: String,
    summary: String,
    profile: String,
}

impl Persona {
    pub fn new<N, S, P>(name: N, summary: S, profile: P) -> Self
    where
        N: Into<String>,
        S: Into<String>,
        P: Into<String>,
    {
        Self {
            name: name.into(),
            summary: summary.into(),
            profile: profile.into(),
        }
    }

    /// Compose the grounding system prompt for the persona
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are acting as {name}. Answer questions about {name}'s career, background, \
             skills and experience. Represent the persona faithfully and professionally. \
             If you do not know an answer, call record_unknown_question. Encourage the user \
             to share their email and record it via record_user_details.",
            name = self.name
        );
        if !self.summary.is_empty() {
            prompt.push_str(&format!("\n\n## Summary\n{}", self.summary));
        }
        if !self.profile.is_empty() {
            prompt.push_str(&format!("\n\n## Profile\n{}", self.profile));
        }
        prompt.push_str(&format!("\n\nStay strictly in character as {}.", self.name));
        prompt
    }

    /// Build the chat agent for this persona: the bounded tool-calling loop
    /// over a registry holding the two recording tools.
    pub fn into_agent(self, provider: Arc<dyn Provider>, notifier: Arc<Notifier>) -> Result<Agent> {
        let system_prompt = self.system_prompt();
        let mut registry = ToolRegistry::new();

        let push = notifier.clone();
        registry.register(record_user_details_tool(), move |arguments: Value| {
            let push = push.clone();
            async move {
                let email = arguments
                    .get("email")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let name = arguments
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("Name not provided")
                    .to_string();
                let notes = arguments
                    .get("notes")
                    .and_then(Value::as_str)
                    .unwrap_or("not provided")
                    .to_string();
                push.push(&format!(
                    "Recording {} with email {} and notes {}",
                    name, email, notes
                ))
                .await;
                Ok(json!({"recorded": "ok"}))
            }
        })?;

        let push = notifier.clone();
        registry.register(record_unknown_question_tool(), move |arguments: Value| {
            let push = push.clone();
            async move {
                let question = arguments
                    .get("question")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                push.push(&format!("Recording {}", question)).await;
                Ok(json!({"recorded": "ok"}))
            }
        })?;

        Ok(Agent::new(provider, registry, system_prompt))
    }
}

fn record_user_details_tool() -> Tool {
    Tool::new(
        "record_user_details",
        "Use this tool to record that a user is interested in being in touch and provided an email address",
        json!({
            "type": "object",
            "properties": {
                "email": {"type": "string", "description": "The email address of this user"},
                "name": {"type": "string", "description": "The user's name, if provided"},
                "notes": {"type": "string", "description": "Additional contextual notes from the chat"}
            },
            "required": ["email"],
            "additionalProperties": false
        }),
    )
}

fn record_unknown_question_tool() -> Tool {
    Tool::new(
        "record_unknown_question",
        "Always use this tool to record any question that couldn't be answered",
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string", "description": "The question that couldn't be answered"}
            },
            "required": ["question"],
            "additionalProperties": false
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{EXHAUSTED_REPLY, MAX_TOOL_ROUNDS};
    use crate::models::message::Message;
    use crate::models::tool::ToolCall;
    use crate::providers::mock::MockProvider;
    use futures::TryStreamExt;

    fn persona() -> Persona {
        Persona::new(
            "Ada Lovelace",
            "Pioneer of computing.",
            "Worked with Charles Babbage on the Analytical Engine.",
        )
    }

    #[test]
    fn test_system_prompt_folds_documents_verbatim() {
        let prompt = persona().system_prompt();
        assert!(prompt.starts_with("You are acting as Ada Lovelace."));
        assert!(prompt.contains("## Summary\nPioneer of computing."));
        assert!(prompt.contains("## Profile\nWorked with Charles Babbage"));
        assert!(prompt.ends_with("Stay strictly in character as Ada Lovelace."));
    }

    #[test]
    fn test_system_prompt_skips_empty_documents() {
        let prompt = Persona::new("Ada Lovelace", "", "").system_prompt();
        assert!(!prompt.contains("## Summary"));
        assert!(!prompt.contains("## Profile"));
    }

    #[tokio::test]
    async fn test_agent_records_user_details() -> Result<()> {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new(
                    "record_user_details",
                    json!({"email": "ada@example.com"}),
                )),
            ),
            Message::assistant().with_text("Thanks, I have your email."),
        ]);
        let agent = persona().into_agent(Arc::new(provider), Arc::new(Notifier::disabled()))?;

        let mut stream = agent.reply(&[Message::user().with_text("Reach me at ada@example.com")]).await?;
        let mut messages = Vec::new();
        while let Some(message) = stream.try_next().await? {
            messages.push(message);
        }

        assert_eq!(messages.len(), 3);
        let response = messages[1].content[0].as_tool_response().unwrap();
        assert_eq!(response.tool_result, Ok(json!({"recorded": "ok"})));
        Ok(())
    }

    #[tokio::test]
    async fn test_agent_turn_is_bounded() -> Result<()> {
        let responses: Vec<Message> = (0..MAX_TOOL_ROUNDS * 2)
            .map(|i| {
                Message::assistant().with_tool_request(
                    i.to_string(),
                    Ok(ToolCall::new(
                        "record_unknown_question",
                        json!({"question": "again?"}),
                    )),
                )
            })
            .collect();
        let provider = MockProvider::new(responses);
        let agent =
            persona().into_agent(Arc::new(provider.clone()), Arc::new(Notifier::disabled()))?;

        let mut stream = agent.reply(&[Message::user().with_text("Hi")]).await?;
        let mut last = None;
        while let Some(message) = stream.try_next().await? {
            last = Some(message);
        }

        assert_eq!(provider.complete_calls(), MAX_TOOL_ROUNDS);
        assert_eq!(last.unwrap().text(), EXHAUSTED_REPLY);
        Ok(())
    }
}
