use std::env;
use std::sync::Arc;

use anyhow::Result;
use futures::TryStreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::writer::Report;
use crate::agent::Agent;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::Provider;
use crate::registry::ToolRegistry;

pub const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

const INSTRUCTIONS: &str =
    "You are able to send a nicely formatted HTML email based on a detailed report. You will be \
     provided with a detailed report. You should use your tool to send one email, providing the \
     report converted into clean, well presented HTML with an appropriate subject line.";

/// SendGrid mail collaborator. Missing credentials no-op; a transport
/// failure is reported back to the calling agent as a tool error.
pub struct Mailer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
    to: String,
}

impl Mailer {
    pub fn new(endpoint: String, api_key: Option<String>, from: String, to: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
            from,
            to,
        }
    }

    /// Read SENDGRID_API_KEY, SENDGRID_FROM and SENDGRID_TO from the
    /// environment. A missing key leaves the mailer disabled.
    pub fn from_env() -> Self {
        Self::new(
            SENDGRID_ENDPOINT.to_string(),
            env::var("SENDGRID_API_KEY").ok(),
            env::var("SENDGRID_FROM").unwrap_or_default(),
            env::var("SENDGRID_TO").unwrap_or_default(),
        )
    }

    /// A mailer that always no-ops
    pub fn disabled() -> Self {
        Self::new(SENDGRID_ENDPOINT.to_string(), None, String::new(), String::new())
    }

    pub async fn send(&self, subject: &str, html_body: &str) -> AgentResult<Value> {
        let Some(api_key) = &self.api_key else {
            warn!("sendgrid credentials missing, skipping email");
            return Ok(json!({"status": "skipped"}));
        };

        let payload = json!({
            "personalizations": [{"to": [{"email": self.to}]}],
            "from": {"email": self.from},
            "subject": subject,
            "content": [{"type": "text/html", "value": html_body}]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;

        info!(status = %response.status(), "email response");
        Ok(json!({"status": response.status().as_u16()}))
    }
}

fn send_email_tool() -> Tool {
    Tool::new(
        "send_email",
        "Send an HTML email with the given subject and body",
        json!({
            "type": "object",
            "properties": {
                "subject": {"type": "string", "description": "The email subject line"},
                "html_body": {"type": "string", "description": "The email body in HTML format"}
            },
            "required": ["subject", "html_body"],
            "additionalProperties": false
        }),
    )
}

/// Hand the report to a tool-calling agent that formats it as HTML and
/// sends exactly one email through the mailer.
pub async fn send_report(
    provider: Arc<dyn Provider>,
    mailer: Arc<Mailer>,
    report: &Report,
) -> Result<()> {
    let mut registry = ToolRegistry::new();
    registry.register(send_email_tool(), move |arguments: Value| {
        let mailer = mailer.clone();
        async move {
            let subject = arguments
                .get("subject")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let html_body = arguments
                .get("html_body")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            mailer.send(&subject, &html_body).await
        }
    })?;

    let agent = Agent::new(provider, registry, INSTRUCTIONS);
    let messages = vec![Message::user().with_text(report.markdown_report.clone())];

    let mut stream = agent.reply(&messages).await?;
    while let Some(message) = stream.try_next().await? {
        debug!(role = ?message.role, "email agent message");
    }

    info!("email sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ToolCall;
    use crate::providers::mock::MockProvider;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn report() -> Report {
        Report {
            short_summary: "Short.".to_string(),
            markdown_report: "# Findings\nDetails.".to_string(),
            follow_up_questions: vec![],
        }
    }

    #[tokio::test]
    async fn test_send_report_drives_the_email_tool() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(header("authorization", "Bearer key"))
            .and(body_string_contains("Findings"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mailer = Arc::new(Mailer::new(
            format!("{}/v3/mail/send", mock_server.uri()),
            Some("key".to_string()),
            "from@example.com".to_string(),
            "to@example.com".to_string(),
        ));

        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new(
                    "send_email",
                    json!({"subject": "Research findings", "html_body": "<h1>Findings</h1>Details."}),
                )),
            ),
            Message::assistant().with_text("Sent."),
        ]));

        send_report(provider, mailer, &report()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_send_report_without_credentials_is_a_no_op() -> Result<()> {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new(
                    "send_email",
                    json!({"subject": "s", "html_body": "b"}),
                )),
            ),
            Message::assistant().with_text("Sent."),
        ]));

        send_report(provider, Arc::new(Mailer::disabled()), &report()).await?;
        Ok(())
    }
}
