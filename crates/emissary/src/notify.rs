use std::env;
use std::time::Duration;

use reqwest::Client;
use tracing::warn;

pub const PUSHOVER_ENDPOINT: &str = "https://api.pushover.net/1/messages.json";

/// Pushover notification collaborator. Missing credentials or transport
/// failures never surface to the caller; a skipped or failed push is logged
/// and swallowed.
pub struct Notifier {
    client: Client,
    endpoint: String,
    token: Option<String>,
    user: Option<String>,
}

impl Notifier {
    pub fn new(endpoint: String, token: Option<String>, user: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            token,
            user,
        }
    }

    /// Read PUSHOVER_TOKEN and PUSHOVER_USER from the environment. Either
    /// missing leaves the notifier disabled.
    pub fn from_env() -> Self {
        Self::new(
            PUSHOVER_ENDPOINT.to_string(),
            env::var("PUSHOVER_TOKEN").ok(),
            env::var("PUSHOVER_USER").ok(),
        )
    }

    /// A notifier that always no-ops
    pub fn disabled() -> Self {
        Self::new(PUSHOVER_ENDPOINT.to_string(), None, None)
    }

    pub async fn push(&self, text: &str) {
        let (Some(token), Some(user)) = (&self.token, &self.user) else {
            warn!("pushover credentials missing, skipping notification");
            return;
        };

        let form = [
            ("token", token.as_str()),
            ("user", user.as_str()),
            ("message", text),
        ];

        let result = self
            .client
            .post(&self.endpoint)
            .timeout(Duration::from_secs(5))
            .form(&form)
            .send()
            .await;

        if let Err(e) = result {
            warn!(error = %e, "notification failed");
        }
    }
}
