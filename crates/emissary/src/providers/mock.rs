use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{OutputSchema, Provider, Usage};

/// A mock provider that returns pre-configured responses for testing.
/// Clones share the same response queues and call counter.
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
    structured_responses: Arc<Mutex<Vec<Value>>>,
    complete_calls: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of completion responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            structured_responses: Arc::new(Mutex::new(Vec::new())),
            complete_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a sequence of structured completion responses
    pub fn with_structured(self, structured: Vec<Value>) -> Self {
        *self.structured_responses.lock().unwrap() = structured;
        self
    }

    /// Number of times complete() has been called
    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok((Message::assistant().with_text(""), Usage::default()))
        } else {
            Ok((responses.remove(0), Usage::default()))
        }
    }

    async fn complete_structured(
        &self,
        _system: &str,
        _messages: &[Message],
        _schema: &OutputSchema,
    ) -> Result<(Value, Usage)> {
        let mut structured = self.structured_responses.lock().unwrap();
        if structured.is_empty() {
            Err(anyhow!("No more pre-configured structured responses"))
        } else {
            Ok((structured.remove(0), Usage::default()))
        }
    }
}
