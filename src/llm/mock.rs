//! Mock LLM client for testing.
//!
//! Provides deterministic responses based on input patterns.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{AskError, Result};
use crate::llm::types::{last_user_content, Message};
use crate::llm::LlmClient;

/// Mock LLM client that returns canned responses based on input patterns.
///
/// Patterns are matched case-insensitively against the last user message;
/// the first matching pattern wins.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    /// Response when no pattern matches.
    fallback: Option<String>,
    /// Answer every request with no content.
    empty: bool,
    /// Fail every request with this error.
    failure: Option<AskError>,
    /// Artificial latency per request.
    delay: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    /// Creates a new mock client with the built-in cluster responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the question contains `pattern`, the mock will return `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Returns `response` for every question that matches no pattern.
    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(response.into());
        self
    }

    /// Makes every request come back without content.
    pub fn empty() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    /// Makes every request fail with `error`.
    pub fn failing(error: AskError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Delays every request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of completion requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Message lists received, in call order.
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    /// Generates a mock response based on the input.
    fn mock_response(&self, input: &str) -> Option<String> {
        let input_lower = input.to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return Some(response.clone());
            }
        }

        if let Some(fallback) = &self.fallback {
            return Some(fallback.clone());
        }

        let sql = if input_lower.contains("node") && input_lower.contains("price") {
            "SELECT idx, labels, price_per_hour FROM klustercost.tbl_nodes ORDER BY price_per_hour DESC NULLS LAST"
        } else if input_lower.contains("node") {
            "SELECT * FROM klustercost.tbl_nodes"
        } else if input_lower.contains("service") {
            "SELECT service_name, namespace, app_label FROM klustercost.tbl_services"
        } else if input_lower.contains("owner") || input_lower.contains("workload") {
            "SELECT name, namespace, own_kind FROM klustercost.tbl_owners"
        } else {
            "REFUSE"
        };

        Some(sql.to_string())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages.to_vec());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.empty {
            return Ok(None);
        }

        Ok(self.mock_response(last_user_content(messages)))
    }
}
