/*!
 * Mock provider implementations for testing.
 *
 * `MockProvider` answers chat-completion requests without any network:
 * - `MockProvider::echo()` - replies `index: [T] source` for every batch line
 * - `MockProvider::garbled()` - replies text with no `index: text` line
 * - `MockProvider::failing()` - always fails with an API error
 *
 * Individual calls can be given their own behavior, and calls can be held
 * behind a semaphore so tests control when in-flight requests finish.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::errors::ProviderError;
use crate::providers::Provider;
use crate::providers::openai::{OpenAIChoice, OpenAIMessage, OpenAIRequest, OpenAIResponse, TokenUsage};

/// Prefix the echo behavior puts in front of each source line
pub const ECHO_PREFIX: &str = "[T] ";

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Answer every batch line in the expected grammar
    Echo,
    /// Answer with prose that has no `index: text` line
    Garbled,
    /// Fail with an API error
    Failing,
    /// Answer with an empty message
    Empty,
    /// Echo every line under its index plus this offset
    Shifted(u64),
}

/// Mock chat-completion provider
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Default behavior
    behavior: MockBehavior,
    /// Per-call overrides, keyed by 0-based call number
    overrides: HashMap<usize, MockBehavior>,
    /// Calls from this number on wait for a permit before answering
    gate: Option<(usize, Arc<Semaphore>)>,
    /// Artificial latency per call
    delay: Option<Duration>,
    /// Shared call counter
    request_count: Arc<AtomicUsize>,
    /// Every request received, in arrival order
    requests: Arc<Mutex<Vec<OpenAIRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            overrides: HashMap::new(),
            gate: None,
            delay: None,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    pub fn garbled() -> Self {
        Self::new(MockBehavior::Garbled)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Use a different behavior for one call
    pub fn with_call_behavior(mut self, call: usize, behavior: MockBehavior) -> Self {
        self.overrides.insert(call, behavior);
        self
    }

    /// Hold every call numbered `from_call` or later until the semaphore grants a permit
    pub fn with_gate_from(mut self, from_call: usize, gate: Arc<Semaphore>) -> Self {
        self.gate = Some((from_call, gate));
        self
    }

    /// Add latency to every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copy of the received requests
    pub fn requests(&self) -> Vec<OpenAIRequest> {
        self.requests.lock().clone()
    }

    /// Build the echo reply for a batch payload
    pub fn echo_reply(user_payload: &str) -> String {
        Self::shifted_reply(user_payload, 0)
    }

    /// Echo reply with every index moved by `offset`
    pub fn shifted_reply(user_payload: &str, offset: u64) -> String {
        user_payload
            .lines()
            .filter_map(|line| line.split_once('\t'))
            .filter_map(|(index, source)| index.parse::<u64>().ok().map(|index| (index, source)))
            .map(|(index, source)| format!("{}: {}{}", index.saturating_add(offset), ECHO_PREFIX, source))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn response(text: String, prompt_len: usize) -> OpenAIResponse {
        let completion_tokens = (text.len() / 4) as u64;
        let prompt_tokens = (prompt_len / 4) as u64;
        OpenAIResponse {
            choices: vec![OpenAIChoice {
                message: OpenAIMessage {
                    role: "assistant".to_string(),
                    content: text,
                },
            }],
            usage: Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    type Request = OpenAIRequest;
    type Response = OpenAIResponse;

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let call = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some((from_call, gate)) = &self.gate {
            if call >= *from_call {
                // A closed semaphore releases everyone
                let _permit = gate.acquire().await.ok();
            }
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let user_payload = request.message_content("user").unwrap_or_default();
        let behavior = self.overrides.get(&call).copied().unwrap_or(self.behavior);

        match behavior {
            MockBehavior::Echo => Ok(Self::response(Self::echo_reply(user_payload), user_payload.len())),
            MockBehavior::Garbled => Ok(Self::response(
                "Sorry, here is a summary of the dialogue instead.".to_string(),
                user_payload.len(),
            )),
            MockBehavior::Empty => Ok(Self::response(String::new(), user_payload.len())),
            MockBehavior::Shifted(offset) => Ok(Self::response(
                Self::shifted_reply(user_payload, offset),
                user_payload.len(),
            )),
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "Simulated server error".to_string(),
            }),
        }
    }

    async fn test_connection(&self, _model: &str) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated connection failure".to_string())),
            _ => Ok(()),
        }
    }

    fn extract_text(response: &Self::Response) -> String {
        response.choices.first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }
}
