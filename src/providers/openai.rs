use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use reqwest::{Client, StatusCode};
use log::{debug, error, warn};

use crate::errors::ProviderError;
use crate::providers::Provider;

/// Default public endpoint
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat-completion client
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key sent as a bearer token
    api_key: String,
    /// Base URL ending before `/chat/completions`
    endpoint: String,
}

impl std::fmt::Debug for OpenAI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAI")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<OpenAIMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message; a `null` content is read as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

/// Token usage information; gateways may leave out any of the counts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u64,
    /// Sum of both
    #[serde(default)]
    pub total_tokens: u64,
}

/// One completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChoice {
    /// The generated message
    pub message: OpenAIMessage,
}

/// Chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIResponse {
    /// Generated choices, the first one is used
    pub choices: Vec<OpenAIChoice>,
    /// Token usage, when the endpoint reports it in a readable shape
    #[serde(default, deserialize_with = "lenient_usage")]
    pub usage: Option<TokenUsage>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// Usage is accounting only; an unreadable block must not fail the completion
fn lenient_usage<'de, D>(deserializer: D) -> Result<Option<TokenUsage>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match serde_json::from_value::<TokenUsage>(value) {
        Ok(usage) => Some(usage),
        Err(e) => {
            debug!("Ignoring unreadable usage block: {}", e);
            None
        }
    }))
}

impl Default for OpenAIRequest {
    fn default() -> Self {
        Self {
            model: String::new(),
            messages: Vec::new(),
            temperature: None,
        }
    }
}

impl OpenAIRequest {
    /// Create a new request for a model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(OpenAIMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Model this request addresses
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Messages in send order
    pub fn messages(&self) -> &[OpenAIMessage] {
        &self.messages
    }

    /// Content of the last message with the given role
    pub fn message_content(&self, role: &str) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == role)
            .map(|message| message.content.as_str())
    }

    pub fn get_temperature(&self) -> Option<f32> {
        self.temperature
    }
}

impl OpenAI {
    /// Create a client without a request timeout
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::new_with_config(api_key, endpoint, None)
    }

    /// Create a client, optionally bounding each request
    pub fn new_with_config(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        let mut builder = Client::builder()
            // Keep connections alive across concurrent batches
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = match builder.build() {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build HTTP client ({}), falling back to defaults without timeout", e);
                Client::new()
            }
        };

        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    fn completions_url(&self) -> String {
        let base = if self.endpoint.trim().is_empty() {
            DEFAULT_OPENAI_ENDPOINT
        } else {
            self.endpoint.trim()
        };
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    /// Send a chat completion request
    pub async fn chat(&self, request: &OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        let url = self.completions_url();
        debug!("POST {} (model {}, {} messages)", url, request.model, request.messages.len());

        let response = self.client.post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::ConnectionError(e.to_string())
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Chat completion API error ({}): {}", status, error_text);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ProviderError::AuthenticationError(error_text)
                }
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(error_text),
                _ => ProviderError::ApiError {
                    status_code: status.as_u16(),
                    message: error_text,
                },
            });
        }

        response.json::<OpenAIResponse>().await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Text of the first choice, empty when there is none
    pub fn extract_text_from_response(response: &OpenAIResponse) -> String {
        response.choices.first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for OpenAI {
    type Request = OpenAIRequest;
    type Response = OpenAIResponse;

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        self.chat(&request).await
    }

    async fn test_connection(&self, model: &str) -> Result<(), ProviderError> {
        let request = OpenAIRequest::new(model)
            .add_message("user", "ping")
            .temperature(0.0);
        self.chat(&request).await?;
        Ok(())
    }

    fn extract_text(response: &Self::Response) -> String {
        Self::extract_text_from_response(response)
    }
}
