/*!
 * Core translation service implementation.
 *
 * This module contains the `TranslationService`, which turns one encoded batch
 * into one chat-completion call, together with the run configuration it is
 * built from and the token accounting shared by a run.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use url::Url;

use crate::errors::{ProviderError, TranslationError};
use crate::providers::ChatProvider;
use crate::providers::openai::{DEFAULT_OPENAI_ENDPOINT, OpenAI, OpenAIRequest, TokenUsage};

use super::codec::BatchPayload;

/// Default lines per batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of batches in flight
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default sampling temperature; kept low so replies stick to the line grammar
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Token usage statistics for tracking API consumption
#[derive(Debug, Clone)]
pub struct TokenUsageStats {
    /// Number of prompt tokens
    pub prompt_tokens: u64,

    /// Number of completion tokens
    pub completion_tokens: u64,

    /// Total number of tokens
    pub total_tokens: u64,

    /// Start time of token tracking
    pub start_time: Instant,

    /// Total time spent on API requests
    pub api_duration: Duration,

    /// Number of requests that reported usage
    pub requests: u64,

    /// Model name
    pub model: String,
}

impl Default for TokenUsageStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenUsageStats {
    /// Create a new empty token usage stats instance
    pub fn new() -> Self {
        Self::with_model(String::new())
    }

    /// Create new token usage stats for a model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            start_time: Instant::now(),
            api_duration: Duration::from_secs(0),
            requests: 0,
            model: model.into(),
        }
    }

    /// Add raw token counts
    pub fn add_token_usage(&mut self, prompt_tokens: Option<u64>, completion_tokens: Option<u64>) {
        if let Some(pt) = prompt_tokens {
            self.prompt_tokens += pt;
            self.total_tokens += pt;
        }

        if let Some(ct) = completion_tokens {
            self.completion_tokens += ct;
            self.total_tokens += ct;
        }
    }

    /// Account for one completed request
    pub fn record(&mut self, usage: Option<&TokenUsage>, duration: Duration) {
        self.api_duration += duration;
        if let Some(usage) = usage {
            self.add_token_usage(Some(usage.prompt_tokens), Some(usage.completion_tokens));
            self.requests += 1;
        }
    }

    /// Calculate tokens per minute rate
    pub fn tokens_per_minute(&self) -> f64 {
        // API time first, wall clock as fallback
        let duration_minutes = if self.api_duration.as_secs_f64() > 0.0 {
            self.api_duration.as_secs_f64() / 60.0
        } else {
            self.start_time.elapsed().as_secs_f64() / 60.0
        };

        if duration_minutes > 0.0 {
            self.total_tokens as f64 / duration_minutes
        } else {
            0.0
        }
    }

    /// Generate a summary of token usage
    pub fn summary(&self) -> String {
        let elapsed_minutes = self.start_time.elapsed().as_secs_f64() / 60.0;
        let api_minutes = self.api_duration.as_secs_f64() / 60.0;

        format!(
            "Token Usage Summary:\n\
             Model: {}\n\
             Prompt tokens: {}\n\
             Completion tokens: {}\n\
             Total tokens: {}\n\
             Elapsed time: {:.2} minutes\n\
             API request time: {:.2} minutes\n\
             Tokens per minute: {:.2}",
            self.model,
            self.prompt_tokens,
            self.completion_tokens,
            self.total_tokens,
            elapsed_minutes,
            api_minutes,
            self.tokens_per_minute()
        )
    }
}

/// Settings captured when a run starts
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum units per batch
    pub batch_size: usize,

    /// Maximum batches in flight
    pub concurrency: usize,

    /// System message sent with every batch
    pub guide_prompt: String,

    /// Model identifier sent to the endpoint
    pub model_id: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Base URL of the chat-completion API
    pub endpoint: String,

    /// Bearer token
    pub api_key: String,

    /// Per-request timeout
    pub timeout: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            guide_prompt: String::new(),
            model_id: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            api_key: String::new(),
            timeout: None,
        }
    }
}

impl RunConfig {
    /// Reject settings no run could work with
    pub fn validate(&self) -> Result<(), TranslationError> {
        if self.batch_size == 0 {
            return Err(TranslationError::InvalidConfig("batch size must be greater than 0".to_string()));
        }
        if self.concurrency == 0 {
            return Err(TranslationError::InvalidConfig("concurrency must be greater than 0".to_string()));
        }
        if self.guide_prompt.trim().is_empty() {
            return Err(TranslationError::InvalidConfig("guide prompt cannot be empty".to_string()));
        }
        if self.model_id.trim().is_empty() {
            return Err(TranslationError::InvalidConfig("model cannot be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TranslationError::InvalidConfig(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(TranslationError::InvalidConfig("API key is missing".to_string()));
        }
        Self::check_endpoint(&self.endpoint)
    }

    fn check_endpoint(endpoint: &str) -> Result<(), TranslationError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(TranslationError::InvalidConfig("endpoint is missing".to_string()));
        }

        let url = Url::parse(endpoint)
            .map_err(|e| TranslationError::InvalidConfig(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(()),
            _ => Err(TranslationError::InvalidConfig(format!(
                "endpoint '{}' must be an http(s) URL",
                endpoint
            ))),
        }
    }
}

/// Reply text of one completion call plus its accounting
#[derive(Debug, Clone)]
pub struct CompletionReply {
    /// Text of the first choice
    pub text: String,

    /// Usage, when the endpoint reports it
    pub usage: Option<TokenUsage>,

    /// Wall time of the call
    pub duration: Duration,
}

/// Sends encoded batches to a chat-completion provider
pub struct TranslationService<P: ChatProvider> {
    provider: Arc<P>,
    config: RunConfig,
}

impl<P: ChatProvider> Clone for TranslationService<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
        }
    }
}

impl<P: ChatProvider> std::fmt::Debug for TranslationService<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationService")
            .field("provider", &self.provider)
            .field("config", &self.config)
            .finish()
    }
}

impl<P: ChatProvider> TranslationService<P> {
    /// Create a service after validating the run configuration
    pub fn new(provider: P, config: RunConfig) -> Result<Self, TranslationError> {
        config.validate()?;
        Ok(Self {
            provider: Arc::new(provider),
            config,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Send one batch: guide as system message, payload as user message
    pub async fn translate_payload(&self, payload: &BatchPayload) -> Result<CompletionReply, ProviderError> {
        let start_time = Instant::now();
        let request = OpenAIRequest::new(&self.config.model_id)
            .add_message("system", &payload.system)
            .add_message("user", &payload.user)
            .temperature(self.config.temperature);

        let response = self.provider.complete(request).await?;
        let duration = start_time.elapsed();
        debug!("Completion received in {:?}", duration);

        Ok(CompletionReply {
            text: P::extract_text(&response),
            usage: response.usage,
            duration,
        })
    }

    /// Send a minimal request to check endpoint, key and model
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        self.provider.test_connection(&self.config.model_id).await
    }
}

impl TranslationService<OpenAI> {
    /// Build a service talking to the configured OpenAI-compatible endpoint
    pub fn from_run_config(config: RunConfig) -> Result<Self, TranslationError> {
        config.validate()?;
        let client = OpenAI::new_with_config(config.api_key.clone(), config.endpoint.clone(), config.timeout);
        Self::new(client, config)
    }
}
