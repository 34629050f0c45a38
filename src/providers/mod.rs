/*!
 * Provider implementations for the chat-completion endpoint.
 *
 * - `openai`: OpenAI-compatible `/chat/completions` client, which also covers
 *   self-hosted gateways exposing the same API
 * - `mock`: scriptable in-memory provider for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

use self::openai::{OpenAIRequest, OpenAIResponse};

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably in the translation service.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<Self::Response, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Test the connection to the provider with a minimal request
    ///
    /// # Arguments
    /// * `model` - Model identifier to address
    async fn test_connection(&self, model: &str) -> Result<(), ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// Providers that speak the chat-completion request/response shapes
pub trait ChatProvider: Provider<Request = OpenAIRequest, Response = OpenAIResponse> {}

impl<T> ChatProvider for T where T: Provider<Request = OpenAIRequest, Response = OpenAIResponse> {}

pub mod openai;
pub mod mock;
