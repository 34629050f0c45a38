/*!
 * Error types for the subbatch application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when talking to the chat-completion endpoint
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Errors that can occur while preparing or running a translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// The run configuration was rejected before anything started
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Another run already holds the subtitle table
    #[error("A translation run is already active for this subtitle set")]
    RunInProgress,

    /// The model reply for a batch contained no usable `index: text` line
    #[error("Model output for batch {first}..{last} could not be parsed; tighten the prompt or reduce the batch size or concurrency")]
    MalformedBatch {
        /// First index of the batch
        first: u64,
        /// Last index of the batch
        last: u64,
        /// The raw reply text, kept for diagnosis
        raw_reply: String,
    },

    /// Error from the provider API
    #[error("Batch request failed: {0}")]
    Provider(#[from] ProviderError),

    /// Nothing could be parsed from the input
    #[error("No valid subtitle data found")]
    NoSubtitles,
}
