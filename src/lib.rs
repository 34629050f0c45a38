/*!
 * # subbatch - subtitle batch translation over a chat-completion endpoint
 *
 * A Rust library that translates subtitles by sending them, batch by batch,
 * to an OpenAI-compatible chat-completion API.
 *
 * ## Features
 *
 * - Tolerant parsing of SubRip text and tab/comma separated `index, text` tables
 * - One request per batch with a strict `index: text` reply grammar
 * - Bounded concurrency with results merged as they complete
 * - Cooperative stop that keeps every batch already translated
 * - SRT and tab-separated exports
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: Parsing raw text into translation units
 * - `translation`: The batch pipeline:
 *   - `translation::codec`: Wire format of requests and replies
 *   - `translation::store`: Shared unit table, merges and exports
 *   - `translation::batch`: Partitioning, dispatch and merging
 *   - `translation::job`: Background run driver
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `providers`: Chat-completion clients:
 *   - `providers::openai`: OpenAI-compatible API client
 *   - `providers::mock`: In-memory provider for tests
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod file_utils;
pub mod subtitle_processor;
pub mod translation;
pub mod app_controller;
pub mod providers;
pub mod errors;

// Re-export main types for easier usage
pub use app_config::Config;
pub use subtitle_processor::{ParsedSubtitles, SubtitleFormat, SubtitleParser, TranslationUnit};
pub use translation::{CancellationFlag, SubtitleStore, TranslationEvent, TranslationJob, TranslationService};
pub use errors::{ProviderError, TranslationError};
