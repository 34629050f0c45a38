/*!
 * Batch translation of subtitle units through a chat-completion provider.
 *
 * This module contains the translation pipeline. It is split into several submodules:
 *
 * - `codec`: wire format of batch requests and replies
 * - `store`: the shared unit table, merges and exports
 * - `cancel`: cooperative stop flag
 * - `core`: run configuration, token accounting and the provider-backed service
 * - `batch`: partitioning, concurrent dispatch and result merging
 * - `job`: background task driving a run
 */

// Re-export main types for easier usage
pub use self::batch::{Batch, BatchResult, BatchTranslator, RunOutcome, RunReport, TranslationEvent, partition};
pub use self::cancel::CancellationFlag;
pub use self::codec::{BatchCodec, BatchPayload, TranslationMap};
pub use self::core::{RunConfig, TokenUsageStats, TranslationService};
pub use self::job::TranslationJob;
pub use self::store::{RunLease, SubtitleStore, TABULAR_HEADER};

// Submodules
pub mod batch;
pub mod cancel;
pub mod codec;
pub mod core;
pub mod job;
pub mod store;
