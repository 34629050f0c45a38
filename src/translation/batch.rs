/*!
 * Batch translation processing.
 *
 * Pending units are cut into batches, each batch becomes exactly one
 * chat-completion call, and results are merged into the store in the order
 * they complete. Progress and diagnostics leave the run as `TranslationEvent`s.
 */

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::errors::TranslationError;
use crate::providers::ChatProvider;
use crate::providers::openai::TokenUsage;
use crate::subtitle_processor::TranslationUnit;

use super::cancel::CancellationFlag;
use super::codec::{BatchCodec, TranslationMap};
use super::core::{TokenUsageStats, TranslationService};
use super::store::SubtitleStore;

/// Message sent from a run to whoever displays it
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationEvent {
    /// Short status line
    Status(String),
    /// Log line, including raw replies of failed batches
    Log(String),
    /// Translations just merged into the store
    Merge(TranslationMap),
    /// Batches merged so far out of the batches submitted
    Progress { completed: usize, total: usize },
    /// Every batch was merged
    Done,
    /// A stop was requested; completed batches were kept
    Stopped,
    /// The run was aborted
    Error(String),
}

impl TranslationEvent {
    /// Whether this event ends the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Stopped | Self::Error(_))
    }
}

/// Consecutive slice of pending units
#[derive(Debug, Clone)]
pub struct Batch {
    /// 1-based batch number
    pub number: usize,
    pub units: Vec<TranslationUnit>,
}

impl Batch {
    /// First and last unit index, if the batch has any units
    pub fn range(&self) -> Option<(u64, u64)> {
        match (self.units.first(), self.units.last()) {
            (Some(first), Some(last)) => Some((first.index, last.index)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Sort units by index and cut them into batches of at most `batch_size`
pub fn partition(mut pending: Vec<TranslationUnit>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    pending.sort_by_key(|unit| unit.index);

    pending
        .chunks(batch_size)
        .enumerate()
        .map(|(i, chunk)| Batch {
            number: i + 1,
            units: chunk.to_vec(),
        })
        .collect()
}

/// What a worker hands back for one batch
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// First and last index, None when the batch was skipped
    pub range: Option<(u64, u64)>,

    /// Decoded translations restricted to this batch's indices
    pub mapping: TranslationMap,

    /// Reply text as received
    pub raw_reply: String,

    /// True when the worker made no call
    pub skipped: bool,

    /// Token usage reported for the call
    pub usage: Option<TokenUsage>,

    /// Time spent in the call
    pub duration: Duration,
}

impl BatchResult {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Stopped,
    Failed(String),
}

/// Summary returned when a run ends
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,

    /// Batches submitted
    pub batches_total: usize,

    /// Batches whose translations were merged
    pub batches_completed: usize,

    /// Units updated by merges
    pub units_translated: usize,

    pub token_usage: TokenUsageStats,
}

fn emit(events: &UnboundedSender<TranslationEvent>, event: TranslationEvent) {
    // A dropped receiver only means nobody is watching
    let _ = events.send(event);
}

/// Batch translator for processing subtitle units in batches
pub struct BatchTranslator<P: ChatProvider> {
    /// The translation service to use
    service: TranslationService<P>,
}

impl<P: ChatProvider> BatchTranslator<P> {
    /// Create a new batch translator
    pub fn new(service: TranslationService<P>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &TranslationService<P> {
        &self.service
    }

    /// Translate the pending units and merge the results into the store.
    ///
    /// Always ends by emitting exactly one of `Done`, `Stopped` or `Error`.
    pub async fn run(
        &self,
        pending: Vec<TranslationUnit>,
        store: &SubtitleStore,
        cancel: &CancellationFlag,
        events: &UnboundedSender<TranslationEvent>,
    ) -> RunReport {
        let config = self.service.config();
        let mut report = RunReport {
            outcome: RunOutcome::Completed,
            batches_total: 0,
            batches_completed: 0,
            units_translated: 0,
            token_usage: TokenUsageStats::with_model(config.model_id.clone()),
        };

        if pending.is_empty() {
            emit(events, TranslationEvent::Log("Nothing to translate: every line already has a translation.".to_string()));
            emit(events, TranslationEvent::Done);
            return report;
        }

        let pending_count = pending.len();
        let batches = partition(pending, config.batch_size);
        let total = batches.len();
        report.batches_total = total;

        info!(
            "Translating {} lines in {} batches ({} concurrent)",
            pending_count, total, config.concurrency
        );
        emit(events, TranslationEvent::Status(format!(
            "Translating {} lines in {} batches...",
            pending_count, total
        )));

        // Set on the first fatal result; workers that have not started yet skip their call
        let abort = Arc::new(AtomicBool::new(false));
        let mut failure: Option<String> = None;

        let mut results = stream::iter(batches)
            .map(|batch| {
                let service = self.service.clone();
                let cancel = cancel.clone();
                let abort = Arc::clone(&abort);
                async move { Self::process_batch(service, batch, cancel, abort).await }
            })
            .buffer_unordered(config.concurrency);

        while let Some((number, result)) = results.next().await {
            let batch_result = match result {
                Ok(batch_result) if batch_result.skipped => {
                    debug!("Batch {} skipped", number);
                    continue;
                }
                Ok(batch_result) => batch_result,
                Err(e) => {
                    if failure.is_none() {
                        let message = format!("Batch {} failed: {}", number, e);
                        error!("{}", message);
                        emit(events, TranslationEvent::Log(message.clone()));
                        abort.store(true, Ordering::SeqCst);
                        failure = Some(message);
                    } else {
                        debug!("Discarding failure of batch {} after abort: {}", number, e);
                    }
                    continue;
                }
            };

            report.token_usage.record(batch_result.usage.as_ref(), batch_result.duration);

            if failure.is_some() {
                debug!("Discarding batch {} result after abort", number);
                continue;
            }

            let (first, last) = batch_result.range.unwrap_or_default();
            if batch_result.mapping.is_empty() {
                let e = TranslationError::MalformedBatch {
                    first,
                    last,
                    raw_reply: batch_result.raw_reply.clone(),
                };
                error!("{}", e);
                emit(events, TranslationEvent::Log(format!(
                    "Batch {}..{} reply had no 'index: text' line. Raw reply:\n{}",
                    first, last, batch_result.raw_reply
                )));
                emit(events, TranslationEvent::Log(e.to_string()));
                abort.store(true, Ordering::SeqCst);
                failure = Some(e.to_string());
                continue;
            }

            let applied = store.merge(&batch_result.mapping);
            report.units_translated += applied;
            report.batches_completed += 1;
            let completed = report.batches_completed;

            emit(events, TranslationEvent::Merge(batch_result.mapping.clone()));
            emit(events, TranslationEvent::Log(format!(
                "Batch OK {}..{} (parsed {} lines) [{}/{}]",
                first,
                last,
                batch_result.mapping.len(),
                completed,
                total
            )));
            emit(events, TranslationEvent::Progress { completed, total });
            emit(events, TranslationEvent::Status(format!("Translated {}/{} batches", completed, total)));
        }

        // A fatal batch outranks a stop request
        if let Some(message) = failure {
            emit(events, TranslationEvent::Error(message.clone()));
            report.outcome = RunOutcome::Failed(message);
        } else if cancel.is_stop_requested() {
            let message = format!(
                "Stopped. Kept {} completed batches ({} lines translated).",
                report.batches_completed, report.units_translated
            );
            warn!("{}", message);
            emit(events, TranslationEvent::Log(message));
            emit(events, TranslationEvent::Stopped);
            report.outcome = RunOutcome::Stopped;
        } else {
            emit(events, TranslationEvent::Log(format!("All {} batches translated.", total)));
            emit(events, TranslationEvent::Done);
        }

        report
    }

    /// One batch, at most one remote call
    async fn process_batch(
        service: TranslationService<P>,
        batch: Batch,
        cancel: CancellationFlag,
        abort: Arc<AtomicBool>,
    ) -> (usize, Result<BatchResult, TranslationError>) {
        let number = batch.number;
        if cancel.is_stop_requested() || abort.load(Ordering::SeqCst) {
            return (number, Ok(BatchResult::skipped()));
        }

        debug!("Sending batch {} ({} lines)", number, batch.len());
        let payload = BatchCodec::encode(&batch.units, &service.config().guide_prompt);
        let reply = match service.translate_payload(&payload).await {
            Ok(reply) => reply,
            Err(e) => return (number, Err(e.into())),
        };

        let batch_indices: HashSet<u64> = batch.units.iter().map(|unit| unit.index).collect();
        let mapping: TranslationMap = BatchCodec::decode(&reply.text)
            .into_iter()
            .filter(|(index, _)| batch_indices.contains(index))
            .collect();

        (number, Ok(BatchResult {
            range: batch.range(),
            mapping,
            raw_reply: reply.text,
            skipped: false,
            usage: reply.usage,
            duration: reply.duration,
        }))
    }
}
