/*!
 * Background run driver.
 *
 * A `TranslationJob` takes the store's run lease, snapshots the pending units
 * and drives a `BatchTranslator` on its own tokio task. The caller watches the
 * run through the event receiver and may request a cooperative stop.
 */

use anyhow::{Context, Result};
use log::info;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::errors::TranslationError;
use crate::providers::ChatProvider;

use super::batch::{BatchTranslator, RunReport, TranslationEvent};
use super::cancel::CancellationFlag;
use super::core::TranslationService;
use super::store::SubtitleStore;

/// Handle to a running translation
pub struct TranslationJob {
    events: UnboundedReceiver<TranslationEvent>,
    handle: JoinHandle<RunReport>,
    cancel: CancellationFlag,
}

impl TranslationJob {
    /// Start a run against the store.
    ///
    /// Fails with `RunInProgress` before anything is spawned when another run
    /// holds the store. Must be called from within a tokio runtime.
    pub fn spawn<P>(
        service: TranslationService<P>,
        store: SubtitleStore,
        cancel: CancellationFlag,
    ) -> Result<Self, TranslationError>
    where
        P: ChatProvider + 'static,
    {
        let lease = store.try_begin_run()?;
        let pending = store.select_pending();
        info!("Starting translation run: {} of {} lines pending", pending.len(), store.len());

        let (sender, events) = mpsc::unbounded_channel();
        let translator = BatchTranslator::new(service);
        let run_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let report = translator.run(pending, &store, &run_cancel, &sender).await;
            drop(lease);
            report
        });

        Ok(Self { events, handle, cancel })
    }

    /// Next event, or None once the run has ended and the channel drained
    pub async fn next_event(&mut self) -> Option<TranslationEvent> {
        self.events.recv().await
    }

    /// Ask the run to stop after the batches already in flight
    pub fn request_stop(&self) {
        self.cancel.request_stop();
    }

    /// The stop flag this run watches
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Wait for the run to end. The store accepts a new run once this returns.
    pub async fn wait(self) -> Result<RunReport> {
        self.handle.await.context("Translation task did not finish")
    }

    /// Drain every event, then wait for the report
    pub async fn collect(mut self) -> Result<(Vec<TranslationEvent>, RunReport)> {
        let mut received = Vec::new();
        while let Some(event) = self.events.recv().await {
            received.push(event);
        }
        let report = self.wait().await?;
        Ok((received, report))
    }
}
