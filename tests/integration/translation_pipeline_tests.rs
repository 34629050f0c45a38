/*!
 * Scheduler behaviour against the mock provider
 */

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use subbatch::errors::TranslationError;
use subbatch::providers::mock::{MockBehavior, MockProvider};
use subbatch::translation::{
    CancellationFlag, RunOutcome, SubtitleStore, TranslationEvent, TranslationJob, TranslationService,
};
use crate::common;

fn loaded_store(document: &str) -> SubtitleStore {
    common::init_test_logging();
    let store = SubtitleStore::new();
    store.load_text(document);
    store
}

/// Lines in the user message of every request the provider received, sorted
fn request_batch_sizes(provider: &MockProvider) -> Vec<usize> {
    let mut sizes: Vec<usize> = provider
        .requests()
        .iter()
        .map(|request| {
            request
                .message_content("user")
                .unwrap_or_default()
                .lines()
                .filter(|line| line.contains('\t'))
                .count()
        })
        .collect();
    sizes.sort_unstable();
    sizes
}

async fn wait_for_requests(provider: &MockProvider, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while provider.request_count() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("provider never received the expected requests");
}

#[tokio::test]
async fn test_run_withSeventeenLinesAndBatchFive_shouldSendFourDisjointBatches() {
    let store = loaded_store(&common::srt_document(17));
    let (service, provider) = common::mock_service(MockProvider::echo(), 5, 2);

    let job = TranslationJob::spawn(service, store.clone(), CancellationFlag::new()).unwrap();
    let (events, report) = job.collect().await.unwrap();

    assert_eq!(provider.request_count(), 4);
    assert_eq!(request_batch_sizes(&provider), vec![2, 5, 5, 5]);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.batches_total, 4);
    assert_eq!(report.units_translated, 17);
    assert_eq!(store.translated_count(), 17);
    assert_eq!(store.snapshot()[16].translated_text, "[T] Line number 17");

    assert_eq!(common::terminal_count(&events), 1);
    assert_eq!(events.last(), Some(&TranslationEvent::Done));
    let progress: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            TranslationEvent::Progress { completed, total: 4 } => Some(*completed),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_run_withMergedEvents_shouldCoverEveryIndexOnce() {
    let store = loaded_store(&common::tabular_document(9));
    let (service, _provider) = common::mock_service(MockProvider::echo(), 4, 3);

    let (events, _) = TranslationJob::spawn(service, store, CancellationFlag::new())
        .unwrap()
        .collect()
        .await
        .unwrap();

    let mut merged: Vec<u64> = events
        .iter()
        .filter_map(|event| match event {
            TranslationEvent::Merge(mapping) => Some(mapping.keys().copied().collect::<Vec<_>>()),
            _ => None,
        })
        .flatten()
        .collect();
    merged.sort_unstable();
    assert_eq!(merged, (1..=9).collect::<Vec<u64>>());

    let ok_lines = events
        .iter()
        .filter(|event| matches!(event, TranslationEvent::Log(line) if line.starts_with("Batch OK ")))
        .count();
    assert_eq!(ok_lines, 3);
}

#[tokio::test]
async fn test_rerun_withEverythingTranslated_shouldSendNoRequests() {
    let store = loaded_store(&common::tabular_document(6));
    let (service, provider) = common::mock_service(MockProvider::echo(), 4, 2);

    TranslationJob::spawn(service.clone(), store.clone(), CancellationFlag::new())
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(provider.request_count(), 2);

    let (events, report) = TranslationJob::spawn(service, store, CancellationFlag::new())
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(provider.request_count(), 2);
    assert_eq!(report.batches_total, 0);
    assert_eq!(events.last(), Some(&TranslationEvent::Done));
    assert!(matches!(&events[0], TranslationEvent::Log(line) if line.contains("Nothing to translate")));
}

#[tokio::test]
async fn test_run_withGarbledSecondReply_shouldAbortAndKeepFirstBatch() {
    let store = loaded_store(&common::tabular_document(15));
    let provider = MockProvider::echo().with_call_behavior(1, MockBehavior::Garbled);
    let (service, provider) = common::mock_service(provider, 5, 1);

    let (events, report) = TranslationJob::spawn(service, store.clone(), CancellationFlag::new())
        .unwrap()
        .collect()
        .await
        .unwrap();

    // The third batch never reaches the endpoint
    assert_eq!(provider.request_count(), 2);
    assert!(matches!(report.outcome, RunOutcome::Failed(_)));
    assert_eq!(store.translated_count(), 5);
    assert!(store.snapshot()[..5].iter().all(|unit| unit.is_translated()));

    assert_eq!(common::terminal_count(&events), 1);
    assert!(matches!(events.last(), Some(TranslationEvent::Error(message)) if message.contains("6..10")));
    assert!(events.iter().any(|event| matches!(
        event,
        TranslationEvent::Log(line) if line.contains("Sorry, here is a summary")
    )));
}

#[tokio::test]
async fn test_run_withProviderFailure_shouldEndWithError() {
    let store = loaded_store(&common::tabular_document(10));
    let (service, _provider) = common::mock_service(MockProvider::failing(), 5, 2);

    let (events, report) = TranslationJob::spawn(service, store.clone(), CancellationFlag::new())
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(store.translated_count(), 0);
    assert_eq!(report.batches_completed, 0);
    assert_eq!(common::terminal_count(&events), 1);
    assert!(matches!(events.last(), Some(TranslationEvent::Error(message)) if message.contains("Simulated server error")));
}

#[tokio::test]
async fn test_run_withEmptyRepliesOnly_shouldNotMergeAnything() {
    let store = loaded_store(&common::tabular_document(3));
    let (service, _provider) = common::mock_service(MockProvider::new(MockBehavior::Empty), 10, 1);

    let (_, report) = TranslationJob::spawn(service, store.clone(), CancellationFlag::new())
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert!(matches!(report.outcome, RunOutcome::Failed(_)));
    assert_eq!(store.select_pending().len(), 3);
}

#[tokio::test]
async fn test_run_withReplyNamingOnlyForeignIndices_shouldAbortAsMalformed() {
    let store = loaded_store(&common::tabular_document(8));
    let (service, provider) = common::mock_service(MockProvider::new(MockBehavior::Shifted(1000)), 4, 1);

    let (events, report) = TranslationJob::spawn(service, store.clone(), CancellationFlag::new())
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(provider.request_count(), 1);
    assert!(matches!(&report.outcome, RunOutcome::Failed(message) if message.contains("1..4")));
    assert_eq!(store.translated_count(), 0);
    assert!(!events.iter().any(|event| matches!(event, TranslationEvent::Merge(_))));
    assert!(events.iter().any(|event| matches!(
        event,
        TranslationEvent::Log(line) if line.contains("1001: [T] Line number 1")
    )));
}

#[tokio::test]
async fn test_stop_withFatalBatchInFlight_shouldStillEndWithError() {
    let store = loaded_store(&common::tabular_document(10));
    let gate = Arc::new(Semaphore::new(0));
    let provider = MockProvider::echo()
        .with_call_behavior(1, MockBehavior::Garbled)
        .with_gate_from(1, gate.clone());
    let (service, _provider) = common::mock_service(provider, 5, 2);

    let mut job = TranslationJob::spawn(service, store.clone(), CancellationFlag::new()).unwrap();

    let mut events = Vec::new();
    while let Some(event) = job.next_event().await {
        let first_progress = matches!(event, TranslationEvent::Progress { completed: 1, .. });
        events.push(event);
        if first_progress {
            break;
        }
    }

    job.request_stop();
    gate.add_permits(1);

    while let Some(event) = job.next_event().await {
        events.push(event);
    }
    let report = job.wait().await.unwrap();

    assert!(matches!(report.outcome, RunOutcome::Failed(_)));
    assert_eq!(store.translated_count(), 5);
    assert_eq!(common::terminal_count(&events), 1);
    assert!(matches!(events.last(), Some(TranslationEvent::Error(_))));
    assert!(!events.contains(&TranslationEvent::Stopped));
}

/// Stop after the first of four batches while the other three are in flight
#[tokio::test]
async fn test_stop_afterFirstBatchWithThreeInFlight_shouldFinishInFlightAndEndStopped() {
    let store = loaded_store(&common::srt_document(20));
    let gate = Arc::new(Semaphore::new(0));
    let provider = MockProvider::echo().with_gate_from(1, gate.clone());
    let (service, provider) = common::mock_service(provider, 5, 4);

    let mut job = TranslationJob::spawn(service, store.clone(), CancellationFlag::new()).unwrap();

    let mut events = Vec::new();
    while let Some(event) = job.next_event().await {
        let first_progress = matches!(event, TranslationEvent::Progress { completed: 1, total: 4 });
        events.push(event);
        if first_progress {
            break;
        }
    }
    assert_eq!(store.translated_count(), 5);

    job.request_stop();
    gate.add_permits(3);

    while let Some(event) = job.next_event().await {
        events.push(event);
    }
    let report = job.wait().await.unwrap();

    assert_eq!(provider.request_count(), 4);
    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(store.translated_count(), 20);
    assert_eq!(common::terminal_count(&events), 1);
    assert_eq!(events.last(), Some(&TranslationEvent::Stopped));
}

#[tokio::test]
async fn test_stop_withTwoInFlight_shouldSkipBatchesNotStarted() {
    let store = loaded_store(&common::tabular_document(20));
    let gate = Arc::new(Semaphore::new(0));
    let provider = MockProvider::echo().with_gate_from(0, gate.clone());
    let (service, provider) = common::mock_service(provider, 5, 2);
    let cancel = CancellationFlag::new();

    let job = TranslationJob::spawn(service, store.clone(), cancel.clone()).unwrap();
    wait_for_requests(&provider, 2).await;

    cancel.request_stop();
    gate.add_permits(2);
    let (events, report) = job.collect().await.unwrap();

    assert_eq!(provider.request_count(), 2);
    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(report.batches_completed, 2);
    assert_eq!(store.translated_count(), 10);
    assert_eq!(store.select_pending().first().map(|unit| unit.index), Some(11));
    assert!(events.iter().any(|event| matches!(event, TranslationEvent::Log(line) if line.contains("Kept 2 completed batches"))));
}

#[tokio::test]
async fn test_spawn_whileRunActive_shouldBeRefusedUntilItEnds() {
    let store = loaded_store(&common::tabular_document(4));
    let gate = Arc::new(Semaphore::new(0));
    let provider = MockProvider::echo().with_gate_from(0, gate.clone());
    let (service, provider) = common::mock_service(provider, 10, 1);

    let job = TranslationJob::spawn(service.clone(), store.clone(), CancellationFlag::new()).unwrap();
    wait_for_requests(&provider, 1).await;

    let second = TranslationJob::spawn(service.clone(), store.clone(), CancellationFlag::new());
    assert!(matches!(second, Err(TranslationError::RunInProgress)));

    gate.add_permits(1);
    job.wait().await.unwrap();

    assert!(!store.is_run_active());
    assert!(TranslationJob::spawn(service, store, CancellationFlag::new()).is_ok());
}

#[tokio::test]
async fn test_run_withReportedUsage_shouldAccumulateTokens() {
    let store = loaded_store(&common::tabular_document(12));
    let (service, _provider) = common::mock_service(MockProvider::echo(), 4, 2);

    let report = TranslationJob::spawn(service, store, CancellationFlag::new())
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.token_usage.requests, 3);
    assert!(report.token_usage.total_tokens > 0);
    assert_eq!(report.token_usage.model, "mock-model");
}

#[test]
fn test_service_withZeroBatchSize_shouldRejectConfig() {
    let config = common::test_run_config(0, 1);
    let result = TranslationService::new(MockProvider::echo(), config);
    assert!(matches!(result, Err(TranslationError::InvalidConfig(_))));
}
