use std::time::Duration;

use bqsink::diagnostics::{DiagnosticEvent, FaultKind};
use bqsink::test_utils::event::{message_event, message_events};
use bqsink::test_utils::schema::MESSAGE_SCHEMA_JSON;
use bqsink::test_utils::warehouse::row_errors;
use bqsink::warehouse::InsertOutcome;
use tokio::time::Instant;

use crate::common::start_sink;

#[tokio::test(start_paused = true)]
async fn row_errors_then_success_retries_the_whole_batch() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |_| {}).await;
    for _ in 0..3 {
        test.warehouse.push_insert(row_errors(1, "invalid")).await;
    }

    for event in message_events(&["a", "b"]) {
        assert!(test.sink.on_event(event));
    }

    assert_eq!(test.sink.flush().await.unwrap(), 2);
    assert_eq!(test.warehouse.insert_calls().await, 4);
    assert_eq!(test.warehouse.accepted_rows().await.len(), 2);
    assert_eq!(
        test.diagnostics
            .count(|event| matches!(event, DiagnosticEvent::InsertFault { .. })),
        3
    );
}

#[tokio::test(start_paused = true)]
async fn persistent_row_errors_stop_at_max_attempts() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |config| config.retry.max_attempts = 4).await;
    for _ in 0..10 {
        test.warehouse.push_insert(row_errors(0, "invalid")).await;
    }

    assert!(test.sink.on_event(message_event("a")));

    assert_eq!(test.sink.flush().await.unwrap(), 0);
    assert_eq!(test.warehouse.insert_calls().await, 4);
    assert_eq!(test.sink.outstanding(), 0);
    assert_eq!(
        test.diagnostics
            .count(|event| matches!(event, DiagnosticEvent::RetryOver { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn unauthorized_is_attempted_once_without_backoff() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |_| {}).await;
    test.warehouse
        .push_insert(InsertOutcome::Unauthorized(
            "401: Request had invalid authentication credentials".to_string(),
        ))
        .await;

    assert!(test.sink.on_event(message_event("a")));

    let started = Instant::now();
    assert_eq!(test.sink.flush().await.unwrap(), 0);

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(test.warehouse.insert_calls().await, 1);
    assert!(test.diagnostics.events().iter().any(|event| matches!(
        event,
        DiagnosticEvent::InsertFault {
            kind: FaultKind::Unauthorized,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_drop_the_batch_and_keep_running() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |_| {}).await;
    test.warehouse
        .push_insert(InsertOutcome::Transient("503: backend error".to_string()))
        .await;

    assert!(test.sink.on_event(message_event("a")));
    assert_eq!(test.sink.flush().await.unwrap(), 0);

    assert!(test.sink.on_event(message_event("b")));
    assert_eq!(test.sink.flush().await.unwrap(), 1);
    assert_eq!(test.warehouse.insert_calls().await, 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_backoff() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |config| {
        config.buffering.count = 1;
        config.retry.max_attempts = 10;
        config.retry.initial_backoff_ms = 60_000;
        config.retry.max_backoff_ms = 600_000;
    })
    .await;
    for _ in 0..10 {
        test.warehouse.push_insert(row_errors(0, "invalid")).await;
    }

    assert!(test.sink.on_event(message_event("a")));
    test.diagnostics
        .wait_for(|event| matches!(event, DiagnosticEvent::InsertFault { .. }))
        .await;

    test.sink.shutdown().await.unwrap();

    assert!(test.warehouse.insert_calls().await < 10);
    assert_eq!(
        test.diagnostics
            .count(|event| matches!(event, DiagnosticEvent::RetryOver { .. })),
        0
    );
}
