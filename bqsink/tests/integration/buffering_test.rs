use std::time::Duration;

use bqsink::diagnostics::DiagnosticEvent;
use bqsink::test_utils::event::message_event;
use bqsink::test_utils::schema::MESSAGE_SCHEMA_JSON;

use crate::common::start_sink;

#[tokio::test]
async fn full_buffer_drops_and_reports_events() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |config| {
        config.buffering.max_buffer_size = 2
    })
    .await;

    assert!(test.sink.on_event(message_event("a")));
    assert!(test.sink.on_event(message_event("b")));
    assert!(!test.sink.on_event(message_event("c")));

    assert_eq!(test.sink.flush().await.unwrap(), 2);
    assert!(
        test.diagnostics
            .events()
            .contains(&DiagnosticEvent::EventsDropped { count: 1 })
    );
    assert!(test.sink.on_event(message_event("d")));
}

#[tokio::test]
async fn count_threshold_publishes_without_flush() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |config| config.buffering.count = 3).await;

    for message in ["a", "b", "c"] {
        assert!(test.sink.on_event(message_event(message)));
    }

    test.diagnostics
        .wait_for(|event| matches!(event, DiagnosticEvent::Inserted { rows: 3, .. }))
        .await;
    assert_eq!(test.warehouse.insert_calls().await, 1);
}

#[tokio::test(start_paused = true)]
async fn interval_publishes_buffered_events() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |config| {
        config.buffering.interval_ms = 1_000
    })
    .await;

    assert!(test.sink.on_event(message_event("a")));
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(test.warehouse.insert_calls().await, 1);
}

#[tokio::test(start_paused = true)]
async fn slow_flush_times_out() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |config| {
        config.buffering.flush_timeout_ms = 1_000
    })
    .await;
    test.warehouse
        .set_insert_delay(Duration::from_secs(5))
        .await;

    assert!(test.sink.on_event(message_event("a")));
    let err = test.sink.flush().await.unwrap_err();

    assert_eq!(err.kind(), bqsink::error::ErrorKind::Timeout);
    test.sink.flush_safe().await;
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |_| {}).await;

    test.sink.shutdown().await.unwrap();
    test.sink.shutdown().await.unwrap();
    test.sink.on_stream_end().await.unwrap();

    assert_eq!(test.warehouse.close_calls().await, 1);
    assert_eq!(
        test.diagnostics
            .count(|event| matches!(event, DiagnosticEvent::SinkEnded { .. })),
        1
    );
    assert!(!test.sink.on_event(message_event("late")));
}
