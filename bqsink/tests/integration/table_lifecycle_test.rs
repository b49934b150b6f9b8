use std::sync::Arc;

use bqsink::diagnostics::DiagnosticEvent;
use bqsink::error::ErrorKind;
use bqsink::sink::BigQuerySink;
use bqsink::table::TableIdentity;
use bqsink::test_utils::diagnostics::RecordingDiagnostics;
use bqsink::test_utils::event::message_event;
use bqsink::test_utils::schema::MESSAGE_SCHEMA_JSON;
use bqsink::test_utils::warehouse::{ScriptedWarehouse, WarehouseCall};
use chrono::Utc;

use crate::common::{sink_config, start_sink, write_schema};

#[tokio::test]
async fn missing_table_is_created_once() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |config| config.auto_create_table = true).await;
    test.warehouse.push_exists(Ok(false)).await;
    let table = TableIdentity::new("project", "logs", "events");

    for message in ["a", "b"] {
        assert!(test.sink.on_event(message_event(message)));
        assert_eq!(test.sink.flush().await.unwrap(), 1);
    }

    let calls: Vec<_> = test
        .warehouse
        .calls()
        .await
        .into_iter()
        .filter(|call| !matches!(call, WarehouseCall::InsertRows { .. }))
        .collect();
    assert_eq!(
        calls,
        vec![
            WarehouseCall::TableExists(table.clone()),
            WarehouseCall::CreateTable(table.clone()),
        ]
    );
    assert_eq!(test.warehouse.insert_calls().await, 2);
    assert!(
        test.diagnostics
            .events()
            .contains(&DiagnosticEvent::TableCreated {
                table: table.to_string()
            })
    );
}

#[tokio::test]
async fn existing_table_is_not_created() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |config| config.auto_create_table = true).await;

    assert!(test.sink.on_event(message_event("a")));
    test.sink.flush().await.unwrap();

    assert_eq!(test.warehouse.exists_calls().await, 1);
    assert!(
        !test
            .warehouse
            .calls()
            .await
            .iter()
            .any(|call| matches!(call, WarehouseCall::CreateTable(_)))
    );
}

#[tokio::test]
async fn failed_existence_check_keeps_the_batch_for_later() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |config| config.auto_create_table = true).await;
    test.warehouse
        .push_exists(Err(ErrorKind::DestinationIoError))
        .await;

    assert!(test.sink.on_event(message_event("a")));
    let err = test.sink.flush().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DestinationIoError);
    assert_eq!(test.warehouse.insert_calls().await, 0);

    assert_eq!(test.sink.flush().await.unwrap(), 1);
    assert_eq!(test.warehouse.exists_calls().await, 2);
}

#[tokio::test]
async fn templated_table_name_uses_the_current_time() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |config| {
        config.table_id = "events_{yyyy}".to_string()
    })
    .await;

    assert!(test.sink.on_event(message_event("a")));
    test.sink.flush().await.unwrap();

    let expected = format!("events_{}", Utc::now().format("%Y"));
    let calls = test.warehouse.calls().await;
    assert!(matches!(
        calls.as_slice(),
        [WarehouseCall::InsertRows { table, .. }] if table.table_id == expected
    ));
}

#[tokio::test]
async fn invalid_table_template_fails_construction() {
    let schema_file = write_schema(MESSAGE_SCHEMA_JSON);
    let mut config = sink_config(schema_file.path());
    config.table_id = "events_{%Q}".to_string();

    let err = BigQuerySink::new(
        config,
        ScriptedWarehouse::new(),
        Arc::new(RecordingDiagnostics::new()),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}
