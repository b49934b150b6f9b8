use std::collections::HashSet;
use std::sync::Arc;

use bqsink::diagnostics::DiagnosticEvent;
use bqsink::sink::BigQuerySink;
use bqsink::table::TableIdentity;
use bqsink::test_utils::diagnostics::RecordingDiagnostics;
use bqsink::test_utils::event::{message_event, message_events};
use bqsink::test_utils::schema::MESSAGE_SCHEMA_JSON;
use bqsink::test_utils::warehouse::WarehouseCall;
use bqsink::types::{Cell, EventLevel, EventRecord, Payload};
use bqsink::warehouse::memory::MemoryWarehouse;
use serde_json::json;

use crate::common::{sink_config, start_sink, write_schema};

#[tokio::test]
async fn one_batch_becomes_one_insert_with_unique_ids() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |_| {}).await;

    for event in message_events(&["a", "b", "c"]) {
        assert!(test.sink.on_event(event));
    }
    assert_eq!(test.sink.flush().await.unwrap(), 3);

    let calls = test.warehouse.calls().await;
    let [WarehouseCall::InsertRows { table, rows }] = calls.as_slice() else {
        panic!("expected a single insert, got {calls:?}");
    };
    assert_eq!(table, &TableIdentity::new("project", "logs", "events"));
    assert_eq!(
        rows.iter().map(|row| row.to_json()).collect::<Vec<_>>(),
        vec![json!({"msg": "a"}), json!({"msg": "b"}), json!({"msg": "c"})]
    );

    let ids: HashSet<_> = rows
        .iter()
        .map(|row| row.insert_id.clone().unwrap())
        .collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| !id.is_empty()));

    test.sink.on_stream_end().await.unwrap();
}

#[tokio::test]
async fn builtin_attributes_and_payload_share_a_row() {
    let schema = r#"{"fields": [
        {"name": "msg", "type": "STRING", "mode": "REQUIRED"},
        {"name": "event_id", "type": "INTEGER", "mode": "REQUIRED"},
        {"name": "Level", "type": "INTEGER"},
        {"name": "provider_name", "type": "STRING"}
    ]}"#;
    let test = start_sink(schema, |config| config.insert_id_field = None).await;

    let event = EventRecord {
        event_id: 42,
        level: EventLevel::Warning,
        ..EventRecord::with_payload(Payload::from_pairs([("msg", Cell::from("hello"))]))
    };
    assert!(test.sink.on_event(event));
    assert_eq!(test.sink.flush().await.unwrap(), 1);

    let rows = test.warehouse.accepted_rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].insert_id, None);
    assert_eq!(
        rows[0].to_json(),
        json!({"msg": "hello", "event_id": 42, "Level": EventLevel::Warning.as_i64()})
    );
}

#[tokio::test]
async fn named_insert_id_uses_the_field_value() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |config| {
        config.insert_id_field = Some("msg".to_string())
    })
    .await;

    for event in message_events(&["first", "second"]) {
        assert!(test.sink.on_event(event));
    }
    test.sink.flush().await.unwrap();

    let ids: Vec<_> = test
        .warehouse
        .accepted_rows()
        .await
        .into_iter()
        .map(|row| row.insert_id)
        .collect();
    assert_eq!(
        ids,
        vec![Some("first".to_string()), Some("second".to_string())]
    );
}

#[tokio::test]
async fn missing_required_value_never_reaches_the_warehouse() {
    let test = start_sink(MESSAGE_SCHEMA_JSON, |_| {}).await;

    assert!(test.sink.on_event(message_event("a")));
    assert!(test.sink.on_event(EventRecord::with_payload(Payload::from_pairs([(
        "msg",
        Cell::Null
    )]))));

    let err = test.sink.flush().await.unwrap_err();

    assert_eq!(err.kind(), bqsink::error::ErrorKind::MissingRequiredField);
    assert_eq!(test.warehouse.insert_calls().await, 0);
    assert!(test.diagnostics.events().iter().any(|event| matches!(
        event,
        DiagnosticEvent::UnexpectedError { .. }
    )));
}

#[tokio::test]
async fn unknown_schema_field_fails_the_batch() {
    let schema = r#"[{"name": "not_there", "type": "STRING", "mode": "NULLABLE"}]"#;
    let test = start_sink(schema, |_| {}).await;

    assert!(test.sink.on_event(message_event("a")));
    let err = test.sink.flush().await.unwrap_err();

    assert_eq!(err.kind(), bqsink::error::ErrorKind::UnknownField);
    assert!(test.warehouse.calls().await.is_empty());
}

#[tokio::test]
async fn memory_warehouse_creates_and_stores() {
    let schema_file = write_schema(MESSAGE_SCHEMA_JSON);
    let mut config = sink_config(schema_file.path());
    config.auto_create_table = true;
    let warehouse = MemoryWarehouse::new();
    let diagnostics = Arc::new(RecordingDiagnostics::new());

    let sink = BigQuerySink::new(config, warehouse.clone(), diagnostics.clone())
        .await
        .unwrap();
    for event in message_events(&["a", "b"]) {
        assert!(sink.on_event(event));
    }
    sink.on_stream_end().await.unwrap();

    let table = TableIdentity::new("project", "logs", "events");
    assert_eq!(warehouse.rows(&table).await.len(), 2);
    assert_eq!(
        warehouse.schema(&table).await.map(|schema| schema.len()),
        Some(1)
    );
    assert!(
        diagnostics
            .events()
            .contains(&DiagnosticEvent::TableCreated {
                table: table.to_string()
            })
    );
}
