use std::fmt;
use std::future::Future;
use std::io;

use bqsink::sink::BigQuerySink;
use bqsink::types::EventRecord;
use bqsink::warehouse::Warehouse;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Counters of one shipping run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShipStats {
    /// Events handed to the sink.
    pub accepted: usize,
    /// Events the sink refused because its buffer was full.
    pub dropped: usize,
    /// Lines that are not valid event records.
    pub malformed: usize,
}

/// How reading the input stopped.
#[derive(Debug)]
pub enum ShipOutcome {
    Ended(ShipStats),
    Interrupted(ShipStats),
    Failed(io::Error),
}

/// Parses one input line. Blank lines yield [`None`].
pub fn parse_line(line: &str) -> Result<Option<EventRecord>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(line).map(Some)
}

/// Feeds every line of `reader` to `sink` until the input ends, fails or `stop` resolves.
///
/// Malformed lines are logged and skipped. The sink is neither flushed nor shut down.
pub async fn ship_lines<W, R, S>(sink: &BigQuerySink<W>, reader: R, stop: S) -> ShipOutcome
where
    W: Warehouse + fmt::Debug + Send + Sync + 'static,
    R: AsyncBufRead + Unpin,
    S: Future<Output = io::Result<()>>,
{
    let mut lines = reader.lines();
    let mut stats = ShipStats::default();
    let mut line_number = 0usize;

    tokio::pin!(stop);
    let mut listening = true;

    loop {
        tokio::select! {
            biased;

            result = &mut stop, if listening => {
                match result {
                    Ok(()) => return ShipOutcome::Interrupted(stats),
                    Err(err) => {
                        warn!(error = %err, "failed to listen for the stop signal");
                        listening = false;
                    }
                }
            }

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => return ShipOutcome::Ended(stats),
                    Err(err) => return ShipOutcome::Failed(err),
                };
                line_number += 1;

                match parse_line(&line) {
                    Ok(Some(event)) => {
                        if sink.on_event(event) {
                            stats.accepted += 1;
                        } else {
                            stats.dropped += 1;
                        }
                    }
                    Ok(None) => debug!(line_number, "skipping blank line"),
                    Err(err) => {
                        stats.malformed += 1;
                        warn!(line_number, error = %err, "skipping malformed event record");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::{pending, ready};
    use std::io::Write;
    use std::sync::Arc;

    use bqsink::test_utils::diagnostics::RecordingDiagnostics;
    use bqsink::test_utils::schema::MESSAGE_SCHEMA_JSON;
    use bqsink::test_utils::warehouse::ScriptedWarehouse;
    use bqsink::types::Cell;
    use bqsink_config::shared::{ServiceAccountConfig, SinkConfig};
    use tempfile::NamedTempFile;

    use super::*;

    async fn sink(schema_file: &NamedTempFile) -> BigQuerySink<ScriptedWarehouse> {
        let config = SinkConfig {
            project_id: "project".to_string(),
            dataset_id: "logs".to_string(),
            table_id: "events".to_string(),
            auth_method: Default::default(),
            service_account: ServiceAccountConfig {
                email: "sink@project.iam.gserviceaccount.com".to_string(),
                private_key_file: "/nonexistent/key.json".into(),
                ..Default::default()
            },
            auto_create_table: false,
            table_schema_file: Some(schema_file.path().to_path_buf()),
            insert_id_field: None,
            buffering: Default::default(),
            retry: Default::default(),
        };

        BigQuerySink::new(
            config,
            ScriptedWarehouse::new(),
            Arc::new(RecordingDiagnostics::new()),
        )
        .await
        .unwrap()
    }

    fn schema_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MESSAGE_SCHEMA_JSON.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_records_and_skips_blank_lines() {
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("{\"event_id\": 1").is_err());

        let event = parse_line(r#"{"event_id": 7, "payload": {"msg": "hi"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.event_id, 7);
        assert_eq!(event.payload.value_at(0), Some(&Cell::from("hi")));
    }

    #[tokio::test]
    async fn ships_every_valid_line() {
        let file = schema_file();
        let sink = sink(&file).await;
        let input = b"{\"payload\": {\"msg\": \"a\"}}\n\nnot json\n{\"payload\": {\"msg\": \"b\"}}\n";

        let outcome = ship_lines(&sink, &input[..], pending()).await;

        assert!(matches!(
            outcome,
            ShipOutcome::Ended(ShipStats {
                accepted: 2,
                dropped: 0,
                malformed: 1
            })
        ));
        assert_eq!(sink.outstanding(), 2);
        sink.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn stop_signal_interrupts_reading() {
        let file = schema_file();
        let sink = sink(&file).await;
        let input = b"{\"payload\": {\"msg\": \"a\"}}\n";

        let outcome = ship_lines(&sink, &input[..], ready(Ok(()))).await;

        assert!(matches!(
            outcome,
            ShipOutcome::Interrupted(ShipStats { accepted: 0, .. })
        ));
        sink.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn failing_stop_signal_is_ignored() {
        let file = schema_file();
        let sink = sink(&file).await;
        let input = b"{\"payload\": {\"msg\": \"a\"}}\n";

        let outcome = ship_lines(&sink, &input[..], ready(Err(io::Error::other("no signals")))).await;

        assert!(matches!(
            outcome,
            ShipOutcome::Ended(ShipStats { accepted: 1, .. })
        ));
        sink.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn read_errors_end_shipping() {
        let file = schema_file();
        let sink = sink(&file).await;
        let input: &[u8] = &[0xff, 0xfe, b'\n'];

        let outcome = ship_lines(&sink, input, pending()).await;

        assert!(matches!(outcome, ShipOutcome::Failed(err) if err.kind() == io::ErrorKind::InvalidData));
        sink.shutdown().await.unwrap();
    }
}
