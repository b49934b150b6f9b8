use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use bqsink::sink::BigQuerySink;
use bqsink::test_utils::diagnostics::RecordingDiagnostics;
use bqsink::test_utils::warehouse::ScriptedWarehouse;
use bqsink_config::shared::{
    AuthMethod, BufferingConfig, RetryConfig, ServiceAccountConfig, SinkConfig,
};
use bqsink_telemetry::tracing::init_test_tracing;
use tempfile::NamedTempFile;

/// A sink writing into a [`ScriptedWarehouse`], with the schema file it was built from.
pub struct TestSink {
    pub sink: BigQuerySink<ScriptedWarehouse>,
    pub warehouse: ScriptedWarehouse,
    pub diagnostics: Arc<RecordingDiagnostics>,
    _schema_file: NamedTempFile,
}

pub fn write_schema(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Returns a configuration that only publishes on flush unless a test changes it.
pub fn sink_config(schema_file: &Path) -> SinkConfig {
    SinkConfig {
        project_id: "project".to_string(),
        dataset_id: "logs".to_string(),
        table_id: "events".to_string(),
        auth_method: AuthMethod::PrivateKey,
        service_account: ServiceAccountConfig {
            email: "sink@project.iam.gserviceaccount.com".to_string(),
            private_key_file: "/nonexistent/key.json".into(),
            ..Default::default()
        },
        auto_create_table: false,
        table_schema_file: Some(schema_file.to_path_buf()),
        insert_id_field: Some("%uuid%".to_string()),
        buffering: BufferingConfig {
            interval_ms: 3_600_000,
            count: 10_000,
            max_buffer_size: 30_000,
            flush_timeout_ms: 60_000,
        },
        retry: RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        },
    }
}

pub async fn start_sink<F>(schema_json: &str, configure: F) -> TestSink
where
    F: FnOnce(&mut SinkConfig),
{
    init_test_tracing();

    let schema_file = write_schema(schema_json);
    let mut config = sink_config(schema_file.path());
    configure(&mut config);

    let warehouse = ScriptedWarehouse::new();
    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let sink = BigQuerySink::new(config, warehouse.clone(), diagnostics.clone())
        .await
        .unwrap();

    TestSink {
        sink,
        warehouse,
        diagnostics,
        _schema_file: schema_file,
    }
}
