//! Diagnostic events reported by the sink.
//!
//! Components never log sink lifecycle or insert outcomes directly, they emit a
//! [`DiagnosticEvent`] through the injected [`Diagnostics`] implementation. The default
//! implementation forwards to `tracing` and `metrics`.

use std::fmt;
use std::sync::{Arc, OnceLock};

use metrics::{counter, histogram};
use tracing::{debug, error, info, warn};

use crate::metrics::{
    BQSINK_BATCH_SIZE, BQSINK_BATCHES_DROPPED_TOTAL, BQSINK_EVENTS_DROPPED_TOTAL,
    BQSINK_INSERT_FAULTS_TOTAL, BQSINK_ROWS_INSERTED_TOTAL, BQSINK_TABLES_CREATED_TOTAL,
    OUTCOME_LABEL, TABLE_NAME_LABEL, register_metrics,
};

static DEFAULT_DIAGNOSTICS: OnceLock<Arc<dyn Diagnostics>> = OnceLock::new();

/// Classification of a failed insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The request was accepted but some rows were rejected. Retried.
    RowErrors,
    /// The credentials were refused. Terminal.
    Unauthorized,
    /// A network or availability failure. Terminal for the batch.
    Transient,
    /// Any other API failure. Terminal.
    Fatal,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::RowErrors => "row_errors",
            FaultKind::Unauthorized => "unauthorized",
            FaultKind::Transient => "transient",
            FaultKind::Fatal => "fatal",
        }
    }
}

/// Something noteworthy that happened inside the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    SinkStarted { table: String },
    SinkEnded { table: String },
    SinkLoadSchemaFailed { message: String },
    InsertBegan { table: String, rows: usize },
    Inserted { table: String, rows: usize },
    InsertFault {
        table: String,
        kind: FaultKind,
        message: String,
        attempt: u32,
    },
    RetryOver { table: String, message: String },
    TableCreated { table: String },
    TableCreateFailed { table: String, message: String },
    UnexpectedError { message: String },
    EventsDropped { count: usize },
}

/// Receiver of [`DiagnosticEvent`]s.
///
/// Implementations must not block and must not panic, `emit` is called from the coordinator
/// task in the middle of publish cycles.
pub trait Diagnostics: fmt::Debug + Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

/// [`Diagnostics`] writing structured log lines and updating sink metrics.
#[derive(Debug, Default)]
pub struct TracingDiagnostics;

impl TracingDiagnostics {
    pub fn new() -> Self {
        register_metrics();

        Self
    }
}

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::SinkStarted { table } => info!(%table, "sink started"),
            DiagnosticEvent::SinkEnded { table } => info!(%table, "sink ended"),
            DiagnosticEvent::SinkLoadSchemaFailed { message } => {
                error!(%message, "failed to load table schema")
            }
            DiagnosticEvent::InsertBegan { table, rows } => {
                histogram!(BQSINK_BATCH_SIZE).record(rows as f64);
                debug!(%table, rows, "insert began")
            }
            DiagnosticEvent::Inserted { table, rows } => {
                counter!(BQSINK_ROWS_INSERTED_TOTAL, TABLE_NAME_LABEL => table.clone())
                    .increment(rows as u64);
                debug!(%table, rows, "inserted successfully")
            }
            DiagnosticEvent::InsertFault {
                table,
                kind,
                message,
                attempt,
            } => {
                counter!(BQSINK_INSERT_FAULTS_TOTAL, OUTCOME_LABEL => kind.as_str()).increment(1);
                if kind != FaultKind::RowErrors {
                    counter!(BQSINK_BATCHES_DROPPED_TOTAL).increment(1);
                }
                error!(%table, outcome = kind.as_str(), attempt, %message, "insert fault occurred")
            }
            DiagnosticEvent::RetryOver { table, message } => {
                counter!(BQSINK_BATCHES_DROPPED_TOTAL).increment(1);
                error!(%table, %message, "retry over, batch dropped")
            }
            DiagnosticEvent::TableCreated { table } => {
                counter!(BQSINK_TABLES_CREATED_TOTAL).increment(1);
                info!(%table, "table created")
            }
            DiagnosticEvent::TableCreateFailed { table, message } => {
                error!(%table, %message, "failed to create table")
            }
            DiagnosticEvent::UnexpectedError { message } => {
                error!(%message, "unexpected error occurred")
            }
            DiagnosticEvent::EventsDropped { count } => {
                counter!(BQSINK_EVENTS_DROPPED_TOTAL).increment(count as u64);
                warn!(count, "buffer full, events dropped")
            }
        }
    }
}

/// Returns the process-wide [`TracingDiagnostics`] instance.
pub fn default_diagnostics() -> Arc<dyn Diagnostics> {
    DEFAULT_DIAGNOSTICS
        .get_or_init(|| Arc::new(TracingDiagnostics::new()))
        .clone()
}
