use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

use crate::backoff::BackoffPolicy;
use crate::concurrency::shutdown::{ShutdownRx, cancelled, is_cancelled};
use crate::diagnostics::{DiagnosticEvent, Diagnostics, FaultKind};
use crate::error::SinkResult;
use crate::mapping::{RowMapper, TableRow};
use crate::schema::FieldSchema;
use crate::table::{TableIdentity, TableLifecycleManager, TableNameExpander};
use crate::types::EventRecord;
use crate::warehouse::{InsertOutcome, RowInsertError, Warehouse};

/// Row error reason BigQuery reports for valid rows of a rejected request.
const STOPPED_REASON: &str = "stopped";

/// Consumer of batches drained by the buffering coordinator.
pub trait Publisher {
    /// Publishes `batch`, returning the number of rows the warehouse accepted.
    ///
    /// `Ok(0)` means the batch was dropped, the reason has been reported already. Errors are
    /// returned for failures the batch may recover from on a later attempt.
    fn publish(&mut self, batch: &[EventRecord]) -> impl Future<Output = SinkResult<usize>> + Send;
}

/// Destination project and dataset of an [`InsertPipeline`].
#[derive(Debug, Clone)]
pub struct Destination {
    pub project_id: String,
    pub dataset_id: String,
}

/// Maps batches into rows and streams them into the warehouse with bounded retries.
#[derive(Debug)]
pub struct InsertPipeline<W> {
    warehouse: Arc<W>,
    destination: Destination,
    schema: Arc<FieldSchema>,
    mapper: RowMapper,
    expander: TableNameExpander,
    lifecycle: TableLifecycleManager,
    backoff: BackoffPolicy,
    diagnostics: Arc<dyn Diagnostics>,
    shutdown_rx: ShutdownRx,
}

impl<W> InsertPipeline<W>
where
    W: Warehouse + Send + Sync,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        warehouse: Arc<W>,
        destination: Destination,
        schema: Arc<FieldSchema>,
        mapper: RowMapper,
        expander: TableNameExpander,
        lifecycle: TableLifecycleManager,
        backoff: BackoffPolicy,
        diagnostics: Arc<dyn Diagnostics>,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            warehouse,
            destination,
            schema,
            mapper,
            expander,
            lifecycle,
            backoff,
            diagnostics,
            shutdown_rx,
        }
    }

    /// Publishes one batch.
    ///
    /// Mapping and table existence failures are returned. Insert failures never are: row errors
    /// are retried up to the attempt bound, any other failure drops the batch after a
    /// diagnostic, and cancellation drops it silently.
    pub async fn publish_batch(&mut self, batch: &[EventRecord]) -> SinkResult<usize> {
        if batch.is_empty() || is_cancelled(&self.shutdown_rx) {
            return Ok(0);
        }

        let rows = self.mapper.map_batch(batch)?;

        let expansion = self.expander.expand(false)?;
        if expansion.changed {
            debug!(table_id = %expansion.name, "resolved table name changed");
            self.lifecycle.invalidate();
        }
        let table = TableIdentity::new(
            self.destination.project_id.clone(),
            self.destination.dataset_id.clone(),
            expansion.name,
        );

        tokio::select! {
            biased;

            _ = cancelled(&mut self.shutdown_rx) => {
                info!(%table, "table check cancelled");
                return Ok(0);
            }
            result = self.lifecycle.ensure_exists(
                self.warehouse.as_ref(),
                &table,
                &self.schema,
                self.diagnostics.as_ref(),
            ) => result?,
        }

        Ok(self.insert_with_retry(&table, &rows).await)
    }

    async fn insert_with_retry(&mut self, table: &TableIdentity, rows: &[TableRow]) -> usize {
        let max_attempts = self.backoff.max_attempts();
        let table_name = table.to_string();

        let mut attempt = 1;
        loop {
            self.diagnostics.emit(DiagnosticEvent::InsertBegan {
                table: table_name.clone(),
                rows: rows.len(),
            });

            let outcome = tokio::select! {
                biased;

                _ = cancelled(&mut self.shutdown_rx) => {
                    info!(table = %table_name, attempt, "insert cancelled");
                    return 0;
                }
                outcome = self.warehouse.insert_rows(table, rows) => outcome,
            };

            let (kind, message) = match outcome {
                InsertOutcome::Success => {
                    self.diagnostics.emit(DiagnosticEvent::Inserted {
                        table: table_name,
                        rows: rows.len(),
                    });
                    return rows.len();
                }
                InsertOutcome::PartialRowErrors(errors) => {
                    (FaultKind::RowErrors, format_row_errors(&errors, rows))
                }
                InsertOutcome::Unauthorized(message) => (FaultKind::Unauthorized, message),
                InsertOutcome::Transient(message) => (FaultKind::Transient, message),
                InsertOutcome::Fatal(message) => (FaultKind::Fatal, message),
            };

            self.diagnostics.emit(DiagnosticEvent::InsertFault {
                table: table_name.clone(),
                kind,
                message,
                attempt,
            });

            if kind != FaultKind::RowErrors {
                return 0;
            }
            if attempt >= max_attempts {
                break;
            }

            let delay = self.backoff.delay(attempt);
            debug!(table = %table_name, attempt, ?delay, "retrying insert after backoff");
            tokio::select! {
                biased;

                _ = cancelled(&mut self.shutdown_rx) => {
                    info!(table = %table_name, attempt, "insert backoff cancelled");
                    return 0;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }

        self.diagnostics.emit(DiagnosticEvent::RetryOver {
            table: table_name,
            message: format!(
                "giving up after {attempt} attempts, {} rows dropped",
                rows.len()
            ),
        });

        0
    }
}

impl<W> Publisher for InsertPipeline<W>
where
    W: Warehouse + Send + Sync,
{
    fn publish(&mut self, batch: &[EventRecord]) -> impl Future<Output = SinkResult<usize>> + Send {
        self.publish_batch(batch)
    }
}

/// Renders the row errors of one response, skipping the `stopped` rows which only failed
/// because another row of the request did.
fn format_row_errors(errors: &[RowInsertError], rows: &[TableRow]) -> String {
    let mut messages = Vec::new();
    for row_error in errors {
        let posted = rows
            .get(row_error.index)
            .map(|row| row.to_json().to_string())
            .unwrap_or_default();

        for detail in &row_error.errors {
            if detail.reason.as_deref() == Some(STOPPED_REASON) {
                continue;
            }

            messages.push(format!(
                "Index:{}\nDebugInfo:{}\nLocation:{}\nMessage:{}\nReason:{}\nPostRawJSON:{}",
                row_error.index,
                detail.debug_info.as_deref().unwrap_or_default(),
                detail.location.as_deref().unwrap_or_default(),
                detail.message.as_deref().unwrap_or_default(),
                detail.reason.as_deref().unwrap_or_default(),
                posted,
            ));
        }
    }

    if messages.is_empty() {
        return format!("{} rows rejected without details", errors.len());
    }

    messages.join("\n")
}
