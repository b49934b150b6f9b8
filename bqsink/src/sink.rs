use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bqsink_config::shared::SinkConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::bail;
use crate::concurrency::coordinator::{BufferingCoordinator, CoordinatorHandle};
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{ErrorKind, SinkResult};
use crate::insert::{Destination, InsertPipeline};
use crate::mapping::{InsertIdStrategy, RowMapper};
use crate::schema::FieldSchema;
use crate::table::{TableIdentity, TableLifecycleManager, TableNameExpander};
use crate::types::EventRecord;
use crate::warehouse::Warehouse;
use crate::warehouse::bigquery::BigQueryWarehouse;

/// Everything derived from the configuration before a warehouse client exists.
#[derive(Debug)]
struct PreparedSink {
    config: SinkConfig,
    schema: Arc<FieldSchema>,
    expander: TableNameExpander,
    /// Table name resolved when the sink was built.
    table_id: String,
}

impl PreparedSink {
    async fn prepare(config: SinkConfig, diagnostics: &dyn Diagnostics) -> SinkResult<Self> {
        config.validate()?;

        let Some(schema_file) = config.table_schema_file.as_deref() else {
            bail!(ErrorKind::ConfigError, "No table schema file configured");
        };
        let schema = load_schema(schema_file, diagnostics).await?;
        let mut expander = TableNameExpander::new(config.table_id.clone())?;
        let table_id = expander.expand(true)?.name;

        Ok(Self {
            config,
            schema: Arc::new(schema),
            expander,
            table_id,
        })
    }
}

async fn load_schema(path: &Path, diagnostics: &dyn Diagnostics) -> SinkResult<FieldSchema> {
    match FieldSchema::load(path).await {
        Ok(schema) => Ok(schema),
        Err(err) => {
            diagnostics.emit(DiagnosticEvent::SinkLoadSchemaFailed {
                message: err.to_string(),
            });
            Err(err)
        }
    }
}

#[derive(Debug)]
struct Running<W> {
    worker: JoinHandle<()>,
    warehouse: Arc<W>,
}

/// Log sink streaming event records into a BigQuery table.
///
/// Events are accepted without blocking and published in batches by a background coordinator.
/// The sink owns its warehouse client, [`BigQuerySink::shutdown`] cancels the coordinator,
/// waits for it and closes the client.
#[derive(Debug)]
pub struct BigQuerySink<W> {
    table: String,
    handle: CoordinatorHandle,
    flush_timeout: Duration,
    diagnostics: Arc<dyn Diagnostics>,
    shutdown_tx: ShutdownTx,
    running: Mutex<Option<Running<W>>>,
}

impl BigQuerySink<BigQueryWarehouse> {
    /// Builds a sink writing into BigQuery with the configured service account.
    ///
    /// The configuration and the schema file are checked before any client is created.
    pub async fn connect(config: SinkConfig, diagnostics: Arc<dyn Diagnostics>) -> SinkResult<Self> {
        let prepared = PreparedSink::prepare(config, diagnostics.as_ref()).await?;
        let warehouse = BigQueryWarehouse::new(&prepared.config.service_account).await?;

        Ok(Self::start(prepared, warehouse, diagnostics))
    }
}

impl<W> BigQuerySink<W>
where
    W: Warehouse + fmt::Debug + Send + Sync + 'static,
{
    /// Builds a sink writing into `warehouse`.
    pub async fn new(
        config: SinkConfig,
        warehouse: W,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> SinkResult<Self> {
        let prepared = PreparedSink::prepare(config, diagnostics.as_ref()).await?;

        Ok(Self::start(prepared, warehouse, diagnostics))
    }

    fn start(prepared: PreparedSink, warehouse: W, diagnostics: Arc<dyn Diagnostics>) -> Self {
        let PreparedSink {
            config,
            schema,
            expander,
            table_id,
        } = prepared;

        let table = TableIdentity::new(
            config.project_id.clone(),
            config.dataset_id.clone(),
            table_id,
        )
        .to_string();

        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let warehouse = Arc::new(warehouse);

        let mapper = RowMapper::new(
            schema.clone(),
            InsertIdStrategy::from_config(config.insert_id_field.as_deref()),
        );
        let pipeline = InsertPipeline::new(
            warehouse.clone(),
            Destination {
                project_id: config.project_id.clone(),
                dataset_id: config.dataset_id.clone(),
            },
            schema,
            mapper,
            expander,
            TableLifecycleManager::new(config.auto_create_table),
            BackoffPolicy::from(&config.retry),
            diagnostics.clone(),
            shutdown_rx.clone(),
        );

        let (coordinator, handle) = BufferingCoordinator::new(
            pipeline,
            &config.buffering,
            diagnostics.clone(),
            shutdown_rx,
        );
        let worker = coordinator.start();

        info!(
            %table,
            warehouse = W::name(),
            auto_create_table = config.auto_create_table,
            "starting bigquery sink"
        );
        diagnostics.emit(DiagnosticEvent::SinkStarted {
            table: table.clone(),
        });

        Self {
            table,
            handle,
            flush_timeout: config.buffering.flush_timeout(),
            diagnostics,
            shutdown_tx,
            running: Mutex::new(Some(Running { worker, warehouse })),
        }
    }

    /// Accepts one event without blocking.
    ///
    /// Returns `false` when the event was dropped because the buffer is full or the sink was
    /// shut down.
    pub fn on_event(&self, event: EventRecord) -> bool {
        self.handle.submit(event)
    }

    /// Called by the producer once its stream ended. Flushes what is buffered, then shuts down.
    pub async fn on_stream_end(&self) -> SinkResult<()> {
        self.flush_safe().await;
        self.shutdown().await
    }

    /// Called by the producer when its stream failed. Flushes what is buffered, then shuts down.
    pub async fn on_stream_error<E>(&self, cause: E) -> SinkResult<()>
    where
        E: fmt::Display,
    {
        self.diagnostics.emit(DiagnosticEvent::UnexpectedError {
            message: format!("event stream failed: {cause}"),
        });
        self.flush_safe().await;
        self.shutdown().await
    }

    /// Publishes everything buffered so far, waiting at most the configured flush timeout.
    pub async fn flush(&self) -> SinkResult<usize> {
        let inserted = timeout(self.flush_timeout, self.handle.flush()).await??;

        Ok(inserted)
    }

    /// Like [`Self::flush`], but failures are only logged.
    pub async fn flush_safe(&self) {
        match self.flush().await {
            Ok(inserted) => debug!(table = %self.table, inserted, "flushed buffered events"),
            Err(err) => warn!(table = %self.table, error = %err, "failed to flush buffered events"),
        }
    }

    /// Number of events accepted but not yet published or dropped.
    pub fn outstanding(&self) -> usize {
        self.handle.outstanding()
    }

    /// Stops the sink. Events still buffered are discarded, flush first to keep them.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) -> SinkResult<()> {
        let mut running = self.running.lock().await;
        let Some(Running { worker, warehouse }) = running.take() else {
            return Ok(());
        };

        self.shutdown_tx.send_replace(true);

        if let Err(err) = worker.await {
            self.diagnostics.emit(DiagnosticEvent::UnexpectedError {
                message: format!("buffering worker failed: {err}"),
            });
        }

        let closed = warehouse.close().await;
        self.diagnostics.emit(DiagnosticEvent::SinkEnded {
            table: self.table.clone(),
        });

        closed
    }
}

impl<W> Drop for BigQuerySink<W> {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
