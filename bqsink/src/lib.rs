//! Log sink streaming structured event records into Google BigQuery.
//!
//! Events handed to a [`sink::BigQuerySink`] are buffered in memory and published in batches,
//! on an interval, once enough events are buffered, on manual flush and at the end of the
//! stream. Every batch is mapped to rows following a JSON table schema, the destination table
//! is created on demand and rejected rows are retried with exponential backoff.
//!
//! ```rust,no_run
//! use bqsink::diagnostics::default_diagnostics;
//! use bqsink::sink::BigQuerySink;
//! use bqsink::types::EventRecord;
//! use bqsink_config::shared::SinkConfig;
//!
//! # async fn run(config: SinkConfig) -> bqsink::error::SinkResult<()> {
//! let sink = BigQuerySink::connect(config, default_diagnostics()).await?;
//! sink.on_event(EventRecord::default());
//! sink.on_stream_end().await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod concurrency;
pub mod diagnostics;
pub mod error;
pub mod insert;
mod macros;
pub mod mapping;
pub mod metrics;
pub mod schema;
pub mod sink;
pub mod table;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod warehouse;
