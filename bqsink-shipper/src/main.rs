//! Ships newline-delimited JSON event records into a BigQuery table.
//!
//! Loads the shipper configuration, initializes tracing and metrics, then streams every line of
//! the input (stdin by default) through a [`bqsink::sink::BigQuerySink`] until the input ends
//! or Ctrl+C is pressed.

use std::path::PathBuf;

use anyhow::anyhow;
use bqsink_telemetry::metrics::init_metrics;
use bqsink_telemetry::tracing::init_tracing;
use clap::Parser;
use tracing::info;

use crate::config::load_shipper_config;
use crate::core::start_shipper;

mod config;
mod core;
mod input;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File with one JSON event record per line, stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Write rows to an in-memory warehouse instead of BigQuery.
    #[arg(long)]
    dry_run: bool,
}

/// Installs the aws-lc-rs provider for rustls, other providers may be enabled through feature
/// unification.
fn install_crypto_provider() -> anyhow::Result<()> {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install default crypto provider"))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let shipper_config = load_shipper_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    if let Some(port) = shipper_config.metrics_port {
        init_metrics(port)?;
        info!(port, "prometheus metrics endpoint started");
    }

    install_crypto_provider()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_shipper(
            shipper_config,
            args.input,
            args.dry_run,
        ))?;

    Ok(())
}
