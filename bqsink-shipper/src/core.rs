use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bqsink::diagnostics::default_diagnostics;
use bqsink::sink::BigQuerySink;
use bqsink::warehouse::Warehouse;
use bqsink::warehouse::memory::MemoryWarehouse;
use bqsink_config::shared::ShipperConfig;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info};

use crate::input::{ShipOutcome, ship_lines};

pub async fn start_shipper(
    config: ShipperConfig,
    input: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let diagnostics = default_diagnostics();

    // Static dispatch over the warehouse, one arm per implementation.
    if dry_run {
        info!("dry run, rows are kept in memory and logged");
        let sink = BigQuerySink::new(config.sink, MemoryWarehouse::permissive(), diagnostics)
            .await?;
        run(&sink, input.as_deref()).await
    } else {
        let sink = BigQuerySink::connect(config.sink, diagnostics).await?;
        run(&sink, input.as_deref()).await
    }
}

async fn run<W>(sink: &BigQuerySink<W>, input: Option<&Path>) -> anyhow::Result<()>
where
    W: Warehouse + fmt::Debug + Send + Sync + 'static,
{
    let reader = open_input(input).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    let outcome = ship_lines(sink, reader, ctrl_c).await;

    match outcome {
        ShipOutcome::Ended(stats) => {
            info!(
                accepted = stats.accepted,
                dropped = stats.dropped,
                malformed = stats.malformed,
                "input ended, flushing"
            );
            sink.on_stream_end().await?;
        }
        ShipOutcome::Interrupted(stats) => {
            info!(
                accepted = stats.accepted,
                dropped = stats.dropped,
                malformed = stats.malformed,
                "sigint (ctrl+c) received, flushing"
            );
            sink.on_stream_end().await?;
        }
        ShipOutcome::Failed(err) => {
            error!(error = %err, "failed to read input");
            sink.on_stream_error(&err).await?;
            return Err(err).context("failed to read input");
        }
    }

    Ok(())
}

async fn open_input(input: Option<&Path>) -> anyhow::Result<Box<dyn AsyncBufRead + Send + Unpin>> {
    match input {
        Some(path) => {
            let file = File::open(path)
                .await
                .with_context(|| format!("failed to open input file `{}`", path.display()))?;
            info!(path = %path.display(), "reading events from file");

            Ok(Box::new(BufReader::new(file)))
        }
        None => {
            info!("reading events from stdin");

            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}
