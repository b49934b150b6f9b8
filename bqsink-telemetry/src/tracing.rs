use std::sync::Once;

use bqsink_config::environment::Environment;
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::log_tracer::SetLoggerError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

/// Environment variable enabling log output in tests.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static INIT_TEST_TRACING: Once = Once::new();

/// Guard flushing buffered log lines when dropped.
///
/// Keep it alive for the whole lifetime of the process, otherwise log lines are lost.
pub type LogFlusher = WorkerGuard;

/// Errors that can occur while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to determine the runtime environment: {0}")]
    Environment(#[from] std::io::Error),

    #[error("failed to install the `log` bridge: {0}")]
    LogTracer(#[from] SetLoggerError),

    #[error("failed to install the global tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Installs the global tracing subscriber for `app_name`.
///
/// Log lines are written to stdout through a non-blocking writer, as JSON in `prod` and in a
/// human readable format in `dev`. The filter defaults to `info` for the application and the
/// sink crate and can be overridden with `RUST_LOG`. Records emitted through the `log` crate
/// by HTTP and auth dependencies are forwarded to tracing.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let environment = Environment::load()?;

    tracing_log::LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}=info,bqsink=info", crate_target(app_name))));

    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    match environment {
        Environment::Prod => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(writer),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        Environment::Dev => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(writer));
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(guard)
}

/// Installs a test subscriber once per process when `ENABLE_TRACING` is set.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TRACING_ENV_NAME).is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer());

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Binary names use dashes while tracing targets use the crate path with underscores.
fn crate_target(app_name: &str) -> String {
    app_name.replace('-', "_")
}
