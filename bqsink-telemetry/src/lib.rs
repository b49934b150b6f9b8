//! Logging and metrics setup shared by the sink binaries and tests.

pub mod metrics;
pub mod tracing;
