//! Test helpers for exercising the sink without BigQuery.
//!
//! - [`warehouse`] scripts warehouse responses and records every call.
//! - [`diagnostics`] records emitted diagnostic events and waits for them.
//! - [`event`] and [`schema`] build the events and schemas most tests need.

pub mod diagnostics;
pub mod event;
pub mod schema;
pub mod warehouse;
