//! Configuration for the BigQuery log sink.
//!
//! [`shared`] holds the typed configuration structures consumed by the sink and the shipper,
//! [`load`] assembles them from configuration files and environment variables.

pub mod environment;
pub mod load;
pub mod shared;
