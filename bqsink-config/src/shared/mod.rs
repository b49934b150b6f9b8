//! Shared configuration types for the BigQuery log sink.

mod base;
mod buffering;
mod retry;
mod service_account;
mod shipper;
mod sink;

pub use base::ValidationError;
pub use buffering::BufferingConfig;
pub use retry::RetryConfig;
pub use service_account::{AuthMethod, DEFAULT_PRIVATE_KEY_PASSPHRASE, ServiceAccountConfig};
pub use shipper::ShipperConfig;
pub use sink::SinkConfig;
