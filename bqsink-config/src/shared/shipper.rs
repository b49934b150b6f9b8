use serde::Deserialize;

use crate::shared::{SinkConfig, ValidationError};

/// Configuration of the `bqsink-shipper` binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ShipperConfig {
    pub sink: SinkConfig,
    /// Port of the Prometheus scrape endpoint. Metrics are not exported when unset.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl ShipperConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.sink.validate()?;

        if self.metrics_port == Some(0) {
            return Err(ValidationError::invalid(
                "metrics_port",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}
