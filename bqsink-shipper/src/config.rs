use bqsink_config::load::load_config;
use bqsink_config::shared::ShipperConfig;

/// Loads and validates the shipper configuration.
pub fn load_shipper_config() -> anyhow::Result<ShipperConfig> {
    let config = load_config::<ShipperConfig>()?;
    config.validate()?;

    Ok(config)
}
