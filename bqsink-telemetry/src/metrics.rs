use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::info;

/// Installs the global Prometheus recorder and serves `/metrics` on `[::]:{port}`.
///
/// The HTTP listener runs on the current Tokio runtime when there is one, otherwise on a
/// background thread owning its own runtime. Fails when a global recorder is installed already.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    let address = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);

    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;

    info!(%address, "prometheus metrics exporter listening");

    Ok(())
}
