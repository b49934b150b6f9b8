//! Cancellation signal shared by the sink, its coordinator and the insert pipeline.
//!
//! The signal is a watch channel holding `true` once cancellation was requested, so late
//! subscribers observe it as well.

use std::future::pending;

use tokio::sync::watch;

/// Transmitter side of the cancellation signal.
pub type ShutdownTx = watch::Sender<bool>;

/// Receiver side of the cancellation signal.
pub type ShutdownRx = watch::Receiver<bool>;

/// Creates a cancellation channel in the "running" state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    watch::channel(false)
}

/// Returns whether cancellation was already requested.
pub fn is_cancelled(shutdown_rx: &ShutdownRx) -> bool {
    *shutdown_rx.borrow()
}

/// Resolves once cancellation is requested.
///
/// Stays pending forever when the transmitter is dropped without cancelling.
pub async fn cancelled(shutdown_rx: &mut ShutdownRx) {
    if shutdown_rx.wait_for(|cancelled| *cancelled).await.is_err() {
        pending::<()>().await;
    }
}
