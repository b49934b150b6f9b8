use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::diagnostics::{DiagnosticEvent, Diagnostics};

/// Default time to wait for an expected diagnostic.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`Diagnostics`] keeping every emitted event in memory.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the events emitted so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Counts the events matching `predicate`.
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&DiagnosticEvent) -> bool,
    {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    /// Waits until an event matching `predicate` was emitted.
    ///
    /// # Panics
    ///
    /// Panics when no matching event shows up within [`DEFAULT_WAIT_TIMEOUT`].
    pub async fn wait_for<F>(&self, predicate: F)
    where
        F: Fn(&DiagnosticEvent) -> bool,
    {
        let found = timeout(DEFAULT_WAIT_TIMEOUT, async {
            while self.count(&predicate) == 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        if found.is_err() {
            panic!(
                "no matching diagnostic within {DEFAULT_WAIT_TIMEOUT:?}, got {:?}",
                self.events()
            );
        }
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn emit(&self, event: DiagnosticEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
