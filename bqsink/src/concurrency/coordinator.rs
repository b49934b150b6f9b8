//! Buffering coordinator.
//!
//! A single task owns the event buffer and the [`Publisher`]. Producers talk to it through a
//! [`CoordinatorHandle`]; events, manual flushes, the interval timer and cancellation all
//! converge on one `tokio::select!` loop, so at most one publish cycle is in flight.

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bqsink_config::shared::BufferingConfig;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::bail;
use crate::concurrency::shutdown::{ShutdownRx, cancelled};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{ErrorKind, SinkResult};
use crate::insert::Publisher;
use crate::types::EventRecord;

/// Number of consecutive failed publishes after which a retained batch is dropped.
pub const MAX_BATCH_FAILURES: u32 = 3;

#[derive(Debug)]
enum Command {
    Event(EventRecord),
    Flush {
        response_tx: oneshot::Sender<SinkResult<usize>>,
    },
}

/// Producer side of a [`BufferingCoordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
    outstanding: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
    max_buffer_size: usize,
}

impl CoordinatorHandle {
    /// Hands `event` to the coordinator without waiting.
    ///
    /// Returns `false` when the event was dropped, either because the outstanding cap is
    /// reached or because the coordinator stopped.
    pub fn submit(&self, event: EventRecord) -> bool {
        let reserved = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |outstanding| {
                (outstanding < self.max_buffer_size).then_some(outstanding + 1)
            })
            .is_ok();

        if !reserved {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if self.tx.send(Command::Event(event)).is_err() {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            return false;
        }

        true
    }

    /// Publishes everything buffered so far and waits for the publish cycle to finish.
    ///
    /// Returns the number of rows the warehouse accepted during the cycle.
    pub async fn flush(&self) -> SinkResult<usize> {
        let (response_tx, response_rx) = oneshot::channel();
        if self.tx.send(Command::Flush { response_tx }).is_err() {
            bail!(ErrorKind::InvalidState, "The buffering coordinator is not running");
        }

        match response_rx.await {
            Ok(result) => result,
            Err(_) => bail!(
                ErrorKind::InvalidState,
                "The buffering coordinator stopped before completing the flush"
            ),
        }
    }

    /// Number of events accepted but not yet published or dropped.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

/// A batch whose publish failed, kept to be retried as a unit.
#[derive(Debug)]
struct RetainedBatch {
    events: Vec<EventRecord>,
    failures: u32,
}

#[derive(Debug)]
struct CoordinatorState<P> {
    publisher: P,
    buffer: Vec<EventRecord>,
    retained: Option<RetainedBatch>,
    count: usize,
    outstanding: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl<P> CoordinatorState<P>
where
    P: Publisher,
{
    fn push(&mut self, event: EventRecord) {
        self.buffer.push(event);
    }

    fn threshold_reached(&self) -> bool {
        self.retained.is_none() && self.buffer.len() >= self.count
    }

    /// Publishes the retained batch, if any, then the buffer.
    ///
    /// A failing retained batch stops the cycle so that batches reach the warehouse in order.
    async fn publish_cycle(&mut self) -> SinkResult<usize> {
        self.report_dropped();

        let mut published = 0;

        if let Some(mut retained) = self.retained.take() {
            match self.publisher.publish(&retained.events).await {
                Ok(inserted) => {
                    self.release(retained.events.len());
                    published += inserted;
                }
                Err(err) => {
                    retained.failures += 1;
                    self.handle_failure(retained, &err.to_string());
                    return Err(err);
                }
            }
        }

        if self.buffer.is_empty() {
            return Ok(published);
        }

        let events = mem::take(&mut self.buffer);
        match self.publisher.publish(&events).await {
            Ok(inserted) => {
                self.release(events.len());
                Ok(published + inserted)
            }
            Err(err) => {
                let retained = RetainedBatch {
                    events,
                    failures: 1,
                };
                self.handle_failure(retained, &err.to_string());
                Err(err)
            }
        }
    }

    fn handle_failure(&mut self, retained: RetainedBatch, message: &str) {
        self.diagnostics.emit(DiagnosticEvent::UnexpectedError {
            message: message.to_owned(),
        });

        if retained.failures >= MAX_BATCH_FAILURES {
            let count = retained.events.len();
            self.diagnostics.emit(DiagnosticEvent::UnexpectedError {
                message: format!(
                    "dropping a batch of {count} events after {} failed publishes",
                    retained.failures
                ),
            });
            self.release(count);
        } else {
            debug!(
                events = retained.events.len(),
                failures = retained.failures,
                "batch retained for the next publish cycle"
            );
            self.retained = Some(retained);
        }
    }

    fn report_dropped(&self) {
        let count = self.dropped.swap(0, Ordering::Relaxed);
        if count > 0 {
            self.diagnostics
                .emit(DiagnosticEvent::EventsDropped { count });
        }
    }

    fn release(&self, count: usize) {
        self.outstanding.fetch_sub(count, Ordering::AcqRel);
    }

    fn pending(&self) -> usize {
        self.buffer.len()
            + self
                .retained
                .as_ref()
                .map(|retained| retained.events.len())
                .unwrap_or(0)
    }
}

/// Task accumulating events and driving a [`Publisher`].
///
/// A publish cycle runs when the interval elapses, when `count` events are buffered, on a
/// manual flush and once all handles are dropped. Cancellation stops the task without
/// publishing what is left.
#[derive(Debug)]
pub struct BufferingCoordinator<P> {
    state: CoordinatorState<P>,
    rx: mpsc::UnboundedReceiver<Command>,
    period: Duration,
    shutdown_rx: ShutdownRx,
}

impl<P> BufferingCoordinator<P>
where
    P: Publisher + Send + 'static,
{
    pub fn new(
        publisher: P,
        config: &BufferingConfig,
        diagnostics: Arc<dyn Diagnostics>,
        shutdown_rx: ShutdownRx,
    ) -> (Self, CoordinatorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let outstanding = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));

        let handle = CoordinatorHandle {
            tx,
            outstanding: outstanding.clone(),
            dropped: dropped.clone(),
            max_buffer_size: config.max_buffer_size,
        };

        let coordinator = Self {
            state: CoordinatorState {
                publisher,
                buffer: Vec::new(),
                retained: None,
                count: config.count.max(1),
                outstanding,
                dropped,
                diagnostics,
            },
            rx,
            period: config.interval(),
            shutdown_rx,
        };

        (coordinator, handle)
    }

    /// Spawns the coordinator loop on the current runtime.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let Self {
            mut state,
            mut rx,
            period,
            mut shutdown_rx,
        } = self;

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(?period, count = state.count, "buffering coordinator started");

        loop {
            tokio::select! {
                biased;

                _ = cancelled(&mut shutdown_rx) => {
                    info!(discarded = state.pending(), "buffering coordinator cancelled");
                    break;
                }

                command = rx.recv() => {
                    match command {
                        Some(Command::Event(event)) => {
                            state.push(event);
                            if state.threshold_reached() {
                                // Failures are reported and the batch retained by the cycle.
                                let _ = state.publish_cycle().await;
                            }
                        }
                        Some(Command::Flush { response_tx }) => {
                            let result = state.publish_cycle().await;
                            if response_tx.send(result).is_err() {
                                debug!("flush requester went away before the cycle completed");
                            }
                        }
                        None => {
                            if let Err(err) = state.publish_cycle().await {
                                warn!(error = %err, "final publish cycle failed");
                            }
                            break;
                        }
                    }
                }

                _ = ticker.tick() => {
                    let _ = state.publish_cycle().await;
                }
            }
        }

        info!("buffering coordinator stopped");
    }
}
