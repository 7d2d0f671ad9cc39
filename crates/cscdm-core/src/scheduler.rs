// # Flush Scheduler
//
// Decides WHEN the queue is flushed. WHAT a flush does lives behind the
// [`FlushHandler`] trait (implemented by the zone edit submitter).
//
// ## Signals
//
// ```text
// enqueue ──► schedule (mpsc, cap 1) ──► re-arm idle timer
// max_batch_size / flush_now() ──► now (mpsc, cap 1) ──► flush immediately
// stop() ──► watch<bool> ──► loop exits, in-flight flush is detached
// ```
//
// Both signal channels have capacity 1 and are written with `try_send`, so
// bursts coalesce into a single pending signal and producers never block.
//
// ## Timing
//
// - Every schedule signal restarts the idle timer (debounce).
// - `max_flush_delay` bounds how long a stream of signals can postpone a
//   flush, measured from the first signal after the previous flush.
// - Each flush runs as its own task. While it runs the loop only watches
//   for stop; signals arriving meanwhile stay buffered and are picked up
//   on the next iteration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::error::Result;

/// What one flush accomplished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Zones that had at least one queued action
    pub zones: usize,
    /// Actions drained from the queue
    pub actions: usize,
}

/// Performs one flush of the queue
#[async_trait]
pub trait FlushHandler: Send + Sync + 'static {
    async fn flush(&self) -> Result<FlushSummary>;
}

/// Producer side of the scheduler's signal channels
#[derive(Debug, Clone)]
pub struct FlushTrigger {
    schedule_tx: mpsc::Sender<()>,
    now_tx: mpsc::Sender<()>,
}

/// Consumer side of the scheduler's signal channels
#[derive(Debug)]
pub struct FlushSignals {
    pub(crate) schedule_rx: mpsc::Receiver<()>,
    pub(crate) now_rx: mpsc::Receiver<()>,
}

impl FlushTrigger {
    /// Create a connected trigger/signals pair
    pub fn channel() -> (FlushTrigger, FlushSignals) {
        let (schedule_tx, schedule_rx) = mpsc::channel(1);
        let (now_tx, now_rx) = mpsc::channel(1);
        (
            FlushTrigger {
                schedule_tx,
                now_tx,
            },
            FlushSignals {
                schedule_rx,
                now_rx,
            },
        )
    }

    /// New work was queued; (re)start the idle timer
    pub fn schedule(&self) {
        signal(&self.schedule_tx, "schedule");
    }

    /// Flush without waiting for the idle timer
    pub fn flush_now(&self) {
        signal(&self.now_tx, "flush-now");
    }
}

fn signal(tx: &mpsc::Sender<()>, kind: &str) {
    match tx.try_send(()) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(())) => {
            debug!("{} signal already pending, coalescing", kind);
        }
        Err(mpsc::error::TrySendError::Closed(())) => {
            debug!("Flush scheduler is gone, dropping {} signal", kind);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FlushReason {
    Idle,
    MaxDelay,
    Requested,
}

impl FlushReason {
    fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Idle => "idle",
            FlushReason::MaxDelay => "max-delay",
            FlushReason::Requested => "requested",
        }
    }
}

/// Background flush loop
pub struct FlushScheduler {
    handler: Arc<dyn FlushHandler>,
    signals: FlushSignals,
    flush_idle: Duration,
    max_flush_delay: Duration,
}

impl FlushScheduler {
    pub fn new(handler: Arc<dyn FlushHandler>, signals: FlushSignals, config: &ClientConfig) -> Self {
        Self {
            handler,
            signals,
            flush_idle: config.flush_idle(),
            max_flush_delay: config.max_flush_delay(),
        }
    }

    /// Start the loop on the current tokio runtime
    pub fn spawn(self) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (stopped_tx, stopped_rx) = watch::channel(false);

        tokio::spawn(self.run(stop_rx, stopped_tx));

        SchedulerHandle {
            stop_tx,
            stopped_rx,
            stopping: AtomicBool::new(false),
        }
    }

    async fn run(mut self, mut stop_rx: watch::Receiver<bool>, stopped_tx: watch::Sender<bool>) {
        info!(
            "Flush scheduler started (idle {:?}, max delay {:?})",
            self.flush_idle, self.max_flush_delay
        );

        let mut deadline: Option<Instant> = None;
        let mut cycles: u64 = 0;

        loop {
            let idle = sleep(self.flush_idle);
            tokio::pin!(idle);
            let cap = sleep_until(deadline.unwrap_or_else(Instant::now));
            tokio::pin!(cap);

            let reason = tokio::select! {
                biased;

                _ = stop_rx.changed() => break,

                Some(()) = self.signals.now_rx.recv() => FlushReason::Requested,

                Some(()) = self.signals.schedule_rx.recv() => {
                    deadline.get_or_insert_with(|| Instant::now() + self.max_flush_delay);
                    continue;
                }

                _ = &mut cap, if deadline.is_some() => FlushReason::MaxDelay,

                _ = &mut idle => FlushReason::Idle,
            };

            deadline = None;
            cycles += 1;
            debug!("Flush cycle {} ({})", cycles, reason.as_str());

            let handler = Arc::clone(&self.handler);
            let mut flush = tokio::spawn(async move { handler.flush().await });

            tokio::select! {
                biased;

                joined = &mut flush => log_flush(joined),

                _ = stop_rx.changed() => {
                    info!("Stop requested during flush; in-flight zone edits will run to completion");
                    break;
                }
            }
        }

        stopped_tx.send_replace(true);
        info!("Flush scheduler stopped after {} flush cycle(s)", cycles);
    }
}

fn log_flush(joined: std::result::Result<Result<FlushSummary>, JoinError>) {
    match joined {
        Ok(Ok(summary)) if summary.actions > 0 => {
            info!(
                "Flushed {} record action(s) across {} zone(s)",
                summary.actions, summary.zones
            );
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => error!("Failed to flush queue: {}", e),
        Err(e) => error!("Flush task panicked: {}", e),
    }
}

/// Control handle for a running [`FlushScheduler`]
///
/// Dropping the handle signals stop without waiting for it.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    stopped_rx: watch::Receiver<bool>,
    stopping: AtomicBool,
}

impl SchedulerHandle {
    /// Signal the loop to stop; returns false if stop was already signalled
    pub fn signal_stop(&self) -> bool {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!("Stopping flush scheduler");
        self.stop_tx.send_replace(true);
        true
    }

    /// Signal stop and wait until the loop has exited
    ///
    /// Safe to call any number of times, concurrently. Does not wait for a
    /// flush that was already in flight.
    pub async fn stop(&self) {
        self.signal_stop();
        let mut stopped = self.stopped_rx.clone();
        // Err means the loop task is gone, which is just as stopped
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }

    /// Whether stop has been signalled
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Whether the loop has exited
    pub fn is_stopped(&self) -> bool {
        *self.stopped_rx.borrow()
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.signal_stop();
    }
}
