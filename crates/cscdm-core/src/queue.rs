//! Pending record actions awaiting the next flush
//!
//! Lock order: the queue lock is taken before the router lock, never the
//! other way round.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::Error;
use crate::record::{CorrelationKey, RecordAction};
use crate::router::{ResultRouter, ResultSender};
use crate::scheduler::FlushTrigger;

/// An action together with the router registration made for it
#[derive(Debug, Clone)]
pub struct QueuedAction {
    pub action: RecordAction,
    pub key: CorrelationKey,
    pub ticket: u64,
}

/// Ordered queue of record actions
pub struct BatchQueue {
    actions: Mutex<Vec<QueuedAction>>,
    router: Arc<ResultRouter>,
    trigger: FlushTrigger,
    max_batch_size: Option<usize>,
}

impl BatchQueue {
    pub fn new(router: Arc<ResultRouter>, trigger: FlushTrigger, max_batch_size: Option<usize>) -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            router,
            trigger,
            max_batch_size,
        }
    }

    fn actions(&self) -> MutexGuard<'_, Vec<QueuedAction>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `tx` for the action's result and append the action
    ///
    /// Registration and append happen under the queue lock, so a drain can
    /// never observe the action without its result slot.
    pub fn enqueue(&self, action: RecordAction, tx: ResultSender) {
        let key = action.correlation_key();

        let queued = {
            let mut actions = self.actions();

            // an identical request still waiting here is replaced, not sent twice
            if let Some(i) = actions.iter().position(|q| q.key == key) {
                let superseded = actions.remove(i);
                self.router.reject(
                    [(&superseded.key, superseded.ticket)],
                    &Error::invalid_input(format!(
                        "superseded by a newer identical request for {}; not submitted",
                        key
                    )),
                );
                debug!("Replaced queued {} (ticket {})", key, superseded.ticket);
            }

            let ticket = self.router.register(key.clone(), tx);
            debug!("Queued {} {} (ticket {})", action.action, key, ticket);
            actions.push(QueuedAction {
                action,
                key,
                ticket,
            });
            actions.len()
        };

        if self.max_batch_size.is_some_and(|max| queued >= max) {
            debug!("Queue reached {} action(s), requesting immediate flush", queued);
            self.trigger.flush_now();
        } else {
            self.trigger.schedule();
        }
    }

    /// Take every queued action, leaving the queue empty
    pub fn drain(&self) -> DrainedBatch {
        let actions = std::mem::take(&mut *self.actions());
        DrainedBatch {
            actions,
            router: Arc::clone(&self.router),
        }
    }

    pub fn len(&self) -> usize {
        self.actions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions().is_empty()
    }
}

/// Actions taken from the queue by one flush
///
/// When the batch is dropped, any of its callers that were never resolved
/// have their result channels closed.
pub struct DrainedBatch {
    actions: Vec<QueuedAction>,
    router: Arc<ResultRouter>,
}

impl DrainedBatch {
    pub fn actions(&self) -> &[QueuedAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Tickets covered by this batch; empty range for an empty batch
    pub fn ticket_range(&self) -> RangeInclusive<u64> {
        let min = self.actions.iter().map(|q| q.ticket).min();
        let max = self.actions.iter().map(|q| q.ticket).max();
        match (min, max) {
            (Some(min), Some(max)) => min..=max,
            #[allow(clippy::reversed_empty_ranges)]
            _ => 1..=0,
        }
    }

    /// Resolve every still-pending caller of this batch with `err`
    pub fn reject(self, err: &Error) -> usize {
        self.router
            .reject(self.actions.iter().map(|q| (&q.key, q.ticket)), err)
    }
}

impl Drop for DrainedBatch {
    fn drop(&mut self) {
        let closed = self
            .router
            .abandon(self.actions.iter().map(|q| (&q.key, q.ticket)));
        if closed > 0 {
            warn!("Closed {} unresolved result channel(s) after flush", closed);
        }
    }
}
