//! Result routing for pending callers
//!
//! Every caller blocked in [`CscdmClient::perform_record_action`] owns the
//! receiving half of a oneshot channel. The sending half is registered here
//! under the caller's [`CorrelationKey`] together with a ticket, and the
//! flush logic resolves it exactly once: a slot is removed from the map
//! before it is written, and a oneshot can only be written once.
//!
//! Tickets increase monotonically in enqueue order. A drained batch carries
//! the ticket range it covers, which lets zone-wide error fan-out skip
//! callers that were enqueued after the batch was taken.
//!
//! [`CscdmClient::perform_record_action`]: crate::client::CscdmClient::perform_record_action

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::{CorrelationKey, RecordType};
use crate::zone::ZoneRecord;

/// What a caller eventually receives: a record, `None` for a completed
/// PURGE, or an error
pub type RecordOutcome = Result<Option<ZoneRecord>>;

/// Write end of a caller's result channel
pub type ResultSender = oneshot::Sender<RecordOutcome>;

struct PendingSlot {
    ticket: u64,
    tx: ResultSender,
}

/// Correlation key → result destination bookkeeping
#[derive(Default)]
pub struct ResultRouter {
    slots: Mutex<HashMap<CorrelationKey, PendingSlot>>,
    next_ticket: AtomicU64,
}

impl ResultRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CorrelationKey, PendingSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a result destination and return its ticket
    ///
    /// A duplicate key replaces the earlier registration; the displaced
    /// caller is told so instead of being left waiting.
    pub fn register(&self, key: CorrelationKey, tx: ResultSender) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let displaced = self.slots().insert(key.clone(), PendingSlot { ticket, tx });

        if let Some(previous) = displaced {
            warn!("Duplicate pending request for {}, last registration wins", key);
            let _ = previous.tx.send(Err(Error::invalid_input(format!(
                "superseded by a newer identical request for {}; the earlier edit was already submitted and its outcome goes to the newer request",
                key
            ))));
        }

        ticket
    }

    /// Deliver a record (or `None` for a deletion) to the caller waiting on `key`
    pub fn deliver_result(&self, key: &CorrelationKey, record: Option<ZoneRecord>) -> Result<()> {
        self.deliver(key, Ok(record))
    }

    /// Deliver an error to the caller waiting on `key`
    pub fn deliver_error(&self, key: &CorrelationKey, err: Error) -> Result<()> {
        self.deliver(key, Err(err))
    }

    fn deliver(&self, key: &CorrelationKey, outcome: RecordOutcome) -> Result<()> {
        let slot = self
            .slots()
            .remove(key)
            .ok_or_else(|| Error::MissingSlot(key.to_string()))?;

        if slot.tx.send(outcome).is_err() {
            debug!("Caller for {} went away before its result arrived", key);
        }
        Ok(())
    }

    /// Deliver `err` to every caller in `zone` whose ticket is in `tickets`
    ///
    /// Returns the number of callers reached.
    pub fn deliver_error_to_zone(&self, zone: &str, tickets: &RangeInclusive<u64>, err: &Error) -> usize {
        self.fan_out(zone, None, tickets, err)
    }

    /// Deliver `err` to every caller in `zone` with `record_type` whose ticket is in `tickets`
    pub fn deliver_error_to_zone_type(
        &self,
        zone: &str,
        record_type: RecordType,
        tickets: &RangeInclusive<u64>,
        err: &Error,
    ) -> usize {
        self.fan_out(zone, Some(record_type), tickets, err)
    }

    fn fan_out(
        &self,
        zone: &str,
        record_type: Option<RecordType>,
        tickets: &RangeInclusive<u64>,
        err: &Error,
    ) -> usize {
        // Snapshot matching keys, then remove them, all under one lock
        let taken: Vec<(CorrelationKey, PendingSlot)> = {
            let mut slots = self.slots();
            let matching: Vec<CorrelationKey> = slots
                .iter()
                .filter(|(key, slot)| key.matches(zone, record_type) && tickets.contains(&slot.ticket))
                .map(|(key, _)| key.clone())
                .collect();

            matching
                .into_iter()
                .filter_map(|key| slots.remove(&key).map(|slot| (key, slot)))
                .collect()
        };

        let count = taken.len();
        for (key, slot) in taken {
            if slot.tx.send(Err(err.clone())).is_err() {
                debug!("Caller for {} went away before its error arrived", key);
            }
        }
        count
    }

    /// Close the slots of `pending` that are still registered under the same ticket
    ///
    /// Their callers observe a closed channel. Returns how many were closed.
    pub fn abandon<'a>(&self, pending: impl IntoIterator<Item = (&'a CorrelationKey, u64)>) -> usize {
        self.take_tickets(pending).len()
    }

    /// Deliver `err` to the slots of `pending` still registered under the same ticket
    pub fn reject<'a>(
        &self,
        pending: impl IntoIterator<Item = (&'a CorrelationKey, u64)>,
        err: &Error,
    ) -> usize {
        let taken = self.take_tickets(pending);
        let count = taken.len();
        for slot in taken {
            let _ = slot.tx.send(Err(err.clone()));
        }
        count
    }

    fn take_tickets<'a>(
        &self,
        pending: impl IntoIterator<Item = (&'a CorrelationKey, u64)>,
    ) -> Vec<PendingSlot> {
        let mut slots = self.slots();
        let mut taken = Vec::new();
        for (key, ticket) in pending {
            if !slots.get(key).is_some_and(|slot| slot.ticket == ticket) {
                continue;
            }
            if let Some(slot) = slots.remove(key) {
                taken.push(slot);
            }
        }
        taken
    }

    /// Whether a caller is still waiting on `key`
    pub fn is_pending(&self, key: &CorrelationKey) -> bool {
        self.slots().contains_key(key)
    }

    /// Number of callers still waiting
    pub fn pending_count(&self) -> usize {
        self.slots().len()
    }
}
