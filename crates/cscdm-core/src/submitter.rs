// # Zone Edit Submitter
//
// Performs one flush: drain the queue, group actions by zone, and drive
// each zone's edit to completion concurrently.
//
// ## Per-zone lifecycle
//
// ```text
// submit ──OPEN_ZONE_EDITS──► sleep(poll_interval) ──► submit
//   │
//   ▼ accepted
// poll status ──PENDING──► sleep(poll_interval) ──► poll status
//   │            └─FAILED──► cancel ──► error to every caller of the zone
//   ▼ COMPLETED
// invalidate cache ──► PURGE callers get None
//                  ──► re-read zone ──► each remaining caller gets its record
// ```
//
// A zone's failure never affects another zone's callers. Errors for a zone
// only reach callers that belong to the drained batch; callers enqueued
// after the drain wait for the next flush.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::cache::ZoneCache;
use crate::error::{Error, Result};
use crate::queue::{BatchQueue, DrainedBatch};
use crate::record::{CorrelationKey, RecordActionKind, RecordType, ZoneEditRequest};
use crate::router::{RecordOutcome, ResultRouter};
use crate::scheduler::{FlushHandler, FlushSummary};
use crate::traits::{EditStatus, SubmitOutcome, ZoneApi};

/// One zone's share of a drained batch
struct ZoneBatch {
    request: ZoneEditRequest,
    /// Parallel to `request.edits`
    keys: Vec<CorrelationKey>,
    tickets: RangeInclusive<u64>,
}

impl ZoneBatch {
    fn zone(&self) -> &str {
        &self.request.zone_name
    }
}

/// Group a batch by zone, keeping zones and actions in enqueue order
fn group_by_zone(batch: &DrainedBatch) -> Vec<ZoneBatch> {
    let tickets = batch.ticket_range();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut zones: Vec<ZoneBatch> = Vec::new();

    for queued in batch.actions() {
        let zone_name = queued.action.zone_name.as_str();
        let i = *index.entry(zone_name).or_insert_with(|| {
            zones.push(ZoneBatch {
                request: ZoneEditRequest {
                    zone_name: zone_name.to_string(),
                    edits: Vec::new(),
                },
                keys: Vec::new(),
                tickets: tickets.clone(),
            });
            zones.len() - 1
        });

        zones[i].request.edits.push(queued.action.to_zone_edit());
        zones[i].keys.push(queued.key.clone());
    }

    zones
}

/// Drives queued record actions through the zone edit API
#[derive(Clone)]
pub struct ZoneEditSubmitter {
    api: Arc<dyn ZoneApi>,
    cache: Arc<ZoneCache>,
    router: Arc<ResultRouter>,
    queue: Arc<BatchQueue>,
    poll_interval: Duration,
}

impl ZoneEditSubmitter {
    pub fn new(
        api: Arc<dyn ZoneApi>,
        cache: Arc<ZoneCache>,
        router: Arc<ResultRouter>,
        queue: Arc<BatchQueue>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            api,
            cache,
            router,
            queue,
            poll_interval,
        }
    }

    /// Drain the queue and process every zone in it concurrently
    ///
    /// Returns once every zone has finished. Zone failures have already been
    /// delivered to their callers; they are aggregated into the returned
    /// error for logging.
    pub async fn flush(&self) -> Result<FlushSummary> {
        let batch = self.queue.drain();
        if batch.is_empty() {
            debug!("Queue is empty, nothing to flush");
            return Ok(FlushSummary::default());
        }

        let zones = group_by_zone(&batch);
        let summary = FlushSummary {
            zones: zones.len(),
            actions: batch.len(),
        };
        info!(
            "Submitting {} record action(s) across {} zone(s)",
            summary.actions, summary.zones
        );

        let mut tasks = JoinSet::new();
        for zone_batch in zones {
            let submitter = self.clone();
            tasks.spawn(async move { submitter.process_zone(zone_batch).await });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e.to_string()),
                Err(e) => {
                    error!("Zone edit task panicked: {}", e);
                    failures.push(format!("zone edit task panicked: {}", e));
                }
            }
        }

        // closes the channels of any caller a panicked task left behind
        drop(batch);

        if failures.is_empty() {
            Ok(summary)
        } else {
            Err(Error::Flush {
                failures: failures.len(),
                message: failures.join(", "),
            })
        }
    }

    async fn process_zone(&self, zone_batch: ZoneBatch) -> Result<()> {
        let zone = zone_batch.zone();

        let edit_id = match self.submit(&zone_batch.request).await {
            Ok(edit_id) => edit_id,
            Err(e) => {
                let err = e.in_zone(&format!("failed to edit zone {}", zone));
                return Err(self.fail_zone(&zone_batch, err));
            }
        };

        if let Err(e) = self.wait_for_completion(zone, &edit_id).await {
            let err = e.in_zone(&format!("failed to wait for {} zone edits", zone));
            return Err(self.fail_zone(&zone_batch, err));
        }

        info!("Zone edit {} for {} completed", edit_id, zone);
        self.cache.invalidate(zone).await;
        self.route_results(&zone_batch).await
    }

    /// Submit, retrying while another edit is open on the zone
    async fn submit(&self, request: &ZoneEditRequest) -> Result<String> {
        let mut conflicts = 0u32;
        loop {
            match self.api.submit_zone_edit(request).await? {
                SubmitOutcome::Accepted { edit_id } => {
                    debug!(
                        "Submitted {} edit(s) for zone {} as {}",
                        request.edits.len(),
                        request.zone_name,
                        edit_id
                    );
                    return Ok(edit_id);
                }
                SubmitOutcome::OpenZoneEdits => {
                    conflicts += 1;
                    warn!(
                        "Zone {} has open edits, retrying in {:?} (attempt {})",
                        request.zone_name, self.poll_interval, conflicts
                    );
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Poll the edit until it leaves PENDING; cancel it if it FAILED
    async fn wait_for_completion(&self, zone: &str, edit_id: &str) -> Result<()> {
        loop {
            match self.api.zone_edit_status(edit_id).await? {
                EditStatus::Completed => return Ok(()),
                EditStatus::Failed => {
                    warn!("Zone edit {} for {} failed, cancelling", edit_id, zone);
                    return Err(match self.api.cancel_zone_edit(edit_id).await {
                        Ok(()) => Error::edit_failed(
                            "zone edits returned status FAILED: successfully canceled zone edits",
                        ),
                        Err(e) => Error::edit_failed(format!(
                            "zone edits returned status FAILED: failed to cancel zone edits: {}",
                            e
                        )),
                    });
                }
                EditStatus::Pending => {
                    debug!("Zone edit {} for {} still pending", edit_id, zone);
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Deliver `err` to every caller of this zone batch and hand it back
    fn fail_zone(&self, zone_batch: &ZoneBatch, err: Error) -> Error {
        let reached = self
            .router
            .deliver_error_to_zone(zone_batch.zone(), &zone_batch.tickets, &err);
        warn!("{} (returned to {} caller(s))", err, reached);
        err
    }

    async fn route_results(&self, zone_batch: &ZoneBatch) -> Result<()> {
        let zone = zone_batch.zone();
        let mut by_type: BTreeMap<RecordType, Vec<&CorrelationKey>> = BTreeMap::new();

        for (edit, key) in zone_batch.request.edits.iter().zip(&zone_batch.keys) {
            if edit.action == RecordActionKind::Purge {
                self.route(key, Ok(None));
            } else {
                by_type.entry(edit.record_type).or_default().push(key);
            }
        }

        if by_type.is_empty() {
            return Ok(());
        }

        let snapshot = match self.cache.get(zone).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let err = e.in_zone(&format!("failed to read zone {} after edits", zone));
                return Err(self.fail_zone(zone_batch, err));
            }
        };

        let mut failures = Vec::new();
        for (record_type, keys) in by_type {
            if snapshot.records(record_type).is_none() {
                let err = Error::unsupported_record_type(format!(
                    "zone {} has no {} records",
                    zone, record_type
                ));
                let reached = self.router.deliver_error_to_zone_type(
                    zone,
                    record_type,
                    &zone_batch.tickets,
                    &err,
                );
                warn!("{} (returned to {} caller(s))", err, reached);
                failures.push(err.to_string());
                continue;
            }

            for key in keys {
                let outcome = match snapshot.record_by_identity(record_type, &key.key, &key.value) {
                    Some(record) => Ok(Some(record.clone())),
                    None => {
                        let err = Error::not_found(format!(
                            "{} record '{}' not found in zone {} after edit",
                            record_type, key.key, zone
                        ));
                        failures.push(err.to_string());
                        Err(err)
                    }
                };
                self.route(key, outcome);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Other(failures.join("; ")))
        }
    }

    fn route(&self, key: &CorrelationKey, outcome: RecordOutcome) {
        let delivered = match outcome {
            Ok(record) => self.router.deliver_result(key, record),
            Err(e) => self.router.deliver_error(key, e),
        };
        if let Err(e) = delivered {
            error!("{}; result dropped", e);
        }
    }
}

#[async_trait]
impl FlushHandler for ZoneEditSubmitter {
    async fn flush(&self) -> Result<FlushSummary> {
        ZoneEditSubmitter::flush(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordAction;
    use crate::scheduler::FlushTrigger;
    use tokio::sync::oneshot;

    fn queue_with(actions: Vec<RecordAction>) -> (BatchQueue, Vec<oneshot::Receiver<RecordOutcome>>) {
        let router = Arc::new(ResultRouter::new());
        let (trigger, _signals) = FlushTrigger::channel();
        let queue = BatchQueue::new(router, trigger, None);
        let receivers = actions
            .into_iter()
            .map(|action| {
                let (tx, rx) = oneshot::channel();
                queue.enqueue(action, tx);
                rx
            })
            .collect();
        (queue, receivers)
    }

    #[test]
    fn test_group_by_zone_preserves_order() {
        let (queue, _receivers) = queue_with(vec![
            RecordAction::add("b.com", RecordType::A, "www", "192.0.2.1"),
            RecordAction::add("a.com", RecordType::Txt, "_acme", "token"),
            RecordAction::purge("b.com", RecordType::Cname, "old", "target.b.com"),
        ]);

        let batch = queue.drain();
        let zones = group_by_zone(&batch);

        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].zone(), "b.com");
        assert_eq!(zones[0].request.edits.len(), 2);
        assert_eq!(zones[0].request.edits[1].action, RecordActionKind::Purge);
        assert_eq!(zones[0].keys[1].key, "old");
        assert_eq!(zones[1].zone(), "a.com");
        assert_eq!(zones[1].tickets, batch.ticket_range());
    }
}
