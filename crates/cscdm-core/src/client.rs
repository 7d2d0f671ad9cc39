//! Client facade over the batching dispatcher
//!
//! [`CscdmClient`] is what callers hold. Each [`CscdmClient::perform_record_action`]
//! call parks its action in the shared queue and waits for the flush that
//! carries it to resolve the result.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::cache::ZoneCache;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::queue::BatchQueue;
use crate::record::RecordAction;
use crate::router::ResultRouter;
use crate::scheduler::{FlushScheduler, FlushTrigger, SchedulerHandle};
use crate::submitter::ZoneEditSubmitter;
use crate::traits::ZoneApi;
use crate::zone::{Zone, ZoneRecord};

/// Batching client for the zone edit API
///
/// Share it across tasks with `Arc`. Call [`CscdmClient::stop`] before
/// dropping it to wait for the flush loop to exit; dropping without
/// stopping only signals the loop.
pub struct CscdmClient {
    api: Arc<dyn ZoneApi>,
    cache: Arc<ZoneCache>,
    queue: Arc<BatchQueue>,
    router: Arc<ResultRouter>,
    trigger: FlushTrigger,
    scheduler: SchedulerHandle,
}

impl CscdmClient {
    /// Build a client over `api` and start its flush loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn configure(api: Arc<dyn ZoneApi>, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::config(
                "CscdmClient must be configured from within a tokio runtime",
            ));
        }

        let router = Arc::new(ResultRouter::new());
        let cache = Arc::new(ZoneCache::new(Arc::clone(&api)));
        let (trigger, signals) = FlushTrigger::channel();
        let queue = Arc::new(BatchQueue::new(
            Arc::clone(&router),
            trigger.clone(),
            config.max_batch_size,
        ));

        let submitter = ZoneEditSubmitter::new(
            Arc::clone(&api),
            Arc::clone(&cache),
            Arc::clone(&router),
            Arc::clone(&queue),
            config.poll_interval(),
        );
        let scheduler = FlushScheduler::new(Arc::new(submitter), signals, &config).spawn();

        info!(
            "Configured {} client (flush idle {:?}, poll interval {:?})",
            api.api_name(),
            config.flush_idle(),
            config.poll_interval()
        );

        Ok(Self {
            api,
            cache,
            queue,
            router,
            trigger,
            scheduler,
        })
    }

    /// Queue `action` and wait for its outcome
    ///
    /// Resolves with the record as it exists after the edit, `None` for a
    /// completed PURGE, or the error that prevented it.
    pub async fn perform_record_action(&self, action: RecordAction) -> Result<Option<ZoneRecord>> {
        action.validate()?;
        if self.scheduler.is_stopping() {
            return Err(Error::Stopped);
        }

        let description = format!(
            "{} {} '{}' in zone {}",
            action.action,
            action.record_type,
            action.key_id(),
            action.zone_name
        );

        let (tx, rx) = oneshot::channel();
        self.queue.enqueue(action, tx);

        // stop raced with the enqueue; nothing will flush it now
        if self.scheduler.is_stopping() {
            self.queue.drain().reject(&Error::Stopped);
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::channel_closed(format!(
                "result channel closed for {}; check warning logs",
                description
            ))),
        }
    }

    /// Zone snapshot, served from the cache when possible
    pub async fn get_zone(&self, zone_name: &str) -> Result<Arc<Zone>> {
        if zone_name.is_empty() {
            return Err(Error::invalid_input("zone name cannot be empty"));
        }
        self.cache.get(zone_name).await
    }

    /// Zone snapshot fetched from the backend, refreshing the cache
    pub async fn fetch_zone(&self, zone_name: &str) -> Result<Arc<Zone>> {
        if zone_name.is_empty() {
            return Err(Error::invalid_input("zone name cannot be empty"));
        }
        self.cache.fetch(zone_name).await
    }

    /// Every zone visible to the account (not cached)
    pub async fn list_zones(&self) -> Result<Vec<Zone>> {
        self.api.list_zones().await
    }

    /// Flush the queue without waiting for the idle timer
    pub fn flush_now(&self) {
        debug!("Immediate flush requested");
        self.trigger.flush_now();
    }

    /// Stop the flush loop and reject anything still queued
    ///
    /// Idempotent. A flush already in flight runs to completion and still
    /// delivers its results.
    pub async fn stop(&self) {
        self.scheduler.stop().await;
        let rejected = self.queue.drain().reject(&Error::Stopped);
        if rejected > 0 {
            info!("Rejected {} queued record action(s) on stop", rejected);
        }
    }

    /// Whether [`CscdmClient::stop`] has been called (or the client dropped)
    pub fn is_stopped(&self) -> bool {
        self.scheduler.is_stopping()
    }

    /// Callers still waiting for a result
    pub fn pending_requests(&self) -> usize {
        self.router.pending_count()
    }

    /// Actions waiting for the next flush
    pub fn queued_actions(&self) -> usize {
        self.queue.len()
    }
}
