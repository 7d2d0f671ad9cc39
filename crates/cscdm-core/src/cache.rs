//! Zone snapshot cache with request coalescing
//!
//! Concurrent misses for the same zone share one `GET /zones/{zoneName}`.
//! Each zone carries an epoch that [`ZoneCache::invalidate`] bumps; fetches
//! are coalesced per (zone, epoch), and a fetch only stores its result if the
//! epoch is unchanged when it completes. A read issued after an invalidation
//! therefore never joins, or is answered by, a fetch that started before it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::ZoneApi;
use crate::zone::Zone;

type FetchResult = std::result::Result<Arc<Zone>, Error>;

/// Role of a caller in a coalesced fetch
enum Flight {
    /// First caller: performs the fetch and broadcasts the outcome
    Leader(broadcast::Sender<FetchResult>),
    /// Later caller: waits for the leader's outcome
    Follower(broadcast::Receiver<FetchResult>),
}

/// In-flight fetches keyed by `K`
struct Singleflight<K: Hash + Eq> {
    in_flight: DashMap<K, broadcast::Sender<FetchResult>>,
}

impl<K: Hash + Eq + Clone> Singleflight<K> {
    fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    fn join(&self, key: K) -> Flight {
        match self.in_flight.entry(key) {
            Entry::Occupied(entry) => Flight::Follower(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(1);
                entry.insert(tx.clone());
                Flight::Leader(tx)
            }
        }
    }

    fn land(&self, key: &K) {
        self.in_flight.remove(key);
    }
}

/// Removes the in-flight entry if the leader never lands (cancelled or panicked)
struct FlightGuard<'a, K: Hash + Eq + Clone> {
    flights: &'a Singleflight<K>,
    key: Option<K>,
}

impl<'a, K: Hash + Eq + Clone> FlightGuard<'a, K> {
    fn new(flights: &'a Singleflight<K>, key: K) -> Self {
        Self {
            flights,
            key: Some(key),
        }
    }

    fn land(mut self) {
        if let Some(key) = self.key.take() {
            self.flights.land(&key);
        }
    }
}

impl<K: Hash + Eq + Clone> Drop for FlightGuard<'_, K> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.flights.land(&key);
        }
    }
}

#[derive(Default)]
struct CacheState {
    zones: HashMap<String, Arc<Zone>>,
    epochs: HashMap<String, u64>,
}

impl CacheState {
    fn epoch(&self, zone_name: &str) -> u64 {
        self.epochs.get(zone_name).copied().unwrap_or(0)
    }
}

/// Cache of zone snapshots, fronting [`ZoneApi::fetch_zone`]
pub struct ZoneCache {
    api: Arc<dyn ZoneApi>,
    state: RwLock<CacheState>,
    flights: Singleflight<(String, u64)>,
}

impl ZoneCache {
    pub fn new(api: Arc<dyn ZoneApi>) -> Self {
        Self {
            api,
            state: RwLock::new(CacheState::default()),
            flights: Singleflight::new(),
        }
    }

    /// Cached snapshot of `zone_name`, fetching it on a miss
    ///
    /// Concurrent misses share one fetch. Failures are not cached.
    pub async fn get(&self, zone_name: &str) -> Result<Arc<Zone>> {
        let epoch = {
            let state = self.state.read().await;
            if let Some(zone) = state.zones.get(zone_name) {
                debug!("Zone cache hit for {}", zone_name);
                return Ok(Arc::clone(zone));
            }
            state.epoch(zone_name)
        };

        let flight_key = (zone_name.to_string(), epoch);
        match self.flights.join(flight_key.clone()) {
            Flight::Leader(tx) => {
                let guard = FlightGuard::new(&self.flights, flight_key);

                // an earlier leader may have stored it since our read
                let result = match self.cached_at(zone_name, epoch).await {
                    Some(zone) => Ok(zone),
                    None => self.fetch_at(zone_name, epoch).await,
                };

                // land before broadcasting: later callers start a new flight
                // instead of subscribing to a channel that already fired
                guard.land();
                let _ = tx.send(result.clone());
                result
            }
            Flight::Follower(mut rx) => {
                debug!("Joining in-flight fetch of zone {}", zone_name);
                match rx.recv().await {
                    Ok(result) => result,
                    Err(_) => {
                        debug!("In-flight fetch of zone {} was abandoned, fetching directly", zone_name);
                        self.fetch(zone_name).await
                    }
                }
            }
        }
    }

    /// Fetch `zone_name` from the backend, bypassing the cache
    ///
    /// The result replaces the cached snapshot unless the zone is
    /// invalidated while the fetch is in flight.
    pub async fn fetch(&self, zone_name: &str) -> Result<Arc<Zone>> {
        let epoch = self.state.read().await.epoch(zone_name);
        self.fetch_at(zone_name, epoch).await
    }

    async fn fetch_at(&self, zone_name: &str, epoch: u64) -> Result<Arc<Zone>> {
        debug!("Fetching zone {} from {}", zone_name, self.api.api_name());
        let zone = Arc::new(self.api.fetch_zone(zone_name).await?);

        let mut state = self.state.write().await;
        if state.epoch(zone_name) == epoch {
            state.zones.insert(zone_name.to_string(), Arc::clone(&zone));
        } else {
            debug!("Zone {} was invalidated during fetch, not caching", zone_name);
        }
        Ok(zone)
    }

    async fn cached_at(&self, zone_name: &str, epoch: u64) -> Option<Arc<Zone>> {
        let state = self.state.read().await;
        if state.epoch(zone_name) != epoch {
            return None;
        }
        state.zones.get(zone_name).cloned()
    }

    /// Drop the cached snapshot of `zone_name`
    ///
    /// Fetches already in flight will not repopulate the cache.
    pub async fn invalidate(&self, zone_name: &str) {
        let mut state = self.state.write().await;
        state.zones.remove(zone_name);
        *state.epochs.entry(zone_name.to_string()).or_insert(0) += 1;
        debug!("Invalidated zone cache for {}", zone_name);
    }

    /// Whether a snapshot of `zone_name` is cached
    pub async fn contains(&self, zone_name: &str) -> bool {
        self.state.read().await.zones.contains_key(zone_name)
    }

    /// Number of cached snapshots
    pub async fn len(&self) -> usize {
        self.state.read().await.zones.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ZoneEditRequest;
    use crate::traits::{EditStatus, SubmitOutcome};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves `Zone::new(name)` with a serial equal to the fetch count
    struct CountingApi {
        fetches: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingApi {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                delay,
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: true,
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ZoneApi for CountingApi {
        async fn submit_zone_edit(&self, _request: &ZoneEditRequest) -> Result<SubmitOutcome> {
            unreachable!()
        }

        async fn zone_edit_status(&self, _edit_id: &str) -> Result<EditStatus> {
            unreachable!()
        }

        async fn cancel_zone_edit(&self, _edit_id: &str) -> Result<()> {
            unreachable!()
        }

        async fn fetch_zone(&self, zone_name: &str) -> Result<Zone> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(Error::http(500, "backend unavailable"));
            }
            let mut zone = Zone::new(zone_name);
            zone.soa.serial = n as i64;
            Ok(zone)
        }

        async fn list_zones(&self) -> Result<Vec<Zone>> {
            Ok(Vec::new())
        }

        fn api_name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_get_caches_snapshot() {
        let api = CountingApi::new(Duration::ZERO);
        let cache = ZoneCache::new(api.clone());

        let first = cache.get("example.com").await.unwrap();
        let second = cache.get("example.com").await.unwrap();

        assert_eq!(api.fetches(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.contains("example.com").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_fetch() {
        let api = CountingApi::new(Duration::from_millis(100));
        let cache = Arc::new(ZoneCache::new(api.clone()));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.get("example.com").await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().soa.serial, 1);
        }

        assert_eq!(api.fetches(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let api = CountingApi::new(Duration::ZERO);
        let cache = ZoneCache::new(api.clone());

        cache.get("example.com").await.unwrap();
        cache.invalidate("example.com").await;
        assert!(!cache.contains("example.com").await);

        let zone = cache.get("example.com").await.unwrap();
        assert_eq!(zone.soa.serial, 2);
        assert_eq!(api.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_after_invalidate_does_not_join_stale_fetch() {
        let api = CountingApi::new(Duration::from_millis(100));
        let cache = Arc::new(ZoneCache::new(api.clone()));

        let stale = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("example.com").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        cache.invalidate("example.com").await;
        let fresh = cache.get("example.com").await.unwrap();
        assert_eq!(fresh.soa.serial, 2);

        assert_eq!(stale.await.unwrap().unwrap().soa.serial, 1);
        // the pre-invalidation result never reached the cache
        assert_eq!(cache.get("example.com").await.unwrap().soa.serial, 2);
        assert_eq!(api.fetches(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let api = CountingApi::failing();
        let cache = ZoneCache::new(api.clone());

        assert!(matches!(
            cache.get("example.com").await,
            Err(Error::Http { status: 500, .. })
        ));
        assert!(cache.get("example.com").await.is_err());
        assert_eq!(api.fetches(), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_fetch_bypasses_cache() {
        let api = CountingApi::new(Duration::ZERO);
        let cache = ZoneCache::new(api.clone());

        cache.get("example.com").await.unwrap();
        let refreshed = cache.fetch("example.com").await.unwrap();
        assert_eq!(refreshed.soa.serial, 2);
        assert_eq!(cache.get("example.com").await.unwrap().soa.serial, 2);
    }
}
