//! Test doubles and common utilities for dispatcher contract tests
//!
//! [`MockZoneApi`] is a scripted in-memory backend: it stores zones, applies
//! submitted edits when their status is first reported COMPLETED, and counts
//! every call so tests can assert on network traffic.

#![allow(dead_code)]

use async_trait::async_trait;
use cscdm_core::error::{Error, Result};
use cscdm_core::{
    ClientConfig, CscdmClient, EditStatus, RecordActionKind, RecordType, SubmitOutcome, Zone,
    ZoneApi, ZoneEdit, ZoneEditRequest, ZoneRecord,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct OpenEdit {
    request: ZoneEditRequest,
    polls_left: usize,
    fail: bool,
}

/// Scripted in-memory zone edit backend
pub struct MockZoneApi {
    zones: Mutex<HashMap<String, Zone>>,
    open_edits: Mutex<HashMap<String, OpenEdit>>,
    submitted: Mutex<Vec<ZoneEditRequest>>,
    /// Remaining OPEN_ZONE_EDITS answers per zone
    conflicts: Mutex<HashMap<String, usize>>,
    failing_zones: HashSet<String>,
    rejecting_zones: HashSet<String>,
    pending_polls: usize,
    fetch_delay: Duration,
    next_id: AtomicUsize,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MockZoneApi {
    pub fn new() -> Self {
        Self {
            zones: Mutex::new(HashMap::new()),
            open_edits: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            conflicts: Mutex::new(HashMap::new()),
            failing_zones: HashSet::new(),
            rejecting_zones: HashSet::new(),
            pending_polls: 0,
            fetch_delay: Duration::ZERO,
            next_id: AtomicUsize::new(1),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Add an empty zone with every editable record list present
    pub fn with_zone(self, zone_name: &str) -> Self {
        self.zones
            .lock()
            .unwrap()
            .insert(zone_name.to_string(), Zone::new(zone_name));
        self
    }

    /// Add an existing record to a zone
    pub fn with_record(self, zone_name: &str, record_type: RecordType, key: &str, value: &str) -> Self {
        let id = self.allocate_id();
        self.zones
            .lock()
            .unwrap()
            .entry(zone_name.to_string())
            .or_insert_with(|| Zone::new(zone_name))
            .records_mut(record_type)
            .push(ZoneRecord {
                id,
                key: key.to_string(),
                value: value.to_string(),
                ttl: 3600,
                priority: 0,
                status: "ACTIVE".to_string(),
            });
        self
    }

    /// Remove a record type list from a zone's snapshot
    pub fn without_record_type(self, zone_name: &str, record_type: RecordType) -> Self {
        if let Some(zone) = self.zones.lock().unwrap().get_mut(zone_name) {
            match record_type {
                RecordType::A => zone.a = None,
                RecordType::Aaaa => zone.aaaa = None,
                RecordType::Cname => zone.cname = None,
                RecordType::Mx => zone.mx = None,
                RecordType::Ns => zone.ns = None,
                RecordType::Txt => zone.txt = None,
            }
        }
        self
    }

    /// Answer the first `count` submissions for `zone_name` with OPEN_ZONE_EDITS
    pub fn with_open_edits(self, zone_name: &str, count: usize) -> Self {
        self.conflicts
            .lock()
            .unwrap()
            .insert(zone_name.to_string(), count);
        self
    }

    /// Report edits for `zone_name` as FAILED
    pub fn failing_edits(mut self, zone_name: &str) -> Self {
        self.failing_zones.insert(zone_name.to_string());
        self
    }

    /// Reject submissions for `zone_name` with HTTP 400
    pub fn rejecting(mut self, zone_name: &str) -> Self {
        self.rejecting_zones.insert(zone_name.to_string());
        self
    }

    /// Report each edit as PENDING this many times before it completes
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Delay every zone fetch
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    fn allocate_id(&self) -> String {
        format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Every accepted or rejected submission, in order
    pub fn submitted(&self) -> Vec<ZoneEditRequest> {
        self.submitted.lock().unwrap().clone()
    }

    /// Current server-side copy of a zone
    pub fn zone(&self, zone_name: &str) -> Option<Zone> {
        self.zones.lock().unwrap().get(zone_name).cloned()
    }

    fn apply(&self, request: &ZoneEditRequest) {
        let mut zones = self.zones.lock().unwrap();
        let Some(zone) = zones.get_mut(&request.zone_name) else {
            return;
        };

        for edit in &request.edits {
            if zone.records(edit.record_type).is_none() {
                continue;
            }
            let records = zone.records_mut(edit.record_type);
            match edit.action {
                RecordActionKind::Add => records.push(self.new_record(edit)),
                RecordActionKind::Edit => {
                    if let Some(record) = records
                        .iter_mut()
                        .find(|r| r.key == edit.current_key && r.value == edit.current_value)
                    {
                        record.key = edit.new_key.clone();
                        record.value = edit.new_value.clone();
                        if edit.new_ttl != 0 {
                            record.ttl = edit.new_ttl;
                        }
                        record.priority = edit.new_priority;
                    }
                }
                RecordActionKind::Purge => {
                    records.retain(|r| !(r.key == edit.current_key && r.value == edit.current_value));
                }
            }
        }
    }

    fn new_record(&self, edit: &ZoneEdit) -> ZoneRecord {
        ZoneRecord {
            id: self.allocate_id(),
            key: edit.new_key.clone(),
            value: edit.new_value.clone(),
            ttl: if edit.new_ttl == 0 { 3600 } else { edit.new_ttl },
            priority: edit.new_priority,
            status: "ACTIVE".to_string(),
        }
    }
}

#[async_trait]
impl ZoneApi for MockZoneApi {
    async fn submit_zone_edit(&self, request: &ZoneEditRequest) -> Result<SubmitOutcome> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(request.clone());

        if self.rejecting_zones.contains(&request.zone_name) {
            return Err(Error::http(400, "validation failed"));
        }

        {
            let mut conflicts = self.conflicts.lock().unwrap();
            if let Some(remaining) = conflicts.get_mut(&request.zone_name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(SubmitOutcome::OpenZoneEdits);
                }
            }
        }

        let edit_id = format!("edit-{}", self.submit_calls());
        self.open_edits.lock().unwrap().insert(
            edit_id.clone(),
            OpenEdit {
                request: request.clone(),
                polls_left: self.pending_polls,
                fail: self.failing_zones.contains(&request.zone_name),
            },
        );
        Ok(SubmitOutcome::Accepted { edit_id })
    }

    async fn zone_edit_status(&self, edit_id: &str) -> Result<EditStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        let completed = {
            let mut open = self.open_edits.lock().unwrap();
            let Some(edit) = open.get_mut(edit_id) else {
                return Err(Error::http(404, format!("unknown edit {}", edit_id)));
            };
            if edit.fail {
                return Ok(EditStatus::Failed);
            }
            if edit.polls_left > 0 {
                edit.polls_left -= 1;
                return Ok(EditStatus::Pending);
            }
            open.remove(edit_id)
        };

        if let Some(edit) = completed {
            self.apply(&edit.request);
        }
        Ok(EditStatus::Completed)
    }

    async fn cancel_zone_edit(&self, edit_id: &str) -> Result<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.open_edits.lock().unwrap().remove(edit_id);
        Ok(())
    }

    async fn fetch_zone(&self, zone_name: &str) -> Result<Zone> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.zone(zone_name)
            .ok_or_else(|| Error::not_found(format!("zone {} not found", zone_name)))
    }

    async fn list_zones(&self) -> Result<Vec<Zone>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut zones: Vec<Zone> = self.zones.lock().unwrap().values().cloned().collect();
        zones.sort_by(|a, b| a.zone_name.cmp(&b.zone_name));
        Ok(zones)
    }

    fn api_name(&self) -> &'static str {
        "mock"
    }
}

/// Short timings so paused-clock tests stay readable
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        flush_idle_ms: 100,
        poll_interval_ms: 1_000,
        max_flush_delay_ms: 1_000,
        max_batch_size: None,
    }
}

/// Configure a client over `api` with [`fast_config`]
pub fn client_for(api: &Arc<MockZoneApi>) -> Arc<CscdmClient> {
    client_with(api, fast_config())
}

pub fn client_with(api: &Arc<MockZoneApi>, config: ClientConfig) -> Arc<CscdmClient> {
    let api: Arc<dyn ZoneApi> = api.clone();
    Arc::new(CscdmClient::configure(api, config).expect("client configuration succeeds"))
}
