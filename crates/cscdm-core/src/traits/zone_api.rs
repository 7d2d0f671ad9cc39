// # Zone API Trait
//
// Defines the request executor the dispatcher submits zone edits through.
//
// ## Implementations
//
// - CSC Domain Manager REST API: `cscdm-api-http` crate
// - Scripted in-memory backend: `tests/common` of this crate
//
// ## Endpoints
//
// ```text
// POST   /zones/edits               -> 201 + links.status, or 4xx OPEN_ZONE_EDITS
// GET    /zones/edits/status/{id}   -> {content: {status: PENDING|COMPLETED|FAILED}}
// DELETE /zones/edits/{id}          -> 204
// GET    /zones/{zoneName}          -> zone snapshot
// GET    /zones                     -> {zones: [...]}
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::ZoneEditRequest;
use crate::zone::Zone;

/// Outcome of submitting a zone edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend opened an edit; poll it by id
    Accepted {
        /// Edit id (last path segment of the status link)
        edit_id: String,
    },
    /// Another edit is already open for this zone; retry later
    OpenZoneEdits,
}

/// Completion status of a submitted zone edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EditStatus {
    /// Applied successfully
    Completed,
    /// Rejected by the backend
    Failed,
    /// Still being applied; any unrecognised status lands here
    #[serde(other)]
    Pending,
}

/// Trait for the backend zone edit API
///
/// Implementations perform exactly one request per call. Retrying on
/// [`SubmitOutcome::OpenZoneEdits`], polling cadence, and cancellation
/// policy are owned by the dispatcher.
///
/// # Thread Safety
///
/// Implementations must be usable concurrently from one task per zone.
#[async_trait]
pub trait ZoneApi: Send + Sync {
    /// Submit every edit for one zone as a single batch
    async fn submit_zone_edit(&self, request: &ZoneEditRequest) -> Result<SubmitOutcome>;

    /// Fetch the status of a previously accepted edit
    async fn zone_edit_status(&self, edit_id: &str) -> Result<EditStatus>;

    /// Cancel an open edit
    async fn cancel_zone_edit(&self, edit_id: &str) -> Result<()>;

    /// Fetch the full snapshot of one zone
    async fn fetch_zone(&self, zone_name: &str) -> Result<Zone>;

    /// Fetch every zone visible to the account
    async fn list_zones(&self) -> Result<Vec<Zone>>;

    /// Name of the backend (for logging)
    fn api_name(&self) -> &'static str;
}
