// # cscdm-core
//
// Request batching and result dispatch for the CSC Domain Manager zone
// edit API.
//
// ## Architecture Overview
//
// Callers submit single-record mutations and block until their own result
// arrives. Behind the scenes the mutations are batched per zone:
// - **CscdmClient**: Facade; validates, enqueues, and waits on a result channel
// - **BatchQueue**: Ordered pending actions, drained atomically by a flush
// - **FlushScheduler**: Idle-debounced flush loop with immediate-flush and stop signals
// - **ZoneEditSubmitter**: Submits one edit per zone, retries conflicts, polls to completion
// - **ResultRouter**: Correlation key → caller bookkeeping, exactly-once delivery
// - **ZoneCache**: Zone snapshots with coalesced fetches and epoch invalidation
// - **ZoneApi**: Trait for the backend; the HTTP implementation lives in `cscdm-api-http`
//
// ## Design Principles
//
// 1. **One edit per zone per flush**: every action for a zone rides in a single submission
// 2. **Zone isolation**: one zone's failure only reaches that zone's callers
// 3. **Exactly once**: every caller receives one outcome, or a closed channel
// 4. **Backend-agnostic**: all I/O goes through `ZoneApi`

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod queue;
pub mod record;
pub mod router;
pub mod scheduler;
pub mod submitter;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use cache::ZoneCache;
pub use client::CscdmClient;
pub use config::{ApiConfig, ClientConfig, CscdmConfig};
pub use error::{Error, Result};
pub use record::{CorrelationKey, RecordAction, RecordActionKind, RecordType, ZoneEdit, ZoneEditRequest};
pub use router::{RecordOutcome, ResultRouter};
pub use scheduler::{FlushHandler, FlushSummary};
pub use traits::{EditStatus, SubmitOutcome, ZoneApi};
pub use zone::{Zone, ZoneRecord, ZoneSoaRecord, ZoneSrvRecord};
