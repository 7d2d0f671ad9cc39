//! Core traits for the zone edit dispatcher
//!
//! This module defines the abstract interfaces the dispatcher is written against.
//!
//! - [`ZoneApi`]: Submit zone edits, poll their status, and read zone snapshots

pub mod zone_api;

pub use zone_api::{EditStatus, SubmitOutcome, ZoneApi};
