//! Record actions and their wire representation
//!
//! A [`RecordAction`] is one caller's desired mutation of a single record.
//! Actions for the same zone are folded into one [`ZoneEditRequest`] at
//! flush time, and each action is correlated back to its caller through a
//! [`CorrelationKey`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// DNS record types accepted by the zone edit API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Canonical name record
    Cname,
    /// Mail exchange record
    Mx,
    /// Name server record
    Ns,
    /// Text record
    Txt,
}

impl RecordType {
    /// All record types, in wire order
    pub const ALL: [RecordType; 6] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Mx,
        RecordType::Ns,
        RecordType::Txt,
    ];

    /// Upper-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Txt => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::unsupported_record_type(s))
    }
}

/// Kind of mutation requested for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordActionKind {
    /// Create a new record
    Add,
    /// Replace an existing record
    Edit,
    /// Remove an existing record
    Purge,
}

impl RecordActionKind {
    /// Whether the action describes a desired new state
    pub fn has_new_state(&self) -> bool {
        matches!(self, RecordActionKind::Add | RecordActionKind::Edit)
    }
}

impl fmt::Display for RecordActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordActionKind::Add => "ADD",
            RecordActionKind::Edit => "EDIT",
            RecordActionKind::Purge => "PURGE",
        })
    }
}

/// A single desired mutation against one record of one zone
///
/// `current_*` fields identify the existing record (EDIT, PURGE) and
/// `new_*` fields describe the desired state (ADD, EDIT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAction {
    /// Zone the record belongs to
    pub zone_name: String,
    /// Record type
    pub record_type: RecordType,
    /// Requested mutation
    pub action: RecordActionKind,
    #[serde(default)]
    pub current_key: String,
    #[serde(default)]
    pub current_value: String,
    #[serde(default)]
    pub current_ttl: i64,
    #[serde(default)]
    pub current_priority: i64,
    #[serde(default)]
    pub new_key: String,
    #[serde(default)]
    pub new_value: String,
    #[serde(default)]
    pub new_ttl: i64,
    #[serde(default)]
    pub new_priority: i64,
}

impl RecordAction {
    fn empty(zone_name: impl Into<String>, record_type: RecordType, action: RecordActionKind) -> Self {
        Self {
            zone_name: zone_name.into(),
            record_type,
            action,
            current_key: String::new(),
            current_value: String::new(),
            current_ttl: 0,
            current_priority: 0,
            new_key: String::new(),
            new_value: String::new(),
            new_ttl: 0,
            new_priority: 0,
        }
    }

    /// Create an ADD action
    pub fn add(
        zone_name: impl Into<String>,
        record_type: RecordType,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let mut action = Self::empty(zone_name, record_type, RecordActionKind::Add);
        action.new_key = key.into();
        action.new_value = value.into();
        action
    }

    /// Create an EDIT action replacing `current` with `new`
    pub fn edit(
        zone_name: impl Into<String>,
        record_type: RecordType,
        current: (impl Into<String>, impl Into<String>),
        new: (impl Into<String>, impl Into<String>),
    ) -> Self {
        let mut action = Self::empty(zone_name, record_type, RecordActionKind::Edit);
        action.current_key = current.0.into();
        action.current_value = current.1.into();
        action.new_key = new.0.into();
        action.new_value = new.1.into();
        action
    }

    /// Create a PURGE action
    pub fn purge(
        zone_name: impl Into<String>,
        record_type: RecordType,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let mut action = Self::empty(zone_name, record_type, RecordActionKind::Purge);
        action.current_key = key.into();
        action.current_value = value.into();
        action
    }

    /// Set the TTL of the desired state
    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.new_ttl = ttl;
        self
    }

    /// Set the priority of the desired state
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.new_priority = priority;
        self
    }

    /// Set the TTL and priority identifying the existing record
    pub fn with_current_ttl_priority(mut self, ttl: i64, priority: i64) -> Self {
        self.current_ttl = ttl;
        self.current_priority = priority;
        self
    }

    /// Key identifying the record this action resolves to
    pub fn key_id(&self) -> &str {
        if self.action.has_new_state() {
            &self.new_key
        } else {
            &self.current_key
        }
    }

    /// Value identifying the record this action resolves to
    pub fn value_id(&self) -> &str {
        if self.action.has_new_state() {
            &self.new_value
        } else {
            &self.current_value
        }
    }

    /// Key under which this action's caller waits for its result
    pub fn correlation_key(&self) -> CorrelationKey {
        CorrelationKey::new(&self.zone_name, self.record_type, self.key_id(), self.value_id())
    }

    /// Check that the populated fields are consistent with the action kind
    pub fn validate(&self) -> Result<()> {
        if self.zone_name.is_empty() {
            return Err(Error::invalid_input("zone name cannot be empty"));
        }

        let has_current = !self.current_key.is_empty() || !self.current_value.is_empty();
        let has_new = !self.new_key.is_empty() || !self.new_value.is_empty();
        let current_complete = !self.current_key.is_empty() && !self.current_value.is_empty();
        let new_complete = !self.new_key.is_empty() && !self.new_value.is_empty();

        let ok = match self.action {
            RecordActionKind::Add => new_complete && !has_current,
            RecordActionKind::Edit => new_complete && current_complete,
            RecordActionKind::Purge => current_complete && !has_new,
        };

        if !ok {
            return Err(Error::invalid_input(format!(
                "{} {} action in zone {} has inconsistent key/value fields",
                self.action, self.record_type, self.zone_name
            )));
        }

        Ok(())
    }

    /// Wire form of this action
    pub fn to_zone_edit(&self) -> ZoneEdit {
        ZoneEdit {
            record_type: self.record_type,
            action: self.action,
            current_key: self.current_key.clone(),
            current_value: self.current_value.clone(),
            current_ttl: self.current_ttl,
            current_priority: self.current_priority,
            new_key: self.new_key.clone(),
            new_value: self.new_value.clone(),
            new_ttl: self.new_ttl,
            new_priority: self.new_priority,
        }
    }
}

/// Identity of a pending caller: (zone, record type, key, value)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub zone: String,
    pub record_type: RecordType,
    pub key: String,
    pub value: String,
}

impl CorrelationKey {
    pub fn new(
        zone: impl Into<String>,
        record_type: RecordType,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            zone: zone.into(),
            record_type,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether this key belongs to `zone` (and `record_type`, if given)
    pub fn matches(&self, zone: &str, record_type: Option<RecordType>) -> bool {
        self.zone == zone && record_type.is_none_or(|t| t == self.record_type)
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.zone, self.record_type, self.key, self.value)
    }
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// One edit inside a zone edit submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneEdit {
    pub record_type: RecordType,
    pub action: RecordActionKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_value: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub current_ttl: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub current_priority: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub new_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub new_value: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub new_ttl: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub new_priority: i64,
}

impl ZoneEdit {
    pub fn key_id(&self) -> &str {
        if self.action.has_new_state() {
            &self.new_key
        } else {
            &self.current_key
        }
    }

    pub fn value_id(&self) -> &str {
        if self.action.has_new_state() {
            &self.new_value
        } else {
            &self.current_value
        }
    }
}

/// Body of `POST /zones/edits`: every edit for one zone, in enqueue order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneEditRequest {
    pub zone_name: String,
    pub edits: Vec<ZoneEdit>,
}
