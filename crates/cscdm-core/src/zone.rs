//! Zone snapshots as returned by `GET /zones/{zoneName}`
//!
//! A [`Zone`] is never mutated once the cache has stored it; a re-fetch
//! replaces it wholesale.

use serde::{Deserialize, Serialize};

use crate::record::RecordType;

/// One concrete record instance
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZoneRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ttl: i64,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub status: String,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// SRV record: a regular record plus a port
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZoneSrvRecord {
    #[serde(flatten)]
    pub record: ZoneRecord,
    #[serde(default)]
    pub port: i32,
}

/// Start-of-authority metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ZoneSoaRecord {
    pub serial: i64,
    pub refresh: i64,
    pub retry: i64,
    pub expire: i64,
    pub ttl_min: i64,
    pub ttl_neg: i64,
    pub ttl_zone: i64,
    pub tech_email: String,
    pub master_host: String,
}

/// Full record set of one zone
///
/// Typed lists are `None` when the backend omitted them from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub zone_name: String,
    #[serde(default)]
    pub hosting_type: String,
    #[serde(default, rename = "a")]
    pub a: Option<Vec<ZoneRecord>>,
    #[serde(default, rename = "aaaa")]
    pub aaaa: Option<Vec<ZoneRecord>>,
    #[serde(default, rename = "cname")]
    pub cname: Option<Vec<ZoneRecord>>,
    #[serde(default, rename = "mx")]
    pub mx: Option<Vec<ZoneRecord>>,
    #[serde(default, rename = "ns")]
    pub ns: Option<Vec<ZoneRecord>>,
    #[serde(default, rename = "txt")]
    pub txt: Option<Vec<ZoneRecord>>,
    #[serde(default, rename = "srv")]
    pub srv: Option<Vec<ZoneSrvRecord>>,
    #[serde(default, rename = "caa")]
    pub caa: Option<Vec<ZoneRecord>>,
    #[serde(default)]
    pub soa: ZoneSoaRecord,
}

impl Zone {
    /// Empty zone with every editable record list present
    pub fn new(zone_name: impl Into<String>) -> Self {
        Self {
            zone_name: zone_name.into(),
            a: Some(Vec::new()),
            aaaa: Some(Vec::new()),
            cname: Some(Vec::new()),
            mx: Some(Vec::new()),
            ns: Some(Vec::new()),
            txt: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Records of one type, or `None` if the snapshot carries no list for it
    pub fn records(&self, record_type: RecordType) -> Option<&[ZoneRecord]> {
        let list = match record_type {
            RecordType::A => &self.a,
            RecordType::Aaaa => &self.aaaa,
            RecordType::Cname => &self.cname,
            RecordType::Mx => &self.mx,
            RecordType::Ns => &self.ns,
            RecordType::Txt => &self.txt,
        };
        list.as_deref()
    }

    /// Mutable access to the list for one type, creating it if absent
    pub fn records_mut(&mut self, record_type: RecordType) -> &mut Vec<ZoneRecord> {
        let list = match record_type {
            RecordType::A => &mut self.a,
            RecordType::Aaaa => &mut self.aaaa,
            RecordType::Cname => &mut self.cname,
            RecordType::Mx => &mut self.mx,
            RecordType::Ns => &mut self.ns,
            RecordType::Txt => &mut self.txt,
        };
        list.get_or_insert_with(Vec::new)
    }

    /// First record of `record_type` with the given key
    pub fn record_by_key(&self, record_type: RecordType, key: &str) -> Option<&ZoneRecord> {
        self.records(record_type)?.iter().find(|r| r.key == key)
    }

    /// Record of `record_type` with the given backend id
    pub fn record_by_id(&self, record_type: RecordType, id: &str) -> Option<&ZoneRecord> {
        self.records(record_type)?.iter().find(|r| r.id == id)
    }

    /// Record matching key and value, falling back to the first key match
    ///
    /// Several records may share a key (round-robin A records, multiple MX).
    pub fn record_by_identity(
        &self,
        record_type: RecordType,
        key: &str,
        value: &str,
    ) -> Option<&ZoneRecord> {
        let records = self.records(record_type)?;
        records
            .iter()
            .find(|r| r.key == key && r.value == value)
            .or_else(|| records.iter().find(|r| r.key == key))
    }

    /// Records of `record_type` whose key is in `keys`, keyed by record key
    pub fn records_by_keys<'a>(
        &'a self,
        record_type: RecordType,
        keys: &[&str],
    ) -> std::collections::HashMap<&'a str, &'a ZoneRecord> {
        self.records(record_type)
            .unwrap_or_default()
            .iter()
            .filter(|r| keys.contains(&r.key.as_str()))
            .map(|r| (r.key.as_str(), r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Zone {
        serde_json::from_value(serde_json::json!({
            "zoneName": "example.com",
            "hostingType": "ADVANCED",
            "a": [
                {"id": "1", "key": "www", "value": "1.1.1.1", "ttl": 300, "priority": 0, "status": "ACTIVE"},
                {"id": "2", "key": "www", "value": "2.2.2.2", "ttl": 300, "priority": 0, "status": "ACTIVE"}
            ],
            "mx": [
                {"id": "3", "key": "@", "value": "mx.example.com", "priority": 10, "status": "ACTIVE"}
            ],
            "srv": [
                {"id": "4", "key": "_sip._tcp", "value": "sip.example.com", "priority": 5, "status": "ACTIVE", "port": 5060}
            ],
            "soa": {"serial": 2024010101, "ttlMin": 60, "techEmail": "hostmaster@example.com", "masterHost": "ns1.example.com"}
        }))
        .unwrap()
    }

    #[test]
    fn test_deserialize_snapshot() {
        let zone = sample();
        assert_eq!(zone.zone_name, "example.com");
        assert_eq!(zone.records(RecordType::A).unwrap().len(), 2);
        assert_eq!(zone.srv.as_ref().unwrap()[0].port, 5060);
        assert_eq!(zone.srv.as_ref().unwrap()[0].record.key, "_sip._tcp");
        assert_eq!(zone.soa.ttl_min, 60);
        assert_eq!(zone.soa.master_host, "ns1.example.com");
        // absent lists stay absent
        assert!(zone.records(RecordType::Txt).is_none());
    }

    #[test]
    fn test_lookup_helpers() {
        let zone = sample();
        assert_eq!(zone.record_by_key(RecordType::A, "www").unwrap().id, "1");
        assert_eq!(zone.record_by_id(RecordType::Mx, "3").unwrap().value, "mx.example.com");
        assert_eq!(
            zone.record_by_identity(RecordType::A, "www", "2.2.2.2").unwrap().id,
            "2"
        );
        assert_eq!(
            zone.record_by_identity(RecordType::A, "www", "9.9.9.9").unwrap().id,
            "1"
        );
        assert!(zone.record_by_key(RecordType::Txt, "www").is_none());

        let found = zone.records_by_keys(RecordType::Mx, &["@", "missing"]);
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("@"));
    }

    #[test]
    fn test_records_mut_creates_list() {
        let mut zone = sample();
        zone.records_mut(RecordType::Txt).push(ZoneRecord {
            key: "_acme".to_string(),
            value: "token".to_string(),
            ..ZoneRecord::default()
        });
        assert_eq!(zone.records(RecordType::Txt).unwrap().len(), 1);
    }
}
