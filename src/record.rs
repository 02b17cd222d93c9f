//! Schema-less catalogue records.
//!
//! A record is a column-name → string-value map read from one CSV row.
//! Column names are normalised on ingest (BOM markers stripped, whitespace
//! trimmed) so the rest of the engine can compare field names directly.
//! Records are immutable once read; catalogue mutation is always a
//! whole-table replace owned by the layer above this crate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Strip an encoding artefact (UTF-8 BOM) and padding from a column name.
///
/// Spreadsheet tools occasionally leave the BOM attached to the *first*
/// header cell (e.g. `"\u{feff}requirement_set_id"`), which would otherwise
/// defeat every exact field-name match on that column.
pub fn strip_bom_key(key: &str) -> &str {
    key.trim_start_matches('\u{feff}').trim()
}

/// One catalogue row: normalised column names mapped to string values.
///
/// `BTreeMap` keeps serialization deterministic, which matters for stable
/// verified-artefact diffs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a record, normalising every key on the way in.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert(strip_bom_key(k.as_ref()).to_string(), v.into());
        }
        Self(map)
    }

    /// Fetch a value by (already-normalised) column name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(strip_bom_key(key)).map(String::as_str)
    }

    /// Trimmed value, or `""` when the column is absent or blank.
    pub fn value(&self, key: &str) -> &str {
        self.get(key).map(str::trim).unwrap_or("")
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(strip_bom_key(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_bom_stripped_on_ingest() {
        let r = Record::from_pairs([("\u{feff}requirement_set_id", "REQ-SET-01")]);
        assert_eq!(r.get("requirement_set_id"), Some("REQ-SET-01"));
    }

    #[test]
    fn lookups_tolerate_bom_on_the_queried_name() {
        let r = Record::from_pairs([("control_id", "CRT-C-0001")]);
        assert_eq!(r.get("\u{feff}control_id"), Some("CRT-C-0001"));
    }

    #[test]
    fn value_trims_and_defaults_to_empty() {
        let r = Record::from_pairs([("name", "  Access Review  ")]);
        assert_eq!(r.value("name"), "Access Review");
        assert_eq!(r.value("absent"), "");
    }

    #[test]
    fn serializes_as_a_plain_map() {
        let r = Record::from_pairs([("a", "1"), ("b", "2")]);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"a":"1","b":"2"}"#);
    }
}
