//! Field-name tolerance.
//!
//! Catalogue columns follow loose naming conventions rather than one
//! canonical name: a control's failure mapping may be `mapped_failure_ids`,
//! `failure_ids`, `mapped_failures`, or an older `mapped_fail_*` variant.
//! This tolerance is a first-class requirement — no single field name is
//! ever hard-required. The resolver takes an ordered candidate list per
//! logical concept and matches exact names first, then prefixes.

use crate::record::Record;

/// Ordered acceptable field names for one logical concept.
#[derive(Debug, Clone, Default)]
pub struct FieldAliasResolver {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl FieldAliasResolver {
    /// Exact candidate names, highest priority first.
    pub fn new<I, S>(exact: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exact: exact.into_iter().map(Into::into).collect(),
            prefixes: Vec::new(),
        }
    }

    /// Add a prefix convention (e.g. `mapped_fail` matches
    /// `mapped_failure_ids` and `mapped_failures`). Prefixes are tried only
    /// after every exact candidate has missed.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// First present field on the record, in candidate priority order.
    pub fn first_match<'r>(&self, record: &'r Record) -> Option<&'r str> {
        let mut all = self.all_matches(record);
        if all.is_empty() {
            None
        } else {
            Some(all.remove(0))
        }
    }

    /// Every matching field on the record, exact candidates (in priority
    /// order) before prefix hits. A record may legitimately carry more than
    /// one mapping column; callers union the parsed values across all of
    /// them.
    pub fn all_matches<'r>(&self, record: &'r Record) -> Vec<&'r str> {
        let mut out: Vec<&str> = Vec::new();

        for cand in &self.exact {
            for key in record.keys() {
                if key == cand && !out.contains(&key) {
                    out.push(key);
                }
            }
        }
        for prefix in &self.prefixes {
            for key in record.keys() {
                if key.starts_with(prefix.as_str()) && !out.contains(&key) {
                    out.push(key);
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control() -> Record {
        Record::from_pairs([
            ("control_id", "CRT-C-0001"),
            ("mapped_failure_ids", "FM-001; FM-002"),
            ("mapped_fail_legacy", "FM-009"),
        ])
    }

    #[test]
    fn exact_match_wins_over_prefix() {
        let r = FieldAliasResolver::new(["mapped_failure_ids", "failure_ids"])
            .with_prefix("mapped_fail");
        assert_eq!(r.first_match(&control()), Some("mapped_failure_ids"));
    }

    #[test]
    fn prefix_collects_legacy_variants() {
        let r = FieldAliasResolver::new(["failure_ids"]).with_prefix("mapped_fail");
        let rec = control();
        let matches = r.all_matches(&rec);
        assert_eq!(matches, vec!["mapped_fail_legacy", "mapped_failure_ids"]);
    }

    #[test]
    fn no_candidate_present_is_none() {
        let r = FieldAliasResolver::new(["compensation_ids"]);
        assert_eq!(r.first_match(&control()), None);
    }

    #[test]
    fn bom_on_the_stored_key_does_not_break_matching() {
        // Keys are normalised at Record construction, so a BOM-carrying
        // header still resolves by its clean name.
        let rec = Record::from_pairs([("\u{feff}mapped_control_ids", "CRT-C-0001")]);
        let r = FieldAliasResolver::new(["mapped_control_ids"]);
        assert_eq!(r.first_match(&rec), Some("mapped_control_ids"));
    }
}
