//! Cross-catalogue relationship resolution.
//!
//! Records reference other catalogues through delimited-ID mapping columns
//! (a control's `mapped_failure_ids`, an obligation's `mapped_control_ids`).
//! Resolution walks those references deterministically: requested IDs are
//! deduplicated and sorted, matched rows come back in that order with full
//! record bodies, and anything unresolvable is reported in `missing_ids`
//! rather than dropped. Tight scope (anchor-rooted) and broad scope (the
//! full referencing set) are the same primitive called with different
//! roots.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalogue::{id_column_candidates, Catalogue};
use crate::fields::FieldAliasResolver;
use crate::idlist::parse_id_list;
use crate::record::Record;

/// Outcome of resolving a set of identifiers against a target catalogue.
///
/// Invariant: when `id_column_used` is `Some`,
/// `matched_records.len() + missing_ids.len() == requested_ids.len()`.
/// When no identifier column could be detected, every requested ID is
/// missing and `matched_records` is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedSet {
    /// Deduplicated, lexicographically sorted.
    pub requested_ids: Vec<String>,
    /// Full record bodies, in `requested_ids` order.
    pub matched_records: Vec<Record>,
    /// Requested IDs with no matching record; deduplicated, sorted.
    pub missing_ids: Vec<String>,
    /// Target identifier column actually used, if one was detected.
    pub id_column_used: Option<String>,
}

impl ResolvedSet {
    pub fn matched_ids(&self) -> Vec<String> {
        self.id_column_used
            .as_deref()
            .map(|col| {
                self.matched_records
                    .iter()
                    .map(|r| r.value(col).to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Union the parsed ID lists of every matching mapping column across a set
/// of records. Deduplicated and sorted.
pub fn collect_mapped_ids(records: &[Record], fields: &FieldAliasResolver) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    for record in records {
        for column in fields.all_matches(record) {
            for token in parse_id_list(record.value(column)) {
                ids.insert(token);
            }
        }
    }
    ids
}

/// Resolve an explicit wanted-ID set against a target catalogue.
///
/// Detects the identifier column from `id_candidates` (fixed priority
/// order), indexes the catalogue once, and looks up each requested ID. If
/// no column can be detected the whole request is reported missing — the
/// caller documents the gap instead of failing.
pub fn select_rows_by_ids(
    target: &Catalogue,
    id_candidates: &[&str],
    wanted: &BTreeSet<String>,
) -> ResolvedSet {
    let requested_ids: Vec<String> = wanted
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let id_column = target.detect_id_column(id_candidates);
    let Some(col) = id_column else {
        debug!(
            catalogue = %target.name,
            requested = requested_ids.len(),
            "no identifier column detected; reporting all requested IDs missing"
        );
        return ResolvedSet {
            missing_ids: requested_ids.clone(),
            requested_ids,
            matched_records: Vec::new(),
            id_column_used: None,
        };
    };

    let index = target.index_by_id(&col);
    let mut matched_records = Vec::new();
    let mut missing_ids = Vec::new();
    for id in &requested_ids {
        match index.get(id.as_str()) {
            Some(record) => matched_records.push((*record).clone()),
            None => missing_ids.push(id.clone()),
        }
    }

    ResolvedSet {
        requested_ids,
        matched_records,
        missing_ids,
        id_column_used: Some(col),
    }
}

/// Resolve root identifiers in a source catalogue through declared mapping
/// columns into a target catalogue.
///
/// 1. find the source records whose own identifier is in `root_ids`;
/// 2. union the parsed values of every matching mapping column;
/// 3. select the unioned IDs against the target, reporting misses.
///
/// An empty root set resolves to an empty `ResolvedSet` — not an error.
pub fn resolve(
    root_ids: &BTreeSet<String>,
    source: &Catalogue,
    mapping_fields: &FieldAliasResolver,
    target: &Catalogue,
    target_id_candidates: &[&str],
) -> ResolvedSet {
    if root_ids.is_empty() {
        return ResolvedSet::default();
    }

    let source_candidates = id_column_candidates(&source.name);
    let roots: Vec<Record> = match source.detect_id_column(source_candidates) {
        Some(col) => source
            .records()
            .iter()
            .filter(|r| root_ids.contains(r.value(&col)))
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    let wanted = collect_mapped_ids(&roots, mapping_fields);
    select_rows_by_ids(target, target_id_candidates, &wanted)
}
