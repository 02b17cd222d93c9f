//! Integrator hub: the process-wide catalogue facade.
//!
//! The hub loads each catalogue once and hands out copies to every caller
//! in the process, so a UI interaction never re-reads the same table twice.
//! It exposes the thin, stable API the modules consume — catalogue access,
//! single-entity resolution, structural relationship discovery, and the
//! bundle shape check. It never generates output, renders anything, or
//! mutates catalogue content.
//!
//! The shared registry is an explicit context object (one hub per base
//! path, init-on-first-use, `reset_shared` for tests) rather than a hidden
//! global. Interactions are single-threaded request-per-action; the
//! internal mutex exists for `static` safety, not as a concurrency design.
//! Catalogue replacement on disk is whole-table and last-write-wins with
//! no ordering guarantee — resolution passes are safe against each other,
//! not against a concurrent replace.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use serde_json::Value;
use tracing::debug;

use crate::bundle::{has_locked_shape, Relationship};
use crate::catalogue::{id_column_candidates, Catalogue, CatalogueSource, CatalogueStore};
use crate::fields::FieldAliasResolver;
use crate::idlist::parse_id_list;
use crate::record::Record;

pub struct IntegratorHub {
    store: CatalogueStore,
    cache: Mutex<HashMap<String, Catalogue>>,
}

impl IntegratorHub {
    pub fn new(store: CatalogueStore) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Effective catalogue by name, loaded at most once per hub lifetime
    /// (until an explicit [`reload`](Self::reload)). Always returns a valid,
    /// possibly empty, owned copy.
    pub fn get_catalogue(&self, name: &str) -> Catalogue {
        let mut cache = self.cache.lock().expect("hub cache poisoned");
        cache
            .entry(name.to_string())
            .or_insert_with(|| self.store.effective(name))
            .clone()
    }

    /// Drop every cached table; the next access re-reads from disk. This is
    /// the only path that re-reads catalogues.
    pub fn reload(&self) {
        self.cache.lock().expect("hub cache poisoned").clear();
        debug!("hub catalogue cache cleared");
    }

    /// Retrieve a single entity by identifier, trying the catalogue's
    /// identifier-column candidates in fixed priority order.
    pub fn resolve_entity(&self, catalogue: &str, entity_id: &str) -> Option<Record> {
        self.get_catalogue(catalogue)
            .find_by_id(id_column_candidates(catalogue), entity_id)
            .cloned()
    }

    /// Discover structural relationships for an entity, catalogue-driven
    /// and deterministic. Controls map to the failures they imply and the
    /// compensations that cover them; other entity kinds grow here as their
    /// catalogues mature.
    pub fn build_relationships(&self, primary: &Record) -> Vec<Relationship> {
        let mut rels = Vec::new();
        let cid = primary.value("control_id");
        if cid.is_empty() {
            return rels;
        }

        let control_refs =
            FieldAliasResolver::new(["mapped_control_ids", "mapped_controls", "control_ids"]);

        let failures = self.get_catalogue("CRT-F");
        for row in failures.records() {
            if references_id(row, &control_refs, cid) {
                rels.push(Relationship {
                    from_type: "control".to_string(),
                    from_id: cid.to_string(),
                    rel: "failure_implication".to_string(),
                    to_type: "failure".to_string(),
                    to_id: row.value("failure_id").to_string(),
                });
            }
        }

        let compensations = self.get_catalogue("CRT-N");
        for row in compensations.records() {
            if references_id(row, &control_refs, cid) {
                rels.push(Relationship {
                    from_type: "control".to_string(),
                    from_id: cid.to_string(),
                    rel: "compensated_by".to_string(),
                    to_type: "compensation".to_string(),
                    to_id: row.value("n_id").to_string(),
                });
            }
        }

        rels
    }

    /// Structural contract check before export: the fixed top-level bundle
    /// key set is present. Not a deep schema validator.
    pub fn validate_bundle(&self, bundle: &Value) -> bool {
        has_locked_shape(bundle)
    }
}

impl CatalogueSource for IntegratorHub {
    fn catalogue(&self, name: &str) -> Catalogue {
        self.get_catalogue(name)
    }
}

/// Whether a record's mapping columns reference the given identifier as an
/// exact token (not a substring).
fn references_id(record: &Record, fields: &FieldAliasResolver, id: &str) -> bool {
    fields
        .all_matches(record)
        .iter()
        .any(|col| parse_id_list(record.value(col)).iter().any(|t| t == id))
}

// ── Shared registry ──────────────────────────────────────────────

fn registry() -> &'static Mutex<HashMap<PathBuf, Arc<IntegratorHub>>> {
    static SHARED: OnceLock<Mutex<HashMap<PathBuf, Arc<IntegratorHub>>>> = OnceLock::new();
    SHARED.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Process-wide hub for a base path, created on first use and reused by
/// every subsequent call. The base path follows the conventional layout of
/// [`CatalogueStore::under_base`].
pub fn shared(base_path: &Path) -> Arc<IntegratorHub> {
    let mut reg = registry().lock().expect("hub registry poisoned");
    reg.entry(base_path.to_path_buf())
        .or_insert_with(|| Arc::new(IntegratorHub::new(CatalogueStore::under_base(base_path))))
        .clone()
}

/// Forget every shared hub. Test hook; production code never resets.
pub fn reset_shared() {
    registry().lock().expect("hub registry poisoned").clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hub() -> IntegratorHub {
        // Nonexistent paths: every catalogue degrades to an empty table.
        IntegratorHub::new(CatalogueStore::new("/nonexistent/a", "/nonexistent/d"))
    }

    #[test]
    fn unknown_catalogue_is_a_valid_empty_table() {
        let h = hub();
        let c = h.get_catalogue("CRT-C");
        assert!(c.is_empty());
        assert_eq!(c.name, "CRT-C");
    }

    #[test]
    fn resolve_entity_misses_cleanly() {
        assert!(hub().resolve_entity("CRT-C", "CRT-C-0001").is_none());
    }

    #[test]
    fn relationships_for_non_control_are_empty() {
        let h = hub();
        let asset = Record::from_pairs([("as_id", "AS-0001")]);
        assert!(h.build_relationships(&asset).is_empty());
    }

    #[test]
    fn validate_bundle_checks_the_locked_key_set() {
        let h = hub();
        assert!(h.validate_bundle(&json!({
            "bundle_type": "data",
            "module": "DCR",
            "primary_entity": {},
            "entities": {},
            "relationships": [],
            "structural_findings": {},
            "guardrails": {}
        })));
        assert!(!h.validate_bundle(&json!({"bundle_type": "data"})));
    }

    #[test]
    fn shared_registry_reuses_one_hub_per_base_path() {
        reset_shared();
        let a = shared(Path::new("/tmp/crt-test-base"));
        let b = shared(Path::new("/tmp/crt-test-base"));
        assert!(Arc::ptr_eq(&a, &b));
        let c = shared(Path::new("/tmp/crt-other-base"));
        assert!(!Arc::ptr_eq(&a, &c));
        reset_shared();
    }
}
