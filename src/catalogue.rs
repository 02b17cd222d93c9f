//! Named catalogues and the disk-backed store.
//!
//! Every CRT catalogue is a schema-less table keyed by a short name
//! (`CRT-C`, `CRT-F`, ...). Two file variants exist per catalogue: the
//! *active* working copy (user-edited) and the *shipped default*; the
//! effective view is active-if-present-else-default. Loading never fails —
//! a missing or corrupt source degrades to an empty table and the caller
//! decides whether "no data" is worth surfacing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::Record;
use crate::tabular::load_table;

// ── Canonical catalogue set ──────────────────────────────────────

/// Authoritative spine catalogues, read-only by convention.
pub const BACKBONE_CATALOGUES: [&str; 4] = ["CRT-G", "CRT-C", "CRT-F", "CRT-N"];

/// Governance and obligation catalogues.
pub const GOVERNANCE_CATALOGUES: [&str; 4] = ["CRT-POL", "CRT-STD", "CRT-LR", "CRT-REQ"];

/// Structural lens catalogues (assets, data, identity, supply chain,
/// telemetry).
pub const LENS_CATALOGUES: [&str; 5] = ["CRT-AS", "CRT-D", "CRT-I", "CRT-SC", "CRT-T"];

/// Every catalogue the engine knows about.
pub const ALL_CATALOGUES: [&str; 13] = [
    "CRT-G", "CRT-C", "CRT-F", "CRT-N", "CRT-POL", "CRT-STD", "CRT-LR", "CRT-REQ", "CRT-AS",
    "CRT-D", "CRT-I", "CRT-SC", "CRT-T",
];

/// Identifier-column candidates tried when no catalogue is known, in fixed
/// priority order.
pub const KEY_COLUMN_CANDIDATES: [&str; 14] = [
    "control_id",
    "failure_id",
    "n_id",
    "policy_id",
    "standard_id",
    "lr_id",
    "requirement_id",
    "requirement_set_id",
    "d_id",
    "as_id",
    "i_id",
    "sc_id",
    "telemetry_id",
    "group_id",
];

/// Identifier-column candidates for a specific catalogue, preferred name
/// first. Legacy alternates are kept for older exports.
pub fn id_column_candidates(catalogue: &str) -> &'static [&'static str] {
    match catalogue {
        "CRT-G" => &["group_id", "id"],
        "CRT-C" => &["control_id", "crt_c_id", "id"],
        "CRT-F" => &["failure_id", "fm_id", "crt_f_id", "id"],
        "CRT-N" => &["n_id", "compensation_id", "cn_id", "crt_n_id", "id"],
        "CRT-POL" => &["policy_id", "id"],
        "CRT-STD" => &["standard_id", "id"],
        "CRT-LR" => &["lr_id", "id"],
        "CRT-REQ" => &["requirement_set_id", "requirement_id", "id"],
        "CRT-D" => &["d_id", "id"],
        "CRT-AS" => &["as_id", "id"],
        "CRT-I" => &["i_id", "id"],
        "CRT-SC" => &["sc_id", "id"],
        "CRT-T" => &["telemetry_id", "id"],
        _ => &KEY_COLUMN_CANDIDATES,
    }
}

// ── Catalogue ────────────────────────────────────────────────────

/// Which file variant an effective catalogue was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceVariant {
    Active,
    Default,
}

/// A named, schema-less table of records.
///
/// Always valid: a catalogue that could not be loaded is simply empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalogue {
    pub name: String,
    pub source_variant: SourceVariant,
    rows: Vec<Record>,
}

impl Catalogue {
    pub fn new(name: impl Into<String>, source_variant: SourceVariant, rows: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            source_variant,
            rows,
        }
    }

    /// An empty table under the default variant.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, SourceVariant::Default, Vec::new())
    }

    pub fn records(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Detect the identifier column by testing candidates in priority order
    /// against the first record's columns. `None` when the table is empty
    /// or no candidate is present.
    pub fn detect_id_column(&self, candidates: &[&str]) -> Option<String> {
        let first = self.rows.first()?;
        candidates
            .iter()
            .copied()
            .find(|&c| first.contains_key(c))
            .map(str::to_string)
    }

    /// Build an identifier → record index for one lookup pass.
    pub fn index_by_id(&self, id_column: &str) -> BTreeMap<String, &Record> {
        let mut idx = BTreeMap::new();
        for r in &self.rows {
            let rid = r.value(id_column);
            if !rid.is_empty() {
                idx.insert(rid.to_string(), r);
            }
        }
        idx
    }

    /// Find a single record by identifier, trying candidate ID columns in
    /// order.
    pub fn find_by_id(&self, candidates: &[&str], id: &str) -> Option<&Record> {
        let want = id.trim();
        if want.is_empty() {
            return None;
        }
        for cand in candidates {
            for r in &self.rows {
                if r.value(cand) == want {
                    return Some(r);
                }
            }
        }
        None
    }
}

/// Anything that can hand out effective catalogues by name. The seam
/// between resolution logic and whatever owns the tables (disk-backed
/// store, process-wide hub cache, in-memory fixtures in tests).
pub trait CatalogueSource {
    fn catalogue(&self, name: &str) -> Catalogue;
}

// ── Store ────────────────────────────────────────────────────────

/// Disk-backed catalogue store.
///
/// Holds no table state of its own: every call re-resolves the
/// active-over-default variant from disk, so there is no staleness to
/// invalidate. Caching (and the once-per-reload policy) lives in the
/// [`IntegratorHub`](crate::hub::IntegratorHub).
///
/// Writes are out of scope here. The surrounding system replaces whole
/// catalogue files; two simultaneous replacements of the same catalogue are
/// last-write-wins with no ordering guarantee. Read passes through this
/// store are safe against each other but not against a concurrent replace.
#[derive(Debug, Clone)]
pub struct CatalogueStore {
    active_dir: PathBuf,
    default_dir: PathBuf,
}

impl CatalogueStore {
    pub fn new(active_dir: impl Into<PathBuf>, default_dir: impl Into<PathBuf>) -> Self {
        Self {
            active_dir: active_dir.into(),
            default_dir: default_dir.into(),
        }
    }

    /// Conventional layout: `<base>/catalogues` active, `<base>/defaults`
    /// shipped.
    pub fn under_base(base: &Path) -> Self {
        Self::new(base.join("catalogues"), base.join("defaults"))
    }

    pub fn active_path(&self, name: &str) -> PathBuf {
        self.active_dir.join(format!("{name}.csv"))
    }

    pub fn default_path(&self, name: &str) -> PathBuf {
        self.default_dir.join(format!("{name}.csv"))
    }

    /// Load one specific variant; any read failure is an empty table.
    pub fn load(&self, name: &str, variant: SourceVariant) -> Catalogue {
        let path = match variant {
            SourceVariant::Active => self.active_path(name),
            SourceVariant::Default => self.default_path(name),
        };
        let rows = load_table(&path);
        debug!(catalogue = name, ?variant, rows = rows.len(), "loaded catalogue");
        Catalogue::new(name, variant, rows)
    }

    /// Effective view: active if the working file exists, else the shipped
    /// default. Re-evaluated on every call.
    pub fn effective(&self, name: &str) -> Catalogue {
        if self.active_path(name).is_file() {
            self.load(name, SourceVariant::Active)
        } else {
            self.load(name, SourceVariant::Default)
        }
    }

    /// Owned copy of the effective catalogue. Callers can never reach store
    /// internals through the returned value.
    pub fn get(&self, name: &str) -> Catalogue {
        self.effective(name)
    }
}

impl CatalogueSource for CatalogueStore {
    fn catalogue(&self, name: &str) -> Catalogue {
        self.effective(name)
    }
}
