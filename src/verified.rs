//! Verified artefact construction.
//!
//! A verified artefact is the immutable snapshot handed to downstream
//! consumers: one bundle, its manifest, and freshly resolved catalogue
//! subsets frozen into a single uniquely-named JSON file. Everything a
//! consumer might need to dereference is embedded as full record bodies;
//! everything that could not be resolved is documented in missing-ID lists
//! instead of being dropped. The only hard failures are the final write and
//! caller contract bugs — an unresolved reference never blocks the build.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::bundle::Bundle;
use crate::catalogue::{
    id_column_candidates, Catalogue, CatalogueSource, BACKBONE_CATALOGUES, LENS_CATALOGUES,
};
use crate::error::{CrtError, Result};
use crate::fields::FieldAliasResolver;
use crate::manifest::{anchor_catalogue_for_id, Manifest};
use crate::record::Record;
use crate::resolver::{collect_mapped_ids, select_rows_by_ids, ResolvedSet};
use crate::semantics::{
    default_lens_semantics, frameworks_mode_semantics, FrameworksModeSemantics,
    LensContextSemantics,
};

pub const VERIFIED_VERSION: &str = "1.0";

fn control_fields() -> FieldAliasResolver {
    FieldAliasResolver::new(["mapped_control_ids", "mapped_controls", "control_ids"])
}

fn policy_fields() -> FieldAliasResolver {
    FieldAliasResolver::new(["mapped_policy_ids", "mapped_policies", "policy_ids"])
}

fn failure_fields() -> FieldAliasResolver {
    FieldAliasResolver::new(["mapped_failure_ids", "failure_ids", "mapped_failures", "failures"])
        .with_prefix("mapped_fail")
}

fn compensation_fields() -> FieldAliasResolver {
    FieldAliasResolver::new([
        "mapped_compensation_ids",
        "compensation_ids",
        "mapped_compensations",
        "compensations",
    ])
    .with_prefix("mapped_comp")
}

// ── Attachment shapes ────────────────────────────────────────────

/// Metadata-only orientation view of a catalogue (no record bodies).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogueMeta {
    pub record_count: usize,
    pub headers: Vec<String>,
}

fn catalogue_meta(cat: &Catalogue) -> CatalogueMeta {
    let headers: BTreeSet<String> = cat
        .records()
        .iter()
        .flat_map(|r| r.keys().map(str::to_string))
        .collect();
    CatalogueMeta {
        record_count: cat.len(),
        headers: headers.into_iter().collect(),
    }
}

/// In-scope subset of one catalogue, selected by explicit identifiers
/// (requirement sets, obligations).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopedRecords {
    pub catalogue_meta: CatalogueMeta,
    pub id_column: Option<String>,
    pub records_in_scope: Vec<Record>,
    pub missing_ids: Vec<String>,
}

/// The resolved control spine: broad (every referenced control) and tight
/// (anchor-mapped only), with full record bodies for both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlScope {
    pub id_column: Option<String>,
    pub referenced_control_ids: Vec<String>,
    pub anchor_control_ids: Vec<String>,
    pub controls_broad: Vec<Record>,
    pub missing_broad: Vec<String>,
    pub controls_tight: Vec<Record>,
    pub missing_tight: Vec<String>,
}

/// A catalogue subset derived from the resolved control set (failures via
/// mapped failure IDs, compensations via mapped compensation IDs).
/// "Focused" means rooted at the tight anchor controls when an anchor
/// exists, else at the broad referenced set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivedScope {
    pub id_column: Option<String>,
    pub focus_ids: Vec<String>,
    pub records_focused: Vec<Record>,
    pub missing_focused: Vec<String>,
    pub broad_ids: Vec<String>,
    pub records_broad: Vec<Record>,
    pub missing_broad: Vec<String>,
}

impl DerivedScope {
    fn from_sets(focused: ResolvedSet, broad: ResolvedSet) -> Self {
        Self {
            id_column: focused.id_column_used.or(broad.id_column_used),
            focus_ids: focused.requested_ids,
            records_focused: focused.matched_records,
            missing_focused: focused.missing_ids,
            broad_ids: broad.requested_ids,
            records_broad: broad.matched_records,
            missing_broad: broad.missing_ids,
        }
    }
}

/// The anchor record, when the anchor identifier sniffs to a known
/// catalogue. Its mapped control IDs are the tight definition of the
/// artefact's intended control scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnchorAttachment {
    pub catalogue: String,
    pub id_field: String,
    pub record: Option<Record>,
    pub mapped_control_ids: Vec<String>,
    pub mapped_policy_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LensContextAttachment {
    pub default_lens_context: String,
    pub catalogues: BTreeMap<String, CatalogueMeta>,
}

/// Every resolved catalogue subset attached to a verified artefact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attachments {
    pub requirements: ScopedRecords,
    pub obligations: ScopedRecords,
    pub backbone: BTreeMap<String, CatalogueMeta>,
    pub controls: ControlScope,
    pub failures: DerivedScope,
    pub compensations: DerivedScope,
    pub anchor: AnchorAttachment,
    pub lens_context: LensContextAttachment,
}

// ── Emphasis ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappedContextPresent {
    pub requirement_records_in_scope: usize,
    pub obligation_records_in_scope: usize,
    pub lens_bundles_selected: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomInputsPresent {
    pub custom_titles: bool,
    pub custom_notes: bool,
}

/// Advisory counts of explicitly mapped context vs free-text input. A
/// downstream consumer uses this to weight its starting point; it is never
/// a filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Emphasis {
    pub mapped_context_present: MappedContextPresent,
    pub custom_inputs_present: CustomInputsPresent,
}

// ── Artefact ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identity {
    pub anchor_id: String,
    pub anchor_name: String,
    pub programme_mode: String,
    pub task_type: String,
    pub template_id: String,
    pub template_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedSemantics {
    pub frameworks_mode: FrameworksModeSemantics,
    pub default_lens_context: LensContextSemantics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InScope {
    pub frameworks_in_scope: Vec<String>,
    pub obligations_ids_in_scope: Vec<String>,
    pub lens_keys: Vec<String>,
}

/// Immutable snapshot of one build action. Created once, never
/// overwritten; filename collisions get an incrementing version suffix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedArtifact {
    pub verified_version: String,
    pub created_at_utc: String,
    pub bundle_id: String,
    pub identity: Identity,
    pub resolved_semantics: ResolvedSemantics,
    pub in_scope: InScope,
    pub attachments: Attachments,
    pub emphasis: Emphasis,
    pub manifest: Value,
    pub bundle: Bundle,
}

impl VerifiedArtifact {
    /// Serialize to a uniquely named file under `dir`:
    /// `verified__<anchor-slug>__<timestamp>[__v<N>].json`.
    ///
    /// Never overwrites: a logical-key collision appends `__v2`, `__v3`, …
    /// A write failure is surfaced with the attempted path — silent loss of
    /// a verification record is unacceptable.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|source| CrtError::PersistFailed {
            path: dir.to_path_buf(),
            source,
        })?;

        let slug = {
            let hint = if self.identity.anchor_id.is_empty() {
                self.identity.anchor_name.as_str()
            } else {
                self.identity.anchor_id.as_str()
            };
            safe_filename_fragment(hint, 32)
        };
        let ts = Utc::now().format("%Y%m%d_%H%M%S");

        let mut path = dir.join(format!("verified__{slug}__{ts}.json"));
        let mut n = 2;
        while path.exists() {
            path = dir.join(format!("verified__{slug}__{ts}__v{n}.json"));
            n += 1;
        }

        let body = serde_json::to_string_pretty(self)?;
        fs::write(&path, body).map_err(|source| CrtError::PersistFailed {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "verified artefact written");
        Ok(path)
    }
}

/// Reduce an anchor hint to a filesystem-safe fragment.
pub fn safe_filename_fragment(hint: &str, max_len: usize) -> String {
    let cleaned: String = hint
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .take(max_len)
        .collect();
    let cleaned = cleaned.trim_matches('-').to_string();
    if cleaned.is_empty() {
        "artefact".to_string()
    } else {
        cleaned
    }
}

// ── Builder ──────────────────────────────────────────────────────

/// Assembles verified artefacts from a bundle, a manifest, and freshly
/// resolved catalogue subsets.
pub struct VerifiedArtifactBuilder<'a, S: CatalogueSource> {
    source: &'a S,
}

impl<'a, S: CatalogueSource> VerifiedArtifactBuilder<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Build the artefact. Unresolvable references degrade to empty
    /// subsets and missing-ID markers; this method itself cannot fail.
    pub fn build(&self, bundle: &Bundle, manifest: &Manifest) -> VerifiedArtifact {
        let scope = &manifest.org_governance_scope;

        // In-scope requirement sets and obligations, full bodies attached.
        let req_cat = self.source.catalogue("CRT-REQ");
        let requirements = scoped_records(&req_cat, "CRT-REQ", &scope.frameworks_in_scope);

        let lr_cat = self.source.catalogue("CRT-LR");
        let obligations = scoped_records(&lr_cat, "CRT-LR", &scope.obligations_ids_in_scope);

        // Anchor record (tight definition of intended control scope).
        let anchor = self.resolve_anchor(&manifest.artefact_anchor.anchor_id);

        // Broad referenced controls: anchor-mapped plus every control
        // referenced by an in-scope obligation or requirement set.
        let mut referenced: BTreeSet<String> =
            anchor.mapped_control_ids.iter().cloned().collect();
        referenced.extend(collect_mapped_ids(&obligations.records_in_scope, &control_fields()));
        referenced.extend(collect_mapped_ids(&requirements.records_in_scope, &control_fields()));

        let anchor_set: BTreeSet<String> = anchor.mapped_control_ids.iter().cloned().collect();

        let controls_cat = self.source.catalogue("CRT-C");
        let c_candidates = id_column_candidates("CRT-C");
        let broad = select_rows_by_ids(&controls_cat, c_candidates, &referenced);
        let tight = select_rows_by_ids(&controls_cat, c_candidates, &anchor_set);

        // Focus order: tight anchor controls when present, else the broad
        // referenced set.
        let focus_controls: &[Record] = if !tight.matched_records.is_empty() {
            &tight.matched_records
        } else {
            &broad.matched_records
        };

        let failures_cat = self.source.catalogue("CRT-F");
        let f_candidates = id_column_candidates("CRT-F");
        let failures = DerivedScope::from_sets(
            select_rows_by_ids(
                &failures_cat,
                f_candidates,
                &collect_mapped_ids(focus_controls, &failure_fields()),
            ),
            select_rows_by_ids(
                &failures_cat,
                f_candidates,
                &collect_mapped_ids(&broad.matched_records, &failure_fields()),
            ),
        );

        let comp_cat = self.source.catalogue("CRT-N");
        let n_candidates = id_column_candidates("CRT-N");
        let compensations = DerivedScope::from_sets(
            select_rows_by_ids(
                &comp_cat,
                n_candidates,
                &collect_mapped_ids(focus_controls, &compensation_fields()),
            ),
            select_rows_by_ids(
                &comp_cat,
                n_candidates,
                &collect_mapped_ids(&broad.matched_records, &compensation_fields()),
            ),
        );

        debug!(
            broad_controls = broad.matched_records.len(),
            tight_controls = tight.matched_records.len(),
            failures = failures.records_focused.len(),
            compensations = compensations.records_focused.len(),
            "resolved verified-artefact scopes"
        );

        // Orientation metadata for the backbone and lens catalogues.
        let backbone: BTreeMap<String, CatalogueMeta> = BACKBONE_CATALOGUES
            .iter()
            .map(|name| (name.to_string(), catalogue_meta(&self.source.catalogue(name))))
            .collect();
        let lens_context = LensContextAttachment {
            default_lens_context: manifest.default_lens_context().to_string(),
            catalogues: LENS_CATALOGUES
                .iter()
                .map(|name| (name.to_string(), catalogue_meta(&self.source.catalogue(name))))
                .collect(),
        };

        let emphasis = Emphasis {
            mapped_context_present: MappedContextPresent {
                requirement_records_in_scope: requirements.records_in_scope.len(),
                obligation_records_in_scope: obligations.records_in_scope.len(),
                lens_bundles_selected: manifest.lens_keys().len(),
            },
            custom_inputs_present: CustomInputsPresent {
                custom_titles: manifest.has_custom_titles(),
                custom_notes: manifest.has_custom_notes(),
            },
        };

        let controls = ControlScope {
            id_column: broad.id_column_used.clone().or(tight.id_column_used.clone()),
            referenced_control_ids: broad.requested_ids,
            anchor_control_ids: tight.requested_ids,
            controls_broad: broad.matched_records,
            missing_broad: broad.missing_ids,
            controls_tight: tight.matched_records,
            missing_tight: tight.missing_ids,
        };

        VerifiedArtifact {
            verified_version: VERIFIED_VERSION.to_string(),
            created_at_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            bundle_id: manifest.bundle_id.clone(),
            identity: Identity {
                anchor_id: manifest.artefact_anchor.anchor_id.clone(),
                anchor_name: manifest.artefact_anchor.anchor_name.clone(),
                programme_mode: manifest.programme_mode.clone(),
                task_type: manifest.task_type.clone(),
                template_id: manifest.template.template_id.clone(),
                template_source: manifest.template.source_label().to_string(),
            },
            resolved_semantics: ResolvedSemantics {
                frameworks_mode: frameworks_mode_semantics(&scope.frameworks_mode),
                default_lens_context: default_lens_semantics(manifest.default_lens_context()),
            },
            in_scope: InScope {
                frameworks_in_scope: scope.frameworks_in_scope.clone(),
                obligations_ids_in_scope: scope.obligations_ids_in_scope.clone(),
                lens_keys: manifest.lens_keys(),
            },
            attachments: Attachments {
                requirements,
                obligations,
                backbone,
                controls,
                failures,
                compensations,
                anchor,
                lens_context,
            },
            emphasis,
            manifest: manifest.slim_for_verified(),
            bundle: bundle.clone(),
        }
    }

    fn resolve_anchor(&self, anchor_id: &str) -> AnchorAttachment {
        let Some((catalogue_name, id_field)) = anchor_catalogue_for_id(anchor_id) else {
            return AnchorAttachment::default();
        };
        let cat = self.source.catalogue(catalogue_name);
        let record = cat.find_by_id(&[id_field], anchor_id).cloned();

        let (mapped_control_ids, mapped_policy_ids) = match &record {
            Some(r) => {
                let singleton = std::slice::from_ref(r);
                (
                    collect_mapped_ids(singleton, &control_fields())
                        .into_iter()
                        .collect(),
                    collect_mapped_ids(singleton, &policy_fields())
                        .into_iter()
                        .collect(),
                )
            }
            None => (Vec::new(), Vec::new()),
        };

        AnchorAttachment {
            catalogue: catalogue_name.to_string(),
            id_field: id_field.to_string(),
            record,
            mapped_control_ids,
            mapped_policy_ids,
        }
    }
}

fn scoped_records(cat: &Catalogue, name: &str, wanted_ids: &[String]) -> ScopedRecords {
    let wanted: BTreeSet<String> = wanted_ids.iter().cloned().collect();
    let set = select_rows_by_ids(cat, id_column_candidates(name), &wanted);
    ScopedRecords {
        catalogue_meta: catalogue_meta(cat),
        id_column: set.id_column_used,
        records_in_scope: set.matched_records,
        missing_ids: set.missing_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{assemble, PrimaryEntity, StructuralFindings};
    use crate::catalogue::SourceVariant;
    use std::collections::HashMap;

    struct InMemory(HashMap<String, Catalogue>);

    impl InMemory {
        fn with(tables: Vec<Catalogue>) -> Self {
            Self(tables.into_iter().map(|c| (c.name.clone(), c)).collect())
        }
    }

    impl CatalogueSource for InMemory {
        fn catalogue(&self, name: &str) -> Catalogue {
            self.0
                .get(name)
                .cloned()
                .unwrap_or_else(|| Catalogue::empty(name))
        }
    }

    fn cat(name: &str, rows: Vec<Record>) -> Catalogue {
        Catalogue::new(name, SourceVariant::Default, rows)
    }

    fn fixture_source() -> InMemory {
        InMemory::with(vec![
            cat(
                "CRT-STD",
                vec![Record::from_pairs([
                    ("standard_id", "STD-0002"),
                    ("name", "Access Standard"),
                    ("mapped_control_ids", "CRT-C-0001"),
                    ("mapped_policy_ids", "POL-0001"),
                ])],
            ),
            cat(
                "CRT-C",
                vec![
                    Record::from_pairs([
                        ("control_id", "CRT-C-0001"),
                        ("mapped_failure_ids", "FM-001; FM-002"),
                        ("mapped_compensation_ids", "CRT-N-0001"),
                    ]),
                    Record::from_pairs([
                        ("control_id", "CRT-C-0002"),
                        ("mapped_failure_ids", "FM-003"),
                    ]),
                ],
            ),
            cat(
                "CRT-F",
                vec![
                    Record::from_pairs([("failure_id", "FM-001"), ("title", "Stale access")]),
                    Record::from_pairs([("failure_id", "FM-003"), ("title", "No rollback")]),
                ],
            ),
            cat(
                "CRT-N",
                vec![Record::from_pairs([
                    ("n_id", "CRT-N-0001"),
                    ("title", "Manual review"),
                ])],
            ),
            cat(
                "CRT-LR",
                vec![Record::from_pairs([
                    ("lr_id", "LR-01"),
                    ("mapped_control_ids", "CRT-C-0002"),
                ])],
            ),
        ])
    }

    fn fixture_manifest() -> Manifest {
        Manifest::from_value(serde_json::json!({
            "bundle_id": "B-1",
            "task_type": "standard_refresh",
            "artefact_anchor": {"anchor_id": "STD-0002", "anchor_name": "Access Standard"},
            "org_governance_scope": {
                "frameworks_mode": "overlay",
                "obligations_ids_in_scope": ["LR-01", "LR-99"]
            }
        }))
    }

    fn fixture_bundle() -> Bundle {
        assemble(
            "PBX",
            "governance",
            PrimaryEntity::new("standard", "STD-0002"),
            BTreeMap::new(),
            Vec::new(),
            StructuralFindings::default(),
            &BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn tight_scope_follows_the_anchor_and_broad_follows_references() {
        let source = fixture_source();
        let artifact = VerifiedArtifactBuilder::new(&source)
            .build(&fixture_bundle(), &fixture_manifest());

        let controls = &artifact.attachments.controls;
        assert_eq!(controls.anchor_control_ids, vec!["CRT-C-0001"]);
        assert_eq!(
            controls.referenced_control_ids,
            vec!["CRT-C-0001", "CRT-C-0002"]
        );
        assert_eq!(controls.controls_tight.len(), 1);
        assert_eq!(controls.controls_broad.len(), 2);

        // Focused failures derive from the tight control set only.
        let failures = &artifact.attachments.failures;
        assert_eq!(failures.focus_ids, vec!["FM-001", "FM-002"]);
        assert_eq!(failures.missing_focused, vec!["FM-002"]);
        assert_eq!(failures.records_focused.len(), 1);
        assert_eq!(failures.records_focused[0].value("title"), "Stale access");

        // Broad failures include the obligation-referenced control's too.
        assert_eq!(failures.broad_ids, vec!["FM-001", "FM-002", "FM-003"]);
        assert_eq!(failures.records_broad.len(), 2);
    }

    #[test]
    fn missing_obligations_are_documented_not_dropped() {
        let source = fixture_source();
        let artifact = VerifiedArtifactBuilder::new(&source)
            .build(&fixture_bundle(), &fixture_manifest());

        let obligations = &artifact.attachments.obligations;
        assert_eq!(obligations.records_in_scope.len(), 1);
        assert_eq!(obligations.missing_ids, vec!["LR-99"]);
    }

    #[test]
    fn empty_universe_still_produces_an_artifact() {
        let source = InMemory::with(vec![]);
        let artifact = VerifiedArtifactBuilder::new(&source)
            .build(&fixture_bundle(), &fixture_manifest());

        assert!(artifact.attachments.controls.controls_broad.is_empty());
        assert!(artifact.attachments.failures.records_focused.is_empty());
        // The requested obligations are all documented as missing.
        assert_eq!(
            artifact.attachments.obligations.missing_ids,
            vec!["LR-01", "LR-99"]
        );
        assert_eq!(artifact.verified_version, VERIFIED_VERSION);
    }

    #[test]
    fn semantics_and_emphasis_are_resolved() {
        let source = fixture_source();
        let artifact = VerifiedArtifactBuilder::new(&source)
            .build(&fixture_bundle(), &fixture_manifest());

        assert_eq!(artifact.resolved_semantics.frameworks_mode.mode_key, "overlay");
        assert_eq!(
            artifact.resolved_semantics.default_lens_context.context_key,
            "broad_scope"
        );
        let e = &artifact.emphasis.mapped_context_present;
        assert_eq!(e.obligation_records_in_scope, 1);
        assert_eq!(e.requirement_records_in_scope, 0);
        assert!(!artifact.emphasis.custom_inputs_present.custom_notes);
    }

    #[test]
    fn anchor_record_is_attached_with_full_body() {
        let source = fixture_source();
        let artifact = VerifiedArtifactBuilder::new(&source)
            .build(&fixture_bundle(), &fixture_manifest());

        let anchor = &artifact.attachments.anchor;
        assert_eq!(anchor.catalogue, "CRT-STD");
        assert_eq!(anchor.id_field, "standard_id");
        assert_eq!(
            anchor.record.as_ref().unwrap().value("name"),
            "Access Standard"
        );
        assert_eq!(anchor.mapped_policy_ids, vec!["POL-0001"]);
    }

    #[test]
    fn slimmed_manifest_drops_identity_fields() {
        let source = fixture_source();
        let artifact = VerifiedArtifactBuilder::new(&source)
            .build(&fixture_bundle(), &fixture_manifest());
        assert!(artifact.manifest.get("bundle_id").is_none());
        assert_eq!(artifact.identity.anchor_id, "STD-0002");
        assert_eq!(artifact.identity.task_type, "standard_refresh");
    }

    #[test]
    fn filename_fragments_are_sanitised() {
        assert_eq!(safe_filename_fragment("STD-0002", 32), "STD-0002");
        assert_eq!(safe_filename_fragment("a b/c", 32), "a-b-c");
        assert_eq!(safe_filename_fragment("///", 32), "artefact");
        assert_eq!(safe_filename_fragment("", 32), "artefact");
        assert_eq!(safe_filename_fragment(&"x".repeat(64), 32).len(), 32);
    }
}
