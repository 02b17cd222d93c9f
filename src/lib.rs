//! CRT core — the structural relationship resolution and bundle assembly
//! engine behind the Cyber Resilience Toolkit catalogues.
//!
//! The toolkit is a set of normalised tabular catalogues (controls,
//! failure modes, compensations, requirements, obligations, policies,
//! standards, assets, identities, vendors, telemetry) cross-referenced by
//! delimited identifier lists stored in text columns. This crate owns the
//! part with real invariants:
//!
//! - parsing heterogeneous delimited-ID columns into identifier sets;
//! - resolving cross-catalogue joins deterministically, with a *tight*
//!   anchor-derived scope distinguished from a *broad* referenced scope;
//! - tracking unresolved identifiers for traceability at every step;
//! - assembling resolved data into a locked-schema, guardrail-tagged
//!   bundle and an immutable verified snapshot for downstream consumers.
//!
//! Everything user-facing (UI, uploads, backups, templating, prompt
//! construction) lives outside this crate and consumes these shapes.
//!
//! This crate never:
//! - mutates source catalogues;
//! - calls any external AI or network service;
//! - performs risk scoring, maturity assessment, or assurance judgments.

mod bundle;
mod catalogue;
mod error;
mod fields;
mod hub;
mod idlist;
mod manifest;
mod record;
mod resolver;
mod semantics;
mod tabular;
mod verified;

pub use bundle::{
    assemble, has_locked_shape, Bundle, BundleState, Compensation, EntityGroups, EntityKind, Gap,
    PrimaryEntity, Relationship, StructuralFindings, BUNDLE_REQUIRED_KEYS, BUNDLE_TYPES,
};
pub use catalogue::{
    id_column_candidates, Catalogue, CatalogueSource, CatalogueStore, SourceVariant,
    ALL_CATALOGUES, BACKBONE_CATALOGUES, GOVERNANCE_CATALOGUES, KEY_COLUMN_CANDIDATES,
    LENS_CATALOGUES,
};
pub use error::{CrtError, Result};
pub use fields::FieldAliasResolver;
pub use hub::{reset_shared, shared, IntegratorHub};
pub use idlist::parse_id_list;
pub use manifest::{
    anchor_catalogue_for_id, compact_list, ArtefactAnchor, BaselineInclusions, Manifest,
    OrgGovernanceScope, TemplateScaffold,
};
pub use record::{strip_bom_key, Record};
pub use resolver::{collect_mapped_ids, resolve, select_rows_by_ids, ResolvedSet};
pub use semantics::{
    default_lens_semantics, frameworks_mode_semantics, FrameworksModeSemantics,
    LensContextSemantics,
};
pub use tabular::{load_table, parse_table, read_text_with_fallback};
pub use verified::{
    safe_filename_fragment, AnchorAttachment, Attachments, CatalogueMeta, ControlScope,
    CustomInputsPresent, DerivedScope, Emphasis, Identity, InScope, LensContextAttachment,
    MappedContextPresent, ResolvedSemantics, ScopedRecords, VerifiedArtifact,
    VerifiedArtifactBuilder, VERIFIED_VERSION,
};
