//! Locked-schema bundle assembly.
//!
//! A bundle is the fixed-shape structured output of one build action:
//! primary entity, grouped catalogue slices, relationships, structural
//! findings, and guardrail flags. Assembly is a pure shape-normalising
//! step — no I/O, no interpretation of catalogue content. The schema is
//! locked: every entity group is always present (possibly empty) and the
//! three core guardrails can never be flipped off by a caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CrtError, Result};
use crate::record::Record;

/// Approved bundle types. Informational; the assembler does not reject
/// other values, matching the append-friendly catalogue conventions.
pub const BUNDLE_TYPES: [&str; 10] = [
    "architecture",
    "exposure",
    "metrics",
    "simulation",
    "supply_chain",
    "identity",
    "data",
    "governance",
    "signals",
    "observation",
];

// ── Entity groups ────────────────────────────────────────────────

/// The fixed entity-group keys of the locked schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Assets,
    Identities,
    DataDomains,
    Vendors,
    Controls,
    Failures,
    Telemetry,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Assets,
        EntityKind::Identities,
        EntityKind::DataDomains,
        EntityKind::Vendors,
        EntityKind::Controls,
        EntityKind::Failures,
        EntityKind::Telemetry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Assets => "assets",
            EntityKind::Identities => "identities",
            EntityKind::DataDomains => "data_domains",
            EntityKind::Vendors => "vendors",
            EntityKind::Controls => "controls",
            EntityKind::Failures => "failures",
            EntityKind::Telemetry => "telemetry",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == key)
    }
}

/// Catalogue slices grouped by entity kind. Every group serializes even
/// when empty — consumers never need to probe for key presence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityGroups {
    pub assets: Vec<Record>,
    pub identities: Vec<Record>,
    pub data_domains: Vec<Record>,
    pub vendors: Vec<Record>,
    pub controls: Vec<Record>,
    pub failures: Vec<Record>,
    pub telemetry: Vec<Record>,
}

impl EntityGroups {
    pub fn group_mut(&mut self, kind: EntityKind) -> &mut Vec<Record> {
        match kind {
            EntityKind::Assets => &mut self.assets,
            EntityKind::Identities => &mut self.identities,
            EntityKind::DataDomains => &mut self.data_domains,
            EntityKind::Vendors => &mut self.vendors,
            EntityKind::Controls => &mut self.controls,
            EntityKind::Failures => &mut self.failures,
            EntityKind::Telemetry => &mut self.telemetry,
        }
    }
}

// ── Relationships and findings ───────────────────────────────────

/// One structural edge between two catalogue entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_type: String,
    pub from_id: String,
    pub rel: String,
    pub to_type: String,
    pub to_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gap {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compensation {
    pub n_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Structural findings derived by a module: gaps, relevant compensations,
/// coverage arrays, propagation paths. Content stays structural, never
/// advisory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralFindings {
    pub gaps: Vec<Gap>,
    pub compensations: Vec<Compensation>,
    pub coverage: Value,
    pub propagation_paths: Vec<Vec<Value>>,
}

impl Default for StructuralFindings {
    fn default() -> Self {
        Self {
            gaps: Vec::new(),
            compensations: Vec::new(),
            coverage: Value::Object(Default::default()),
            propagation_paths: Vec::new(),
        }
    }
}

// ── Primary entity ───────────────────────────────────────────────

/// The entity a build action is about, e.g. `{"type": "data_domain",
/// "id": "D-0003"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: String,
}

impl PrimaryEntity {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Parse a loose JSON shape from a boundary caller. A malformed shape
    /// is a programming mistake, surfaced loudly.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| CrtError::ContractViolation("primary_entity must be an object".into()))?;
        let field = |name: &str| -> Result<String> {
            obj.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    CrtError::ContractViolation(format!(
                        "primary_entity missing string field `{name}`"
                    ))
                })
        };
        Ok(Self {
            entity_type: field("type")?,
            id: field("id")?,
        })
    }
}

// ── Bundle ───────────────────────────────────────────────────────

/// The locked top-level bundle schema. Constructed once per build action
/// and immediately serialized; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub bundle_type: String,
    pub module: String,
    pub primary_entity: PrimaryEntity,
    pub entities: EntityGroups,
    pub relationships: Vec<Relationship>,
    pub structural_findings: StructuralFindings,
    pub guardrails: BTreeMap<String, bool>,
}

impl Bundle {
    /// Deterministic prettified JSON for display and export panels.
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The locked top-level key set every bundle must carry.
pub const BUNDLE_REQUIRED_KEYS: [&str; 7] = [
    "bundle_type",
    "module",
    "primary_entity",
    "entities",
    "relationships",
    "structural_findings",
    "guardrails",
];

/// Structural contract check on an already-serialized bundle: the fixed
/// top-level key set is present. Not a deep schema validator.
pub fn has_locked_shape(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) => BUNDLE_REQUIRED_KEYS.iter().all(|k| obj.contains_key(*k)),
        None => false,
    }
}

fn locked_guardrails(extra: &BTreeMap<String, bool>) -> BTreeMap<String, bool> {
    let mut flags = extra.clone();
    // Core flags are fixed true regardless of what the caller passed.
    flags.insert("no_advice".to_string(), true);
    flags.insert("no_configuration".to_string(), true);
    flags.insert("no_assurance".to_string(), true);
    flags
}

/// Construct a locked-schema bundle.
///
/// Pure and total over valid input: equivalent inputs yield structurally
/// identical bundles. An unrecognised entity-type key is a caller bug and
/// raises rather than silently discarding data.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    module: &str,
    bundle_type: &str,
    primary_entity: PrimaryEntity,
    entities_by_type: BTreeMap<String, Vec<Record>>,
    relationships: Vec<Relationship>,
    structural_findings: StructuralFindings,
    extra_guardrails: &BTreeMap<String, bool>,
) -> Result<Bundle> {
    let mut entities = EntityGroups::default();
    for (key, mut records) in entities_by_type {
        let kind = EntityKind::from_key(&key).ok_or_else(|| {
            CrtError::ContractViolation(format!("unknown entity type key: `{key}`"))
        })?;
        entities.group_mut(kind).append(&mut records);
    }

    Ok(Bundle {
        bundle_type: bundle_type.to_string(),
        module: module.to_string(),
        primary_entity,
        entities,
        relationships,
        structural_findings,
        guardrails: locked_guardrails(extra_guardrails),
    })
}

// ── Module-side accumulation state ───────────────────────────────

/// Shared accumulation container modules fill while collecting input and
/// building structural mappings, before the final assemble step.
#[derive(Debug, Clone, Default)]
pub struct BundleState {
    pub primary_entity: PrimaryEntity,
    entities: EntityGroups,
    relationships: Vec<Relationship>,
    findings: StructuralFindings,
}

impl BundleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one catalogue record under an entity-group key. Unknown keys
    /// are caller bugs, not data.
    pub fn add_entity(&mut self, kind_key: &str, record: Record) -> Result<()> {
        let kind = EntityKind::from_key(kind_key).ok_or_else(|| {
            CrtError::ContractViolation(format!("unknown entity type key: `{kind_key}`"))
        })?;
        self.entities.group_mut(kind).push(record);
        Ok(())
    }

    pub fn add_relationship(
        &mut self,
        from_type: &str,
        from_id: &str,
        rel: &str,
        to_type: &str,
        to_id: &str,
    ) {
        self.relationships.push(Relationship {
            from_type: from_type.to_string(),
            from_id: from_id.to_string(),
            rel: rel.to_string(),
            to_type: to_type.to_string(),
            to_id: to_id.to_string(),
        });
    }

    /// Register a structural gap, e.g. "No mapped telemetry source for this
    /// control".
    pub fn note_gap(&mut self, description: &str, context: Option<BTreeMap<String, String>>) {
        self.findings.gaps.push(Gap {
            description: description.to_string(),
            context,
        });
    }

    /// Register a relevant compensating control. Notes stay structural
    /// ("Mapped via CRT-C-0007"), never advisory.
    pub fn note_compensation(&mut self, n_id: &str, notes: Option<String>) {
        self.findings.compensations.push(Compensation {
            n_id: n_id.to_string(),
            notes,
        });
    }

    pub fn set_coverage(&mut self, coverage: Value) {
        self.findings.coverage = coverage;
    }

    pub fn add_propagation_path(&mut self, path: Vec<Value>) {
        self.findings.propagation_paths.push(path);
    }

    /// Final step: construct the locked-schema bundle from the accumulated
    /// state.
    pub fn into_bundle(
        self,
        module: &str,
        bundle_type: &str,
        extra_guardrails: &BTreeMap<String, bool>,
    ) -> Result<Bundle> {
        Ok(Bundle {
            bundle_type: bundle_type.to_string(),
            module: module.to_string(),
            primary_entity: self.primary_entity,
            entities: self.entities,
            relationships: self.relationships,
            structural_findings: self.findings,
            guardrails: locked_guardrails(extra_guardrails),
        })
    }
}
