//! Read-only view of the manifest produced alongside a bundle.
//!
//! The core only consumes a handful of structured fields (task type, anchor,
//! template sections, org-scope mode flags) and never interprets free text.
//! Manifests arrive as loose JSON written by the surrounding system, so
//! every field is default-tolerant: a missing or oddly-typed field reads as
//! empty rather than failing the build.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Tolerant string field: non-strings and blanks read as `""`.
fn de_loose_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_str().map(|s| s.trim().to_string()).unwrap_or_default())
}

/// Tolerant structured sub-object: a wrong-typed value degrades to that
/// field's default instead of poisoning every other field of the manifest.
fn de_loose_object<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let v = Value::deserialize(d)?;
    Ok(serde_json::from_value(v).unwrap_or_default())
}

/// Tolerant string list: a bare string becomes a one-element list, anything
/// non-listy becomes empty, entries are trimmed and blanks dropped.
fn de_loose_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(compact_list(&v))
}

/// Normalise an unknown list-like value into a clean `Vec<String>`.
pub fn compact_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                Vec::new()
            } else {
                vec![t.to_string()]
            }
        }
        Value::Array(items) => items
            .iter()
            .filter_map(|x| x.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtefactAnchor {
    #[serde(default, deserialize_with = "de_loose_string")]
    pub anchor_id: String,
    #[serde(default, deserialize_with = "de_loose_string")]
    pub anchor_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateScaffold {
    #[serde(default, deserialize_with = "de_loose_string")]
    pub template_id: String,
    #[serde(
        default,
        alias = "source",
        deserialize_with = "de_loose_string"
    )]
    pub template_source: String,
    #[serde(default, deserialize_with = "de_loose_list")]
    pub sections: Vec<String>,
}

impl TemplateScaffold {
    /// Source label, defaulting to `"default"` when unset.
    pub fn source_label(&self) -> &str {
        if self.template_source.is_empty() {
            "default"
        } else {
            &self.template_source
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgGovernanceScope {
    #[serde(default, deserialize_with = "de_loose_string")]
    pub frameworks_mode: String,
    #[serde(default, deserialize_with = "de_loose_list")]
    pub frameworks_in_scope: Vec<String>,
    #[serde(default, deserialize_with = "de_loose_list")]
    pub obligations_ids_in_scope: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineInclusions {
    #[serde(default, deserialize_with = "de_loose_string")]
    pub default_lens_context: String,
}

/// The compact human-facing manifest produced alongside a bundle. The core
/// reads structured fields only; everything else rides along untouched in
/// `rest`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "de_loose_string")]
    pub bundle_id: String,
    #[serde(default, deserialize_with = "de_loose_string")]
    pub programme_mode: String,
    #[serde(default, deserialize_with = "de_loose_string")]
    pub task_type: String,
    #[serde(default, deserialize_with = "de_loose_object")]
    pub artefact_anchor: ArtefactAnchor,
    #[serde(default, deserialize_with = "de_loose_object")]
    pub template: TemplateScaffold,
    #[serde(default, deserialize_with = "de_loose_object")]
    pub org_governance_scope: OrgGovernanceScope,
    #[serde(default, deserialize_with = "de_loose_object")]
    pub baseline_inclusions: BaselineInclusions,
    #[serde(default, deserialize_with = "de_loose_object")]
    pub structural_lenses: BTreeMap<String, Value>,
    #[serde(default)]
    pub context_notes: Value,
    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

impl Manifest {
    /// Parse a loose manifest value; an unparseable shape degrades to the
    /// empty manifest rather than blocking a build.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value(value) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "unreadable manifest shape; using empty manifest");
                Self::default()
            }
        }
    }

    /// Selected structural-lens keys, sorted for deterministic output.
    pub fn lens_keys(&self) -> Vec<String> {
        self.structural_lenses.keys().cloned().collect()
    }

    /// Baseline lens context, defaulting to the shipped broad scope.
    pub fn default_lens_context(&self) -> &str {
        let ctx = self.baseline_inclusions.default_lens_context.trim();
        if ctx.is_empty() {
            "broad_scope"
        } else {
            ctx
        }
    }

    /// Whether the caller supplied any free-text notes. The content itself
    /// is never interpreted here.
    pub fn has_custom_notes(&self) -> bool {
        match &self.context_notes {
            Value::String(s) => !s.trim().is_empty(),
            Value::Null => false,
            Value::Object(o) => !o.is_empty(),
            Value::Array(a) => !a.is_empty(),
            _ => true,
        }
    }

    /// Whether the caller supplied custom titles inside the notes block.
    pub fn has_custom_titles(&self) -> bool {
        self.context_notes
            .get("custom_titles")
            .map(|v| !v.is_null())
            .unwrap_or(false)
    }

    /// Copy of the manifest with fields lifted into the verified artefact's
    /// identity block removed, to avoid double-embedding.
    pub fn slim_for_verified(&self) -> Value {
        let mut v = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(obj) = v.as_object_mut() {
            for key in ["bundle_id", "programme_mode", "task_type", "artefact_anchor"] {
                obj.remove(key);
            }
            if let Some(tpl) = obj.get_mut("template").and_then(Value::as_object_mut) {
                tpl.remove("template_id");
                tpl.remove("template_source");
            }
        }
        v
    }
}

/// Guess which catalogue an anchor identifier belongs to by its prefix.
///
/// Best-effort convenience preserved from the source system: `STD-` anchors
/// live in CRT-STD, `POL-` anchors in CRT-POL, anything else resolves to no
/// anchor catalogue. Returns `(catalogue_name, id_field)`.
pub fn anchor_catalogue_for_id(anchor_id: &str) -> Option<(&'static str, &'static str)> {
    let x = anchor_id.trim().to_uppercase();
    if x.starts_with("STD-") {
        Some(("CRT-STD", "standard_id"))
    } else if x.starts_with("POL-") {
        Some(("CRT-POL", "policy_id"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tolerates_missing_and_odd_fields() {
        let m = Manifest::from_value(json!({
            "bundle_id": "B-42",
            "task_type": 7,
            "org_governance_scope": {
                "frameworks_mode": "overlay",
                "frameworks_in_scope": "REQ-SET-01",
                "obligations_ids_in_scope": ["LR-01", " ", "LR-02"]
            }
        }));
        assert_eq!(m.bundle_id, "B-42");
        assert_eq!(m.task_type, "");
        assert_eq!(m.org_governance_scope.frameworks_in_scope, vec!["REQ-SET-01"]);
        assert_eq!(
            m.org_governance_scope.obligations_ids_in_scope,
            vec!["LR-01", "LR-02"]
        );
    }

    #[test]
    fn odd_typed_sub_object_degrades_alone() {
        // One wrong-typed sub-object must not erase the well-formed rest.
        let m = Manifest::from_value(json!({
            "bundle_id": "B-42",
            "artefact_anchor": {"anchor_id": "STD-0002", "anchor_name": "Access Standard"},
            "org_governance_scope": {"obligations_ids_in_scope": ["LR-01"]},
            "structural_lenses": "not-an-object"
        }));
        assert_eq!(m.bundle_id, "B-42");
        assert_eq!(m.artefact_anchor.anchor_id, "STD-0002");
        assert_eq!(m.org_governance_scope.obligations_ids_in_scope, vec!["LR-01"]);
        assert!(m.structural_lenses.is_empty());

        let m = Manifest::from_value(json!({
            "bundle_id": "B-43",
            "artefact_anchor": "STD-0002"
        }));
        assert_eq!(m.bundle_id, "B-43");
        assert_eq!(m.artefact_anchor.anchor_id, "");
    }

    #[test]
    fn lens_context_defaults_to_broad_scope() {
        let m = Manifest::default();
        assert_eq!(m.default_lens_context(), "broad_scope");
    }

    #[test]
    fn anchor_prefix_sniffing() {
        assert_eq!(
            anchor_catalogue_for_id("STD-0002"),
            Some(("CRT-STD", "standard_id"))
        );
        assert_eq!(
            anchor_catalogue_for_id("pol-0001"),
            Some(("CRT-POL", "policy_id"))
        );
        assert_eq!(anchor_catalogue_for_id("CRT-C-0001"), None);
        assert_eq!(anchor_catalogue_for_id(""), None);
    }

    #[test]
    fn slimming_removes_identity_duplicates_but_keeps_the_rest() {
        let m = Manifest::from_value(json!({
            "bundle_id": "B-42",
            "task_type": "policy_draft",
            "template": {"template_id": "T-1", "source": "library", "sections": ["Scope"]},
            "notes_for_humans": "keep me"
        }));
        let slim = m.slim_for_verified();
        assert!(slim.get("bundle_id").is_none());
        assert!(slim.get("task_type").is_none());
        assert!(slim["template"].get("template_id").is_none());
        assert_eq!(slim["template"]["sections"][0], "Scope");
        assert_eq!(slim["notes_for_humans"], "keep me");
    }

    #[test]
    fn custom_notes_detection() {
        let m = Manifest::from_value(json!({"context_notes": {"custom_titles": ["A"], "text": "x"}}));
        assert!(m.has_custom_notes());
        assert!(m.has_custom_titles());
        assert!(!Manifest::default().has_custom_notes());
    }
}
