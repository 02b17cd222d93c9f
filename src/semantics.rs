//! Human-readable semantics for mode enumerations.
//!
//! Mode codes in manifests are resolved into `{key, label, meaning}` triples
//! so downstream consumers never re-infer behaviour from raw keys. An
//! unrecognised code maps to an explicit "unknown" triple rather than
//! failing the build.

use serde::{Deserialize, Serialize};

/// Resolved meaning of a `frameworks_mode` code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworksModeSemantics {
    pub mode_key: String,
    pub label: String,
    pub meaning: String,
}

pub fn frameworks_mode_semantics(mode_key: &str) -> FrameworksModeSemantics {
    let (key, label, meaning) = match mode_key {
        "default_only" => (
            "default_only",
            "Default only",
            "Use only the shipped CRT defaults. CRT-REQ selections are not applied as an overlay.",
        ),
        "overlay" => (
            "overlay",
            "Overlay",
            "Treat selected CRT-REQ requirement sets as an overlay on top of the shipped CRT defaults.",
        ),
        "framework_only" => (
            "framework_only",
            "Primary requirements lens",
            "Treat selected CRT-REQ requirement sets as the primary requirements lens (still structurally mapped via CRT-C).",
        ),
        other => {
            let trimmed = other.trim();
            return FrameworksModeSemantics {
                mode_key: if trimmed.is_empty() {
                    "unknown".to_string()
                } else {
                    trimmed.to_string()
                },
                label: "Unknown".to_string(),
                meaning: "No recognised frameworks_mode value was provided.".to_string(),
            };
        }
    };
    FrameworksModeSemantics {
        mode_key: key.to_string(),
        label: label.to_string(),
        meaning: meaning.to_string(),
    }
}

/// Resolved meaning of a `default_lens_context` code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LensContextSemantics {
    pub context_key: String,
    pub meaning: String,
}

pub fn default_lens_semantics(context_key: &str) -> LensContextSemantics {
    match context_key {
        "broad_scope" => LensContextSemantics {
            context_key: "broad_scope".to_string(),
            meaning:
                "Include the shipped default lens context across the CRT spine (broad, baseline scope)."
                    .to_string(),
        },
        other => {
            let trimmed = other.trim();
            LensContextSemantics {
                context_key: if trimmed.is_empty() {
                    "unknown".to_string()
                } else {
                    trimmed.to_string()
                },
                meaning: "No recognised default_lens_context value was provided.".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognised_modes_resolve_to_fixed_triples() {
        let m = frameworks_mode_semantics("overlay");
        assert_eq!(m.mode_key, "overlay");
        assert_eq!(m.label, "Overlay");

        let m = frameworks_mode_semantics("framework_only");
        assert_eq!(m.label, "Primary requirements lens");
    }

    #[test]
    fn unknown_mode_never_fails() {
        let m = frameworks_mode_semantics("mystery_mode");
        assert_eq!(m.mode_key, "mystery_mode");
        assert_eq!(m.label, "Unknown");

        let m = frameworks_mode_semantics("   ");
        assert_eq!(m.mode_key, "unknown");
    }

    #[test]
    fn lens_context_falls_back_to_unknown() {
        assert_eq!(default_lens_semantics("broad_scope").context_key, "broad_scope");
        assert_eq!(default_lens_semantics("").context_key, "unknown");
    }
}
