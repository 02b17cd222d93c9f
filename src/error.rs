use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the CRT core.
///
/// Data-quality problems (missing references, empty catalogues, undecodable
/// source files) are *not* errors at this layer — they degrade to empty
/// tables or `missing_ids` entries in the output. Only caller contract
/// violations and persistence failures are raised.
#[derive(Debug, Error)]
pub enum CrtError {
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("unable to write verified artefact: {path}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CrtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_contract_violation() {
        let e = CrtError::ContractViolation("unknown entity type: widgets".into());
        assert_eq!(
            e.to_string(),
            "contract violation: unknown entity type: widgets"
        );
    }

    #[test]
    fn persist_failed_carries_path() {
        let e = CrtError::PersistFailed {
            path: PathBuf::from("/workspace/verified/x.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.to_string().contains("/workspace/verified/x.json"));
    }
}
