use graveyard_core::InstallIdentifier;
use serde::{Deserialize, Serialize};

/// An install whose directory could not be deleted, and where that
/// directory is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub install: InstallIdentifier,
    pub path: String,
}

impl LedgerRecord {
    pub fn new(install: InstallIdentifier, path: impl Into<String>) -> Self {
        Self {
            install,
            path: path.into(),
        }
    }
}
