use graveyard_core::CoreError;
use graveyard_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to {operation} ledger '{ledger_key}'")]
    Persistence {
        operation: &'static str,
        ledger_key: String,
        #[source]
        source: StoreError,
    },
    #[error("legacy ledger entry '{install_key}' ({path}) could not be migrated")]
    MalformedLegacyKey {
        install_key: String,
        path: String,
        #[source]
        source: CoreError,
    },
    #[error("ledger '{ledger_key}' is corrupt: {reason}")]
    CorruptLedger { ledger_key: String, reason: String },
    #[error("failed to encode ledger '{ledger_key}'")]
    Encode {
        ledger_key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("install path for '{install}' must not be empty")]
    InvalidPath { install: String },
}
