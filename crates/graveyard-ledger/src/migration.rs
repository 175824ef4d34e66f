use std::collections::BTreeMap;

use graveyard_core::InstallKeyParser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{LedgerError, LedgerRecord};

/// What to do with a legacy entry whose install key does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedKeyPolicy {
    /// Fail the load and leave the stored value as it was.
    #[default]
    Abort,
    /// Drop the entry, log it, and migrate the rest.
    Skip,
}

impl MalformedKeyPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceShape {
    Empty,
    Legacy,
    Modern,
}

impl SourceShape {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Legacy => "legacy",
            Self::Modern => "modern",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLegacyEntry {
    pub install_key: String,
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub source_shape: SourceShape,
    pub record_count: usize,
    pub migrated: usize,
    pub skipped: Vec<SkippedLegacyEntry>,
}

/// The two shapes a ledger slot can hold. There is no version marker; the
/// shape is read off the JSON value itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredLedger {
    /// `{ "<install key>": "<path>" }`
    Legacy(BTreeMap<String, String>),
    /// `[ { "install": {..}, "path": "<path>" } ]`
    Modern(Vec<LedgerRecord>),
}

impl StoredLedger {
    pub fn classify(ledger_key: &str, value: Value) -> Result<(Self, SourceShape), LedgerError> {
        match value {
            Value::Null => Ok((Self::Modern(Vec::new()), SourceShape::Empty)),
            Value::Array(_) => {
                let records = serde_json::from_value::<Vec<LedgerRecord>>(value).map_err(|err| {
                    LedgerError::CorruptLedger {
                        ledger_key: ledger_key.to_string(),
                        reason: format!("invalid ledger record: {err}"),
                    }
                })?;
                Ok((Self::Modern(records), SourceShape::Modern))
            }
            Value::Object(entries) => {
                let mut legacy = BTreeMap::new();
                for (install_key, path) in entries {
                    let Value::String(path) = path else {
                        return Err(LedgerError::CorruptLedger {
                            ledger_key: ledger_key.to_string(),
                            reason: format!(
                                "legacy entry '{install_key}' must map to a path string"
                            ),
                        });
                    };
                    legacy.insert(install_key, path);
                }
                Ok((Self::Legacy(legacy), SourceShape::Legacy))
            }
            other => Err(LedgerError::CorruptLedger {
                ledger_key: ledger_key.to_string(),
                reason: format!("expected a record list or a legacy mapping, found {other}"),
            }),
        }
    }

    /// Converts to the record list, parsing legacy keys in key order. Modern
    /// records pass through untouched.
    pub fn into_records(
        self,
        parser: &dyn InstallKeyParser,
        policy: MalformedKeyPolicy,
    ) -> Result<(Vec<LedgerRecord>, Vec<SkippedLegacyEntry>), LedgerError> {
        let legacy = match self {
            Self::Modern(records) => return Ok((records, Vec::new())),
            Self::Legacy(legacy) => legacy,
        };

        let mut records = Vec::with_capacity(legacy.len());
        let mut skipped = Vec::new();
        for (install_key, path) in legacy {
            match parser.parse(&install_key) {
                Ok(install) => records.push(LedgerRecord::new(install, path)),
                Err(source) => match policy {
                    MalformedKeyPolicy::Abort => {
                        return Err(LedgerError::MalformedLegacyKey {
                            install_key,
                            path,
                            source,
                        });
                    }
                    MalformedKeyPolicy::Skip => {
                        warn!(
                            install_key = %install_key,
                            path = %path,
                            error = %source,
                            "dropping legacy ledger entry with malformed install key"
                        );
                        skipped.push(SkippedLegacyEntry {
                            install_key,
                            path,
                            reason: source.to_string(),
                        });
                    }
                },
            }
        }

        Ok((records, skipped))
    }
}
