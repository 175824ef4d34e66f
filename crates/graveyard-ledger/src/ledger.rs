use std::sync::{Mutex, MutexGuard, PoisonError};

use graveyard_core::{
    DefaultInstallKeyParser, InstallEquivalence, InstallIdentifier, InstallKeyParser,
    InstallRecordEquivalence,
};
use graveyard_store::KeyValueStore;
use serde_json::Value;
use tracing::{debug, info};

use crate::migration::{MalformedKeyPolicy, MigrationReport, SourceShape, StoredLedger};
use crate::{InProgressTracker, LedgerError, LedgerRecord};

pub const DEFAULT_LEDGER_KEY: &str = "installPathsGraveyard";

/// Installs whose directories could not be removed, persisted under one
/// store key so a later pass can retry the deletion.
///
/// Every operation loads the stored value, converts a legacy mapping to the
/// record list and writes the result back before doing its own work. Loads
/// and writes from one `Ledger` run under a single lock, so mutations made
/// through the same instance never overwrite each other. Ledgers on different
/// keys of one store are independent as long as the store's `update` is
/// atomic per call, which `JsonFileStore` guarantees with a file lock.
/// Nothing protects against a second `Ledger` (or process) writing the same
/// key.
pub struct Ledger<S> {
    store: S,
    ledger_key: String,
    matcher: Box<dyn InstallEquivalence>,
    parser: Box<dyn InstallKeyParser>,
    malformed_key_policy: MalformedKeyPolicy,
    write_lock: Mutex<()>,
    in_progress: InProgressTracker,
}

impl<S: KeyValueStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ledger_key: DEFAULT_LEDGER_KEY.to_string(),
            matcher: Box::new(InstallRecordEquivalence),
            parser: Box::new(DefaultInstallKeyParser),
            malformed_key_policy: MalformedKeyPolicy::default(),
            write_lock: Mutex::new(()),
            in_progress: InProgressTracker::new(),
        }
    }

    pub fn with_key(mut self, ledger_key: impl Into<String>) -> Self {
        self.ledger_key = ledger_key.into();
        self
    }

    pub fn with_matcher(mut self, matcher: impl InstallEquivalence + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn with_parser(mut self, parser: impl InstallKeyParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn with_malformed_key_policy(mut self, policy: MalformedKeyPolicy) -> Self {
        self.malformed_key_policy = policy;
        self
    }

    pub fn ledger_key(&self) -> &str {
        &self.ledger_key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records a failed removal. Duplicates, including records equivalent to
    /// ones already present, are kept.
    pub fn add(
        &self,
        install: InstallIdentifier,
        path: impl Into<String>,
    ) -> Result<(), LedgerError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(LedgerError::InvalidPath {
                install: install.install_key(),
            });
        }

        let _guard = self.serialized();
        let (mut records, _) = self.load()?;
        debug!(install = %install, path = %path, "recording failed removal");
        records.push(LedgerRecord::new(install, path));
        self.persist(&records)
    }

    /// Drops every record equivalent to `install` and returns how many went.
    /// The ledger is written back even when nothing matched.
    pub fn remove(&self, install: &InstallIdentifier) -> Result<usize, LedgerError> {
        let _guard = self.serialized();
        let (records, _) = self.load()?;
        let before = records.len();
        let kept = records
            .into_iter()
            .filter(|record| !self.matcher.is_equivalent(&record.install, install))
            .collect::<Vec<_>>();
        let removed = before - kept.len();

        self.persist(&kept)?;
        if removed > 0 {
            info!(install = %install, removed, "cleared ledger records");
        }
        Ok(removed)
    }

    pub fn records(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let _guard = self.serialized();
        let (records, _) = self.load()?;
        Ok(records)
    }

    /// Paths of every record equivalent to `install`, in ledger order.
    pub fn paths_for(&self, install: &InstallIdentifier) -> Result<Vec<String>, LedgerError> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|record| self.matcher.is_equivalent(&record.install, install))
            .map(|record| record.path)
            .collect())
    }

    /// Loads (and so migrates) the ledger, reporting what the stored value
    /// looked like.
    pub fn migrate(&self) -> Result<MigrationReport, LedgerError> {
        let _guard = self.serialized();
        let (_, report) = self.load()?;
        Ok(report)
    }

    pub fn in_progress(&self) -> &InProgressTracker {
        &self.in_progress
    }

    pub fn track(&self, install: InstallIdentifier, path: impl Into<String>) -> bool {
        self.in_progress.track(install, path)
    }

    /// Empties the in-progress set. The persisted ledger is not touched.
    pub fn clear(&self) {
        self.in_progress.clear();
    }

    pub fn iterate(&self) -> std::vec::IntoIter<InstallIdentifier> {
        self.in_progress.iterate()
    }

    pub(crate) fn load(&self) -> Result<(Vec<LedgerRecord>, MigrationReport), LedgerError> {
        let raw = self
            .store
            .get(&self.ledger_key, Value::Null)
            .map_err(|source| LedgerError::Persistence {
                operation: "load",
                ledger_key: self.ledger_key.clone(),
                source,
            })?;

        let (stored, source_shape) = StoredLedger::classify(&self.ledger_key, raw)?;
        let (records, skipped) =
            stored.into_records(self.parser.as_ref(), self.malformed_key_policy)?;

        let migrated = if source_shape == SourceShape::Legacy {
            records.len()
        } else {
            0
        };
        if source_shape == SourceShape::Legacy {
            info!(
                ledger_key = %self.ledger_key,
                migrated,
                skipped = skipped.len(),
                "migrated legacy ledger to record list"
            );
        } else {
            debug!(
                ledger_key = %self.ledger_key,
                shape = source_shape.as_str(),
                records = records.len(),
                "loaded ledger"
            );
        }

        self.persist(&records)?;

        let report = MigrationReport {
            source_shape,
            record_count: records.len(),
            migrated,
            skipped,
        };
        Ok((records, report))
    }

    pub(crate) fn persist(&self, records: &[LedgerRecord]) -> Result<(), LedgerError> {
        let value = serde_json::to_value(records).map_err(|source| LedgerError::Encode {
            ledger_key: self.ledger_key.clone(),
            source,
        })?;
        self.store
            .update(&self.ledger_key, value)
            .map_err(|source| LedgerError::Persistence {
                operation: "store",
                ledger_key: self.ledger_key.clone(),
                source,
            })
    }

    fn serialized(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
