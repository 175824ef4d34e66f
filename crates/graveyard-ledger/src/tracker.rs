use std::sync::{Mutex, MutexGuard, PoisonError};

use graveyard_core::InstallIdentifier;

use crate::LedgerRecord;

/// Installs the current session is working on. Never persisted and never
/// filled from the ledger; callers populate it with [`track`](Self::track).
#[derive(Debug, Default)]
pub struct InProgressTracker {
    entries: Mutex<Vec<LedgerRecord>>,
}

impl InProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an identical record is already tracked.
    pub fn track(&self, install: InstallIdentifier, path: impl Into<String>) -> bool {
        let record = LedgerRecord::new(install, path);
        let mut entries = self.entries();
        if entries.contains(&record) {
            return false;
        }
        entries.push(record);
        true
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// A snapshot of the tracked identifiers. Later `track`/`clear` calls do
    /// not affect an iterator already handed out; call again to restart.
    pub fn iterate(&self) -> std::vec::IntoIter<InstallIdentifier> {
        self.entries()
            .iter()
            .map(|record| record.install.clone())
            .collect::<Vec<_>>()
            .into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<LedgerRecord>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IntoIterator for &InProgressTracker {
    type Item = InstallIdentifier;
    type IntoIter = std::vec::IntoIter<InstallIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.iterate()
    }
}
