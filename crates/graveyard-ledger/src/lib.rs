mod error;
mod ledger;
mod migration;
mod record;
mod tracker;

pub use error::LedgerError;
pub use ledger::{Ledger, DEFAULT_LEDGER_KEY};
pub use migration::{
    MalformedKeyPolicy, MigrationReport, SkippedLegacyEntry, SourceShape, StoredLedger,
};
pub use record::LedgerRecord;
pub use tracker::InProgressTracker;

#[cfg(test)]
mod tests;
