mod equivalence;
mod error;
mod identifier;
mod install_key;

pub use equivalence::{InstallEquivalence, InstallRecordEquivalence};
pub use error::CoreError;
pub use identifier::{Architecture, InstallIdentifier, InstallMode};
pub use install_key::{DefaultInstallKeyParser, InstallKeyParser};
