use crate::InstallIdentifier;

/// Decides whether two identifiers name the same logical install.
pub trait InstallEquivalence: Send + Sync {
    fn is_equivalent(&self, left: &InstallIdentifier, right: &InstallIdentifier) -> bool;
}

impl<F> InstallEquivalence for F
where
    F: Fn(&InstallIdentifier, &InstallIdentifier) -> bool + Send + Sync,
{
    fn is_equivalent(&self, left: &InstallIdentifier, right: &InstallIdentifier) -> bool {
        self(left, right)
    }
}

/// Matches on version, architecture, install mode and scope. The
/// `install_id` string is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallRecordEquivalence;

impl InstallEquivalence for InstallRecordEquivalence {
    fn is_equivalent(&self, left: &InstallIdentifier, right: &InstallIdentifier) -> bool {
        left.version == right.version
            && left.architecture == right.architecture
            && left.install_mode == right.install_mode
            && left.is_global == right.is_global
    }
}
