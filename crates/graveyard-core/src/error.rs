use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("malformed install key '{key}': {reason}")]
    MalformedInstallKey { key: String, reason: String },
}

impl CoreError {
    pub(crate) fn malformed(key: &str, reason: impl Into<String>) -> Self {
        Self::MalformedInstallKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
