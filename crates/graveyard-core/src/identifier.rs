use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X64,
    X86,
    Arm64,
    Arm,
}

impl Architecture {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::X86 => "x86",
            Self::Arm64 => "arm64",
            Self::Arm => "arm",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "x64" => Some(Self::X64),
            "x86" => Some(Self::X86),
            "arm64" => Some(Self::Arm64),
            "arm" => Some(Self::Arm),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    #[default]
    Runtime,
    AspNetCore,
    Sdk,
}

impl InstallMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::AspNetCore => "aspnetcore",
            Self::Sdk => "sdk",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "runtime" => Some(Self::Runtime),
            "aspnetcore" => Some(Self::AspNetCore),
            "sdk" => Some(Self::Sdk),
            _ => None,
        }
    }
}

/// A runtime install as the acquisition workflow names it.
///
/// `install_id` keeps the key string the identifier was built from. Two
/// identifiers for the same install can carry different `install_id`s (a
/// legacy key and its canonical rendering), so ledger code compares them
/// through an [`InstallEquivalence`](crate::InstallEquivalence) rather than
/// `==`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct InstallIdentifier {
    pub install_id: String,
    pub version: String,
    #[serde(default)]
    pub architecture: Option<Architecture>,
    #[serde(default)]
    pub install_mode: InstallMode,
    #[serde(default)]
    pub is_global: bool,
}

impl InstallIdentifier {
    pub fn new(
        version: impl Into<String>,
        architecture: Option<Architecture>,
        install_mode: InstallMode,
        is_global: bool,
    ) -> Self {
        let mut identifier = Self {
            install_id: String::new(),
            version: version.into(),
            architecture,
            install_mode,
            is_global,
        };
        identifier.install_id = identifier.install_key();
        identifier
    }

    pub fn runtime(version: impl Into<String>, architecture: Architecture) -> Self {
        Self::new(version, Some(architecture), InstallMode::Runtime, false)
    }

    /// Canonical key: `version[~arch][~mode][~global]`, with the mode token
    /// omitted for runtime installs.
    pub fn install_key(&self) -> String {
        let mut key = self.version.clone();
        if let Some(architecture) = self.architecture {
            key.push('~');
            key.push_str(architecture.as_str());
        }
        if self.install_mode != InstallMode::Runtime {
            key.push('~');
            key.push_str(self.install_mode.as_str());
        }
        if self.is_global {
            key.push_str("~global");
        }
        key
    }
}

impl fmt::Display for InstallIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.install_key())
    }
}
