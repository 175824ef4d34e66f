use crate::{Architecture, CoreError, InstallIdentifier, InstallMode};

const GLOBAL_TOKEN: &str = "global";

pub trait InstallKeyParser: Send + Sync {
    fn parse(&self, key: &str) -> Result<InstallIdentifier, CoreError>;
}

impl<F> InstallKeyParser for F
where
    F: Fn(&str) -> Result<InstallIdentifier, CoreError> + Send + Sync,
{
    fn parse(&self, key: &str) -> Result<InstallIdentifier, CoreError> {
        self(key)
    }
}

/// Parses both the `~`-separated keys written today and the older
/// dash-suffixed keys (`3.1.0-x64`, `net-3.1-x64-global`) found in legacy
/// ledgers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInstallKeyParser;

impl InstallKeyParser for DefaultInstallKeyParser {
    fn parse(&self, key: &str) -> Result<InstallIdentifier, CoreError> {
        parse_install_key(key)
    }
}

fn parse_install_key(key: &str) -> Result<InstallIdentifier, CoreError> {
    if key.is_empty() {
        return Err(CoreError::malformed(key, "key is empty"));
    }
    if key
        .chars()
        .any(|ch| ch.is_whitespace() || ch.is_control())
    {
        return Err(CoreError::malformed(
            key,
            "key contains whitespace or control characters",
        ));
    }
    if key.contains(['/', '\\']) {
        return Err(CoreError::malformed(key, "key contains a path separator"));
    }

    let parts = if key.contains('~') {
        parse_tilde_segments(key)?
    } else {
        parse_dash_suffixes(key)
    };

    validate_version(key, parts.version)?;

    Ok(InstallIdentifier {
        install_id: key.to_string(),
        version: parts.version.to_string(),
        architecture: parts.architecture,
        install_mode: parts.install_mode.unwrap_or_default(),
        is_global: parts.is_global,
    })
}

struct KeyParts<'a> {
    version: &'a str,
    architecture: Option<Architecture>,
    install_mode: Option<InstallMode>,
    is_global: bool,
}

fn parse_tilde_segments(key: &str) -> Result<KeyParts<'_>, CoreError> {
    let mut segments = key.split('~');
    let version = segments.next().unwrap_or_default();
    let mut parts = KeyParts {
        version,
        architecture: None,
        install_mode: None,
        is_global: false,
    };

    for segment in segments {
        if segment.is_empty() {
            return Err(CoreError::malformed(key, "key contains an empty segment"));
        }

        if segment == GLOBAL_TOKEN {
            if parts.is_global {
                return Err(CoreError::malformed(key, "repeated 'global' token"));
            }
            parts.is_global = true;
        } else if let Some(architecture) = Architecture::parse(segment) {
            if parts.architecture.is_some() {
                return Err(CoreError::malformed(
                    key,
                    format!("repeated architecture token '{segment}'"),
                ));
            }
            parts.architecture = Some(architecture);
        } else if let Some(install_mode) = InstallMode::parse(segment) {
            if parts.install_mode.is_some() {
                return Err(CoreError::malformed(
                    key,
                    format!("repeated install mode token '{segment}'"),
                ));
            }
            parts.install_mode = Some(install_mode);
        } else {
            return Err(CoreError::malformed(
                key,
                format!("unknown token '{segment}'"),
            ));
        }
    }

    Ok(parts)
}

fn parse_dash_suffixes(key: &str) -> KeyParts<'_> {
    let mut rest = key;
    let mut is_global = false;
    if let Some(stripped) = rest.strip_suffix("-global") {
        if !stripped.is_empty() {
            rest = stripped;
            is_global = true;
        }
    }

    let mut architecture = None;
    if let Some((head, tail)) = rest.rsplit_once('-') {
        if let Some(parsed) = Architecture::parse(tail).filter(|_| !head.is_empty()) {
            architecture = Some(parsed);
            rest = head;
        }
    }

    KeyParts {
        version: rest,
        architecture,
        install_mode: None,
        is_global,
    }
}

fn validate_version(key: &str, version: &str) -> Result<(), CoreError> {
    let Some(first) = version.chars().next() else {
        return Err(CoreError::malformed(key, "version is empty"));
    };
    if !first.is_ascii_alphanumeric() {
        return Err(CoreError::malformed(
            key,
            format!("version '{version}' must start with a letter or digit"),
        ));
    }
    if let Some(invalid) = version
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(*ch, '.' | '+' | '_' | '-')))
    {
        return Err(CoreError::malformed(
            key,
            format!("version '{version}' contains invalid character '{invalid}'"),
        ));
    }
    Ok(())
}
