use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use graveyard_ledger::{MalformedKeyPolicy, DEFAULT_LEDGER_KEY};
use serde::Deserialize;

use crate::Cli;

pub(crate) const LOG_ENV_VAR: &str = "GRAVEYARD_LOG";
const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GraveyardConfig {
    pub(crate) store: StoreConfig,
    pub(crate) migration: MigrationConfig,
    pub(crate) logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct StoreConfig {
    pub(crate) state_file: Option<PathBuf>,
    pub(crate) key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct MigrationConfig {
    pub(crate) malformed_keys: MalformedKeyPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LoggingConfig {
    pub(crate) level: Option<String>,
    pub(crate) format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Everything a command needs, after flags, environment and config file
/// have been merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) state_file: PathBuf,
    pub(crate) ledger_key: String,
    pub(crate) malformed_keys: MalformedKeyPolicy,
    pub(crate) log_filter: String,
    pub(crate) log_format: LogFormat,
}

pub(crate) fn parse_config(content: &str) -> Result<GraveyardConfig> {
    toml::from_str(content).context("failed parsing graveyard config")
}

pub(crate) fn load_config(explicit: Option<&Path>) -> Result<(GraveyardConfig, Option<PathBuf>)> {
    load_config_in(explicit, default_graveyard_home().ok().as_deref())
}

/// Reads `explicit` when given (it must exist), otherwise `config.toml` in
/// `home` when present. An unresolved home means no default config. Returns
/// the path actually read.
pub(crate) fn load_config_in(
    explicit: Option<&Path>,
    home: Option<&Path>,
) -> Result<(GraveyardConfig, Option<PathBuf>)> {
    let path = match (explicit, home) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(home)) if home.join("config.toml").exists() => home.join("config.toml"),
        (None, _) => return Ok((GraveyardConfig::default(), None)),
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed reading config: {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("invalid config: {}", path.display()))?;
    Ok((config, Some(path)))
}

pub(crate) fn resolve_settings(
    cli: &Cli,
    config: &GraveyardConfig,
    config_path: Option<PathBuf>,
) -> Result<Settings> {
    let home = match (&cli.state_file, &config.store.state_file) {
        (Some(_), _) | (None, Some(_)) => None,
        (None, None) => Some(default_graveyard_home()?),
    };
    let env_filter = std::env::var(LOG_ENV_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty());

    Ok(merge_settings(
        cli,
        config,
        config_path,
        home.as_deref(),
        env_filter,
    ))
}

/// Precedence: flag, then environment (log filter only), then config file,
/// then built-in default.
pub(crate) fn merge_settings(
    cli: &Cli,
    config: &GraveyardConfig,
    config_path: Option<PathBuf>,
    home: Option<&Path>,
    env_filter: Option<String>,
) -> Settings {
    let state_file = cli
        .state_file
        .clone()
        .or_else(|| config.store.state_file.clone())
        .or_else(|| home.map(|home| home.join("state.json")))
        .unwrap_or_else(|| PathBuf::from("state.json"));
    let ledger_key = cli
        .key
        .clone()
        .or_else(|| config.store.key.clone())
        .unwrap_or_else(|| DEFAULT_LEDGER_KEY.to_string());
    let log_filter = cli
        .log_level
        .clone()
        .or(env_filter)
        .or_else(|| config.logging.level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

    Settings {
        config_path,
        state_file,
        ledger_key,
        malformed_keys: config.migration.malformed_keys,
        log_filter,
        log_format: config.logging.format,
    }
}

pub(crate) fn default_graveyard_home() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows graveyard home")?;
        return Ok(PathBuf::from(app_data).join("Graveyard"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve graveyard home")?;
    Ok(PathBuf::from(home).join(".graveyard"))
}
