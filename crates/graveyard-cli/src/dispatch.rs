use std::io;

use anyhow::{Context, Result};
use graveyard_core::{DefaultInstallKeyParser, InstallIdentifier, InstallKeyParser};
use graveyard_ledger::{Ledger, LedgerRecord, MigrationReport};
use graveyard_store::JsonFileStore;
use tracing::debug;

use crate::completion::write_completions_script;
use crate::config::Settings;
use crate::render::{
    format_migration_lines, format_record_lines, print_section, print_status, OutputStyle,
};
use crate::Commands;

pub(crate) fn run_command(
    command: Commands,
    settings: &Settings,
    style: OutputStyle,
) -> Result<()> {
    debug!(
        state_file = %settings.state_file.display(),
        ledger_key = %settings.ledger_key,
        "resolved ledger location"
    );

    match command {
        Commands::Add { install_key, path } => {
            let install = run_add(settings, &install_key, &path)?;
            print_status(style, "ok", &format!("recorded {install} at {path}"));
        }
        Commands::Remove { install_key } => {
            let (install, removed) = run_remove(settings, &install_key)?;
            if removed == 0 {
                print_status(style, "warn", &format!("no records matched {install}"));
            } else {
                print_status(
                    style,
                    "ok",
                    &format!("cleared {removed} record(s) for {install}"),
                );
            }
        }
        Commands::List => {
            let records = run_list(settings)?;
            if records.is_empty() {
                print_status(style, "ok", "no failed removals recorded");
            } else {
                print_section(style, "failed removals");
                for line in format_record_lines(&records) {
                    println!("{line}");
                }
            }
        }
        Commands::Paths { install_key } => {
            for path in run_paths(settings, &install_key)? {
                println!("{path}");
            }
        }
        Commands::Migrate => {
            let report = run_migrate(settings)?;
            let status = if report.skipped.is_empty() {
                "ok"
            } else {
                "warn"
            };
            for line in format_migration_lines(&settings.ledger_key, &report) {
                print_status(style, status, &line);
            }
        }
        Commands::Doctor => {
            for line in doctor_lines(settings) {
                println!("{line}");
            }
        }
        Commands::Completions { shell } => {
            let mut stdout = io::stdout().lock();
            write_completions_script(shell, &mut stdout)?;
        }
    }

    Ok(())
}

pub(crate) fn open_ledger(settings: &Settings) -> Ledger<JsonFileStore> {
    Ledger::new(JsonFileStore::new(&settings.state_file))
        .with_key(settings.ledger_key.clone())
        .with_malformed_key_policy(settings.malformed_keys)
}

pub(crate) fn parse_install_key(raw: &str) -> Result<InstallIdentifier> {
    DefaultInstallKeyParser
        .parse(raw)
        .with_context(|| format!("invalid install key '{raw}'"))
}

pub(crate) fn run_add(
    settings: &Settings,
    install_key: &str,
    path: &str,
) -> Result<InstallIdentifier> {
    let install = parse_install_key(install_key)?;
    open_ledger(settings)
        .add(install.clone(), path)
        .with_context(|| format!("failed recording {install}"))?;
    Ok(install)
}

pub(crate) fn run_remove(
    settings: &Settings,
    install_key: &str,
) -> Result<(InstallIdentifier, usize)> {
    let install = parse_install_key(install_key)?;
    let removed = open_ledger(settings)
        .remove(&install)
        .with_context(|| format!("failed clearing {install}"))?;
    Ok((install, removed))
}

pub(crate) fn run_list(settings: &Settings) -> Result<Vec<LedgerRecord>> {
    open_ledger(settings)
        .records()
        .context("failed reading ledger")
}

pub(crate) fn run_paths(settings: &Settings, install_key: &str) -> Result<Vec<String>> {
    let install = parse_install_key(install_key)?;
    open_ledger(settings)
        .paths_for(&install)
        .with_context(|| format!("failed reading paths for {install}"))
}

pub(crate) fn run_migrate(settings: &Settings) -> Result<MigrationReport> {
    open_ledger(settings)
        .migrate()
        .context("failed migrating ledger")
}

pub(crate) fn doctor_lines(settings: &Settings) -> Vec<String> {
    let config = settings
        .config_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());
    vec![
        format!("config: {config}"),
        format!("state file: {}", settings.state_file.display()),
        format!("ledger key: {}", settings.ledger_key),
        format!("malformed legacy keys: {}", settings.malformed_keys.as_str()),
        format!("log filter: {}", settings.log_filter),
    ]
}
