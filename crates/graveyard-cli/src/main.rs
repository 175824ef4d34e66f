use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod completion;
mod config;
mod dispatch;
mod logging;
mod render;

use config::{load_config, resolve_settings};
use dispatch::run_command;
use logging::init_logging;
use render::{resolve_output_style, OutputStyle};

#[derive(Parser, Debug)]
#[command(name = "graveyard")]
#[command(
    about = "Track runtime install directories whose removal failed",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to config.toml in the graveyard home).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON state file holding the ledger.
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,
    /// Store key the ledger lives under.
    #[arg(long, global = true)]
    key: Option<String>,
    /// Log filter, e.g. `info` or `graveyard_ledger=debug`.
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Disable badges and colors.
    #[arg(long, global = true)]
    plain: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a directory that could not be removed.
    Add { install_key: String, path: String },
    /// Forget every record equivalent to an install.
    Remove { install_key: String },
    /// List recorded installs and their directories.
    List,
    /// Print the directories recorded for an install.
    Paths { install_key: String },
    /// Convert a legacy ledger to the record list and report what changed.
    Migrate,
    /// Show resolved configuration.
    Doctor,
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum CliCompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

fn main() -> Result<()> {
    run_cli(Cli::parse())
}

fn run_cli(cli: Cli) -> Result<()> {
    let (config, config_path) = load_config(cli.config.as_deref())?;
    let settings = resolve_settings(&cli, &config, config_path)?;
    init_logging(&settings)?;

    let style = if cli.plain {
        OutputStyle::Plain
    } else {
        resolve_output_style(io::stdout().is_terminal())
    };

    run_command(cli.command, &settings, style)
}
