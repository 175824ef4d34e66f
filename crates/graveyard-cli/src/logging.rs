use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, Settings};

pub(crate) fn build_env_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter).with_context(|| format!("invalid log filter '{filter}'"))
}

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays parseable.
pub(crate) fn init_logging(settings: &Settings) -> Result<()> {
    let filter = build_env_filter(&settings.log_filter)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match settings.log_format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| anyhow!("failed installing log subscriber: {err}"))
}
