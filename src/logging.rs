// src/logging.rs

//! Logging setup for `dockhand` using `tracing` + `tracing-subscriber`.
//!
//! Filter selection:
//! 1. `--log-level` applies one level to every dockhand module
//! 2. otherwise `DOCKHAND_LOG` is read as a full filter directive
//!    (e.g. `info,dockhand::docker=trace`)
//! 3. otherwise `warn`, with the step runners at `info`
//!
//! Logs go to stderr. Stdout carries the progress lines and the main
//! container's output, which users pipe.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

const ENV_VAR: &str = "DOCKHAND_LOG";
const DEFAULT_DIRECTIVES: &str = "warn,dockhand::exec=info";

/// Install the global subscriber. Call once, before the task runs.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(ENV_VAR).ok().as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to install the tracing subscriber")?;

    Ok(())
}

/// The filter for a CLI level and the raw `DOCKHAND_LOG` value.
///
/// A malformed environment filter is an error rather than silently falling
/// back, so a typo doesn't hide the logs someone asked for.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(format!("warn,dockhand={}", level.directive())));
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {ENV_VAR} filter '{directives}'")),
        None => Ok(EnvFilter::new(DEFAULT_DIRECTIVES)),
    }
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
