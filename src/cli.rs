// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::{CleanupPolicy, RunOptions};

/// Command-line arguments for `dockhand`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dockhand",
    version,
    about = "Run a task in containers: build or pull images, start dependencies, run, clean up.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `dockhand.toml` in the current working directory.
    #[arg(long, short = 'f', value_name = "PATH", default_value = "dockhand.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DOCKHAND_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Leave containers running after the task succeeds.
    #[arg(long)]
    pub no_cleanup_after_success: bool,

    /// Leave containers running after the task fails, to diagnose the issue.
    #[arg(long)]
    pub no_cleanup_after_failure: bool,

    /// Shorthand for both `--no-cleanup-after-success` and
    /// `--no-cleanup-after-failure`.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Don't propagate the host's proxy environment variables into image
    /// builds and containers.
    #[arg(long)]
    pub no_proxy_vars: bool,

    /// Run at most this many steps at once.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_parallelism: Option<u16>,

    /// Run only the requested task, not its prerequisites.
    #[arg(long)]
    pub skip_prerequisites: bool,

    /// Resolve the task and print its containers, but don't touch the
    /// container engine.
    #[arg(long)]
    pub dry_run: bool,

    /// Task to run.
    #[arg(value_name = "TASK")]
    pub task: String,

    /// Extra arguments appended to the main container's command.
    #[arg(last = true, value_name = "ARGS")]
    pub additional_arguments: Vec<String>,
}

impl CliArgs {
    pub fn run_options(&self) -> RunOptions {
        let policy = |disabled: bool| {
            if disabled || self.no_cleanup {
                CleanupPolicy::DontCleanup
            } else {
                CleanupPolicy::Cleanup
            }
        };

        RunOptions {
            task_name: self.task.clone(),
            additional_arguments: self.additional_arguments.clone(),
            behaviour_after_success: policy(self.no_cleanup_after_success),
            behaviour_after_failure: policy(self.no_cleanup_after_failure),
            propagate_proxy_environment_variables: !self.no_proxy_vars,
            max_parallelism: self.max_parallelism.map(usize::from),
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
