// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `buildpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildpipe",
    version,
    about = "Glob-select, transform, and write asset pipelines; one-shot or watch-driven.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Buildpipe.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Buildpipe.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the stage graph, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the production stage set once and exit (nonzero if any stage
    /// fails). The destination root is emptied first unless `[build].clean`
    /// is disabled.
    Build,
    /// Run the development stage set, then watch for changes until
    /// interrupted. This is also what a bare `buildpipe` invocation does.
    Dev,
    /// Clear the memoized transform output store (`.buildpipe/cache`).
    ClearCache,
}

/// Execution mode derived from the subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Build,
    Dev,
    ClearCache,
}

impl CliArgs {
    pub fn mode(&self) -> Mode {
        match self.command {
            Some(Command::Build) => Mode::Build,
            Some(Command::Dev) | None => Mode::Dev,
            Some(Command::ClearCache) => Mode::ClearCache,
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
