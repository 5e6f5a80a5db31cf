//! Waypost CLI Library
//!
//! Command-line interface for the Waypost scenario engine: `run`, `check`
//! and `config`.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
pub mod runner;

pub use commands::{CheckArgs, Cli, ColorArg, Commands, ConfigArgs, ConfigFormat, LogFormatArg, RunArgs};
pub use config::{CliConfig, ColorChoice, LogFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
