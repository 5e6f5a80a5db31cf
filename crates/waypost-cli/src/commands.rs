//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Waypost: run browser end-to-end scenarios with waits, retries and records
#[derive(Parser, Debug)]
#[command(name = "waypost")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, value_enum, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenario files
    Run(RunArgs),

    /// Parse and validate scenario files without running them
    Check(CheckArgs),

    /// Show the resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario files to run
    #[arg(required = true)]
    pub scenarios: Vec<PathBuf>,

    /// Configuration file (YAML)
    #[arg(short, long, env = "WAYPOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Site model to run against instead of a live browser
    #[arg(long)]
    pub site: Option<PathBuf>,

    /// Number of scenarios run at once
    #[arg(short = 'j', long, default_value = "1")]
    pub jobs: usize,

    /// Directory for JSON reports
    #[arg(short, long, default_value = "target/waypost")]
    pub output: PathBuf,

    /// Override the base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override the default wait timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Override the retry attempts per action
    #[arg(long)]
    pub retry_attempts: Option<u32>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Do not capture artifacts on failure
    #[arg(long)]
    pub no_artifacts: bool,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Scenario files to check
    #[arg(required = true)]
    pub scenarios: Vec<PathBuf>,

    /// Configuration file (YAML)
    #[arg(short, long, env = "WAYPOST_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Configuration file (YAML)
    #[arg(short, long, env = "WAYPOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "yaml")]
    pub format: ConfigFormat,
}

/// Format for `waypost config`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    /// YAML document
    #[default]
    Yaml,
    /// Pretty JSON
    Json,
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormatArg {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl From<LogFormatArg> for crate::config::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}
