//! Waypost CLI: run browser end-to-end scenarios
//!
//! ## Usage
//!
//! ```bash
//! waypost run login.yaml --site site.yaml -j 4   # Run against a site model
//! waypost check scenarios/*.yaml                 # Validate only
//! waypost config --format json                   # Show resolved configuration
//! ```

use clap::Parser;
use std::process::ExitCode;
use waypost_cli::{logging, runner, Cli, CliConfig, CliResult, Commands, ProgressReporter, Verbosity};

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<bool> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init(&config);
    let mut reporter = ProgressReporter::new(
        config.color.should_color(),
        config.verbosity.is_quiet(),
    );

    match cli.command {
        Commands::Run(args) => runner::run(&args, &mut reporter),
        Commands::Check(args) => runner::check(&args, &reporter),
        Commands::Config(args) => {
            print!("{}", runner::show_config(&args)?);
            Ok(true)
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_log_format(cli.log_format.into())
}
