//! `logslice` binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use logslice_cli::console::{farewell, wait_for_operator, welcome};
use logslice_cli::{Cli, CliError, Config, RunReport, execute};

const DEFAULT_LOG_FILTER: &str = "logslice=info";

fn main() -> ExitCode {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut stdout = io::stdout().lock();
    let _ = welcome(&mut stdout);

    let config = Config::from_file(&cli.config);
    let pause = cli_pause(&cli, config.as_ref().ok());
    let outcome = config.and_then(run);

    if let Err(e) = &outcome {
        error!(error = %e, "run failed");
    }
    let _ = farewell(&mut stdout, &outcome);
    if pause {
        let _ = wait_for_operator(&mut io::stdin().lock(), &mut stdout);
    }

    if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Pauses unless disabled on the command line or in a loaded config.
fn cli_pause(cli: &Cli, config: Option<&Config>) -> bool {
    !cli.no_pause && config.is_none_or(|c| c.output.pause_on_exit)
}

fn run(config: Config) -> Result<RunReport, CliError> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(execute(&config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_defaults_on_without_config() {
        let cli = Cli::parse_from(["logslice"]);
        assert!(cli_pause(&cli, None));
    }

    #[test]
    fn no_pause_flag_wins() {
        let cli = Cli::parse_from(["logslice", "--no-pause"]);
        assert!(!cli_pause(&cli, None));
    }
}
