//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_FILE;

/// Downloads a log interval from a count-capped search API, one
/// adaptively sized window at a time.
#[derive(Parser, Debug, Clone)]
#[command(name = "logslice")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML run configuration.
    #[arg(short, long, env = "LOGSLICE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Exit without waiting for Enter, overriding `output.pause_on_exit`.
    #[arg(long)]
    pub no_pause: bool,
}
