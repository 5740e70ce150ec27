//! # logslice-cli
//!
//! The `logslice` command-line downloader.
//!
//! A run reads its parameters from a TOML file, writes a header block to the
//! output file and then retrieves the configured interval window by window
//! through [`logslice_core::FetchPipeline`], sending authenticated GET
//! requests with [`http::HttpLogApi`].
//!
//! ```text
//! ┌──────────────┐  config   ┌──────────┐  count/search  ┌──────────┐
//! │ logslice.toml│──────────►│ logslice │◄──────────────►│ log API  │
//! └──────────────┘           └────┬─────┘   (HTTPS GET)  └──────────┘
//!                                 │ append
//!                                 ▼
//!                            output.txt
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod http;
pub mod run;

pub use cli::Cli;
pub use config::Config;
pub use error::CliError;
pub use http::HttpLogApi;
pub use run::{RunReport, execute};
