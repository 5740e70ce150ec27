//! Operator-facing messages on stdout.

use std::io::{self, BufRead, Write};

use logslice_core::BANNER;

use crate::error::CliError;
use crate::run::RunReport;

/// Prints the banner.
///
/// # Errors
///
/// Returns an error if `out` cannot be written.
pub fn welcome<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{BANNER}")
}

/// Prints the outcome of a run.
///
/// # Errors
///
/// Returns an error if `out` cannot be written.
pub fn farewell<W: Write>(
    out: &mut W,
    outcome: &std::result::Result<RunReport, CliError>,
) -> io::Result<()> {
    match outcome {
        Ok(report) => writeln!(
            out,
            "[:-*] All is done: {} written to '{}'. Farewell!",
            report.summary,
            report.output.display()
        ),
        Err(err) => writeln!(out, "[:-(] Sorry, something went wrong: {err}."),
    }
}

/// Blocks until the operator presses Enter or input ends.
///
/// # Errors
///
/// Returns an error if the prompt cannot be written or input cannot be read.
pub fn wait_for_operator<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<()> {
    write!(out, "Press Enter to exit...")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(())
}
