//! The main entry point for the `retoken` command-line application.

use retoken::cli;
use retoken::errors::Result;
use retoken::rewriter;
use std::process;

/// Parses arguments, runs the rewrite, and exits non-zero if any file failed.
fn main() -> Result<()> {
    let args = cli::parse_args();
    let report = rewriter::run_rewrite(args)?;

    if report.has_failures() {
        eprintln!("{} file(s) could not be processed", report.failures.len());
        process::exit(1);
    }

    Ok(())
}
