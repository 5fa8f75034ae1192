//! The `mailtally` command: check, save, print.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mailtally_core::report::{COUNTS_HEADER, EXACT_TIME_FORMAT, write_counts};
use mailtally_core::{EmailCounter, Paths, Services};
use tracing::{error, warn};

/// Command-line arguments of `mailtally`.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "mailtally", version, about = "Email inbox counter")]
pub struct CheckerArgs {
    /// Print the saved results as one JSON line.
    #[arg(long)]
    pub output_json: bool,

    /// Print the results as text (the default).
    #[arg(long)]
    pub output_text: bool,

    /// Set or update IMAP passwords in the keyring instead of checking.
    #[arg(long)]
    pub configure: bool,

    /// Configuration directory.
    #[arg(long, env = "MAILTALLY_CONFIG_DIR", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

/// Runs the checker and returns the exit code.
///
/// Unexpected errors are logged and reported on `out` as
/// "Error occurred: ...".
pub async fn run(
    args: &CheckerArgs,
    paths: Paths,
    services: Services,
    out: &mut dyn Write,
) -> u8 {
    match execute(args, paths, services, out).await {
        Ok(code) => code,
        Err(e) => {
            error!("Unexpected error: {e:#}");
            // Nothing left to report to if `out` itself is broken.
            let _ = writeln!(out, "Error occurred: {e:#}");
            1
        }
    }
}

async fn execute(
    args: &CheckerArgs,
    paths: Paths,
    services: Services,
    out: &mut dyn Write,
) -> anyhow::Result<u8> {
    let mut counter = EmailCounter::new(paths, services)?;

    if args.configure {
        counter.configure_passwords(out)?;
        return Ok(0);
    }

    let config_path = counter.paths().config();
    if counter.is_placeholder() {
        warn!("Please edit the config file before running");
        writeln!(out, "Edit the configuration file at: {}", config_path.display())?;
        return Ok(1);
    }
    if counter.accounts().is_empty() {
        warn!("No accounts configured");
        writeln!(out, "No accounts configured in {}", config_path.display())?;
        return Ok(1);
    }

    let results = counter.check_all_accounts().await;
    let document = counter
        .save_results(results)
        .context("failed to save results")?;

    if args.output_json {
        writeln!(out, "{}", serde_json::to_string(&document)?)?;
    } else {
        write_counts(out, COUNTS_HEADER, &document.counts)?;
        let checked_at = document.checked_at()?;
        writeln!(out, "Last checked: {}", checked_at.format(EXACT_TIME_FORMAT))?;
    }

    Ok(0)
}
