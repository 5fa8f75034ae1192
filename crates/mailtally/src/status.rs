//! The `mailtally-status` command: render the last saved results.
//!
//! Never contacts a mail server and never writes to the results file.

use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::Parser;
use mailtally_core::Paths;
use mailtally_core::report::{EXACT_TIME_FORMAT, STATUS_HEADER, format_time_ago, write_counts};
use mailtally_core::results::{ResultsLocation, StoredResults, locate, parse_timestamp};
use tracing::{debug, warn};

/// Command-line arguments of `mailtally-status`.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "mailtally-status", version, about = "Show last saved email status")]
pub struct StatusArgs {
    /// Print the stored document as one JSON line.
    #[arg(long)]
    pub json: bool,

    /// Fall back to the legacy results location.
    #[arg(long)]
    pub legacy_path: bool,

    /// Configuration directory.
    #[arg(long, env = "MAILTALLY_CONFIG_DIR", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

/// Renders the stored results relative to `now` and returns the exit code.
pub fn run(args: &StatusArgs, paths: &Paths, now: NaiveDateTime, out: &mut dyn Write) -> u8 {
    match execute(args, paths, now, out) {
        Ok(code) => code,
        Err(e) => {
            warn!("Failed to render status: {e:#}");
            let _ = writeln!(out, "Error reading email status: {e:#}");
            1
        }
    }
}

fn execute(
    args: &StatusArgs,
    paths: &Paths,
    now: NaiveDateTime,
    out: &mut dyn Write,
) -> anyhow::Result<u8> {
    let path = match locate(paths, args.legacy_path) {
        ResultsLocation::Primary(path) => path,
        ResultsLocation::Legacy(path) => {
            writeln!(
                out,
                "Using legacy configuration path. Consider migrating to the new location."
            )?;
            path
        }
        ResultsLocation::Missing => {
            writeln!(out, "No email status data found. Run mailtally first.")?;
            writeln!(out, "Expected path: {}", paths.results().display())?;
            return Ok(1);
        }
    };
    debug!("Reading {}", path.display());

    let stored = StoredResults::read(&path)?;

    if args.json {
        writeln!(out, "{}", serde_json::to_string(&stored.raw)?)?;
        return Ok(0);
    }

    write_counts(out, STATUS_HEADER, &stored.counts)?;
    if let Some(timestamp) = stored.timestamp.as_deref() {
        let checked_at = parse_timestamp(timestamp)?;
        writeln!(out, "Last checked: {}", format_time_ago(checked_at, now))?;
        writeln!(out, "Exact time: {}", checked_at.format(EXACT_TIME_FORMAT))?;
    }

    Ok(0)
}
