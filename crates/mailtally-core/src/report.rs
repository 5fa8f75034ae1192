//! Text rendering shared by the checker and the status reporter.

use std::io::{self, Write};

use chrono::NaiveDateTime;

use crate::handler::CHECK_FAILED;
use crate::results::CheckResult;

/// Format of "Last checked" and "Exact time" lines.
pub const EXACT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header printed by the checker.
pub const COUNTS_HEADER: &str = "--- Email Inbox Counts ---";

/// Header printed by the status reporter.
pub const STATUS_HEADER: &str = "--- Email Inbox Status ---";

/// One line of the per-account listing.
#[must_use]
pub fn count_line(name: &str, count: i64) -> String {
    if count > CHECK_FAILED {
        format!("{name}: {count} unread")
    } else {
        format!("{name}: Error checking inbox")
    }
}

/// Writes `header` followed by one line per account.
///
/// # Errors
///
/// Returns an error if `out` cannot be written.
pub fn write_counts(out: &mut dyn Write, header: &str, counts: &CheckResult) -> io::Result<()> {
    writeln!(out, "{header}")?;
    for (name, count) in counts {
        writeln!(out, "{}", count_line(name, *count))?;
    }
    Ok(())
}

/// Describes how long before `now` the instant `then` was, e.g. "5 minutes ago".
///
/// Only the largest unit is used. Instants in the future read "0 seconds ago".
#[must_use]
pub fn format_time_ago(then: NaiveDateTime, now: NaiveDateTime) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    let secs = (now - then).num_seconds().max(0);
    if secs >= DAY {
        ago(secs / DAY, "day")
    } else if secs >= HOUR {
        ago(secs / HOUR, "hour")
    } else if secs >= MINUTE {
        ago(secs / MINUTE, "minute")
    } else {
        ago(secs, "second")
    }
}

fn ago(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}
