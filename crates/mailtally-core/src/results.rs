//! The result store: `last_results.json`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::paths::{Paths, write_with_mode};
use crate::{Error, Result};

/// Account name to unread count, in configuration order.
pub type CheckResult = IndexMap<String, i64>;

/// Local time with microseconds, no offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Document written after every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDocument {
    /// When the check finished, see [`TIMESTAMP_FORMAT`].
    pub timestamp: String,
    /// Per-account counts.
    pub counts: CheckResult,
}

impl ResultDocument {
    /// Stamps `counts` with `at`.
    #[must_use]
    pub fn new(counts: CheckResult, at: NaiveDateTime) -> Self {
        Self {
            timestamp: format_timestamp(at),
            counts,
        }
    }

    /// Parsed [`ResultDocument::timestamp`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTimestamp`] if it does not parse.
    pub fn checked_at(&self) -> Result<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }

    /// Overwrites `path` with this document, world-readable.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_with_mode(path, &json, 0o644)?;
        Ok(())
    }
}

/// Formats a local time the way result documents store it.
#[must_use]
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp.
///
/// Accepts naive local ISO-8601 with or without fractional seconds, and
/// RFC 3339 with an offset (converted to local time).
///
/// # Errors
///
/// Returns [`Error::InvalidTimestamp`] for anything else.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| {
            DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Local).naive_local())
        })
        .map_err(|_| Error::InvalidTimestamp(s.to_string()))
}

/// A results file as found on disk.
///
/// Reading is lenient: the raw JSON is kept for verbatim output and a
/// missing timestamp is tolerated.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResults {
    /// The document exactly as stored.
    pub raw: Value,
    /// Stored timestamp, if present.
    pub timestamp: Option<String>,
    /// Per-account counts.
    pub counts: CheckResult,
}

#[derive(Deserialize)]
struct LenientDocument {
    timestamp: Option<String>,
    #[serde(default)]
    counts: CheckResult,
}

impl StoredResults {
    /// Reads and parses `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a results
    /// document.
    pub fn read(path: &Path) -> Result<Self> {
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let document: LenientDocument = serde_json::from_value(raw.clone())?;
        Ok(Self {
            raw,
            timestamp: document.timestamp,
            counts: document.counts,
        })
    }
}

/// Where the reporter found a results file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsLocation {
    /// The current location.
    Primary(PathBuf),
    /// The location used by older releases.
    Legacy(PathBuf),
    /// Nothing at any checked location.
    Missing,
}

/// Finds the results file, consulting the legacy location only when
/// `allow_legacy` is set and the primary file is absent.
#[must_use]
pub fn locate(paths: &Paths, allow_legacy: bool) -> ResultsLocation {
    let primary = paths.results();
    if primary.exists() {
        return ResultsLocation::Primary(primary);
    }
    if allow_legacy
        && let Some(legacy) = paths.legacy_results()
        && legacy.exists()
    {
        return ResultsLocation::Legacy(legacy);
    }
    ResultsLocation::Missing
}
