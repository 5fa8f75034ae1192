//! On-disk layout of the configuration root.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Directory name under the platform config dir.
pub const APP_DIR: &str = "mailtally";

/// Directory name under `$HOME` used by older releases.
const LEGACY_DIR: &str = ".mailtally";

const CONFIG_FILE: &str = "config.json";
const CREDENTIALS_FILE: &str = "credentials.json";
const TOKENS_DIR: &str = "tokens";
const RESULTS_FILE: &str = "last_results.json";
const LOG_FILE: &str = "mailtally.log";

/// Locations of every file `mailtally` reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
    legacy_root: Option<PathBuf>,
}

impl Paths {
    /// Uses `root` as the configuration root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            legacy_root: dirs::home_dir().map(|home| home.join(LEGACY_DIR)),
        }
    }

    /// Resolves the configuration root from an explicit override or the
    /// platform config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is given and the platform has no
    /// config directory.
    pub fn resolve(root_override: Option<PathBuf>) -> Result<Self> {
        match root_override {
            Some(root) => Ok(Self::new(root)),
            None => dirs::config_dir()
                .map(|dir| Self::new(dir.join(APP_DIR)))
                .ok_or_else(|| Error::Config("could not determine config directory".into())),
        }
    }

    /// Overrides the directory searched for legacy results.
    #[must_use]
    pub fn with_legacy_root(mut self, legacy_root: impl Into<PathBuf>) -> Self {
        self.legacy_root = Some(legacy_root.into());
        self
    }

    /// Configuration root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `config.json`
    #[must_use]
    pub fn config(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// `credentials.json`, the Google client-secret file.
    #[must_use]
    pub fn credentials(&self) -> PathBuf {
        self.root.join(CREDENTIALS_FILE)
    }

    /// Directory holding one token bundle per OAuth account.
    #[must_use]
    pub fn tokens_dir(&self) -> PathBuf {
        self.root.join(TOKENS_DIR)
    }

    /// Token bundle for `email`.
    #[must_use]
    pub fn token_for(&self, email: &str) -> PathBuf {
        self.tokens_dir().join(format!("{email}.json"))
    }

    /// `last_results.json`
    #[must_use]
    pub fn results(&self) -> PathBuf {
        self.root.join(RESULTS_FILE)
    }

    /// Results file written by older releases, if a home directory is known.
    #[must_use]
    pub fn legacy_results(&self) -> Option<PathBuf> {
        self.legacy_root.as_ref().map(|dir| dir.join(RESULTS_FILE))
    }

    /// Append-only log file.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    /// Creates the root and `tokens/` directories.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.tokens_dir())?;
        Ok(())
    }
}

/// Writes `contents` to `path`, replacing it, and sets the Unix mode bits.
pub(crate) fn write_with_mode(path: &Path, contents: &[u8], mode: u32) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)?;
        file.write_all(contents)?;
        // `mode` only applies on creation.
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }
    #[cfg(not(unix))]
    {
        let _ = mode;
        fs::write(path, contents)
    }
}
