//! Logging setup for the binaries.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used by the checker when `RUST_LOG` is unset.
pub const CHECKER_FILTER: &str = "mailtally=info,mailtally_core=info";

/// Filter used by the status reporter when `RUST_LOG` is unset.
pub const STATUS_FILTER: &str = "mailtally=warn,mailtally_core=warn";

/// Installs the global subscriber: stderr always, plus `log_file` in append
/// mode when given and openable.
pub fn init(default_filter: &str, log_file: Option<&Path>) {
    let file_layer = log_file.and_then(open_append).map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
}

fn open_append(path: &Path) -> Option<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok()?;
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}
