//! Operator interaction.
//!
//! Everything that blocks on a human goes through [`Prompt`] so handlers
//! can be driven without a terminal.

use std::io::{self, BufRead, Write};

use tracing::warn;

/// Interactive operator channel.
pub trait Prompt: Send + Sync {
    /// Shows `message` and reads a line with echo disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read.
    fn password(&self, message: &str) -> io::Result<String>;

    /// Asks a yes/no question; only `y` (any case) counts as yes.
    ///
    /// # Errors
    ///
    /// Returns an error if the answer cannot be read.
    fn confirm(&self, question: &str) -> io::Result<bool>;

    /// Shows an informational message.
    fn notice(&self, message: &str);

    /// Sends the operator to an authorization page.
    fn open_url(&self, url: &str);
}

/// [`Prompt`] on the controlling terminal.
///
/// Notices go to stderr so stdout stays clean for `--output-json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn password(&self, message: &str) -> io::Result<String> {
        eprintln!("{message}");
        rpassword::prompt_password("Password: ")
    }

    fn confirm(&self, question: &str) -> io::Result<bool> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{question}")?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_yes(&answer))
    }

    fn notice(&self, message: &str) {
        eprintln!("{message}");
    }

    fn open_url(&self, url: &str) {
        eprintln!("Please visit this URL to authorize access:\n\n  {url}\n");
        if let Err(e) = opener::open_browser(url) {
            warn!("Could not open a browser: {e}");
        }
    }
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" Y \r\n"));
        assert!(!is_yes("yes\n"));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
    }
}
