//! Front-ends for `mailtally`.
//!
//! - [`checker`]: the `mailtally` binary, which checks every account, saves
//!   the results and prints them
//! - [`status`]: the `mailtally-status` binary, which only renders the last
//!   saved results
//!
//! Both expose a `run` function writing to any [`std::io::Write`] and
//! returning the process exit code.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod checker;
pub mod logging;
pub mod status;
