//! `mailtally-status` - show the last saved unread counts.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use mailtally::logging;
use mailtally::status::{self, StatusArgs};
use mailtally_core::Paths;

fn main() -> ExitCode {
    let args = StatusArgs::parse();
    logging::init(logging::STATUS_FILTER, None);

    let paths = match Paths::resolve(args.config_dir.clone()) {
        Ok(paths) => paths,
        Err(e) => {
            println!("Error reading email status: {e}");
            return ExitCode::FAILURE;
        }
    };

    let now = Local::now().naive_local();
    let mut stdout = std::io::stdout();
    ExitCode::from(status::run(&args, &paths, now, &mut stdout))
}
