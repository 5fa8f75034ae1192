//! `mailtally` - check unread counts across Gmail and IMAP accounts.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::process::ExitCode;

use clap::Parser;
use mailtally::checker::{self, CheckerArgs};
use mailtally::logging;
use mailtally_core::{Paths, Services};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = CheckerArgs::parse();

    let paths = match Paths::resolve(args.config_dir.clone()) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("Error occurred: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(logging::CHECKER_FILTER, Some(&paths.log_file()));
    info!("Starting mailtally");

    let services = match Services::system() {
        Ok(services) => services,
        Err(e) => {
            error!("Failed to set up services: {e}");
            println!("Error occurred: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = std::io::stdout();
    ExitCode::from(checker::run(&args, paths, services, &mut stdout).await)
}
