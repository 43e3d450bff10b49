//! chromium-updater entry point
//!
//! Parses arguments, runs one update cycle and any requested schedule change,
//! and turns failures into a readable message and exit code 1.

use anyhow::Result;
use chromium_updater::cli;
use chromium_updater::core::error::user_friendly_error;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
