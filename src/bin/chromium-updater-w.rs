//! Windowless chromium-updater entry point
//!
//! Same command line as `chromium-updater`, built for the Windows GUI
//! subsystem so login and daily runs do not open a console window. This is
//! the binary the recurring registrations point at.

#![cfg_attr(windows, windows_subsystem = "windows")]

use anyhow::Result;
use chromium_updater::cli;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    if let Err(e) = cli.execute().await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
