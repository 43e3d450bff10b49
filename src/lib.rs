//! chromium-updater - unattended updater for Ungoogled Chromium
//!
//! Keeps a local install of an Ungoogled Chromium build in step with the
//! newest build published to a GitHub-style release index. One invocation
//! performs one update cycle; the binary can register itself to run at login
//! and once a day so the cycle repeats without user involvement.
//!
//! # Architecture Overview
//!
//! An update cycle is a straight line with no retries:
//!
//! ```text
//! guard: browser running from install dir?  ── yes ──> AlreadyRunning
//!   └── lock install dir (fails fast if another updater holds it)
//!         └── latest release id == recorded id?  ── yes ──> UpToDate
//!               └── download archive
//!                     └── verify <root>/<version>.manifest is listed
//!                           └── extract into a staging dir
//!                                 └── swap staging payload into install dir
//!                                       └── write installed-version record
//! ```
//!
//! The downloaded archive is removed on every path out of the cycle. The
//! install directory is only mutated after the archive has been verified and
//! fully extracted.
//!
//! # Core Modules
//!
//! ## Update Cycle
//! - [`updater`] - The orchestrator driving one cycle and its state machine
//! - [`release`] - Release index access and newest-release selection
//! - [`process`] - Guard against updating a browser that is running
//! - [`archive`] - Archive listing, manifest verification and extraction
//! - [`install`] - Install directory lock, swap and installed-version record
//!
//! ## Automation
//! - [`schedule`] - Registration of the login and daily runs
//!
//! ## Supporting Modules
//! - [`cli`] - Command-line interface
//! - [`config`] - TOML configuration with defaults for every field
//! - [`core`] - Error taxonomy and user-facing error reporting
//! - [`utils`] - Filesystem, platform, external-command and progress helpers
//!
//! # Configuration
//!
//! Everything has a default; a config file only needs the keys it changes:
//!
//! ```toml
//! install_dir = "~/Apps/Chromium"
//! release_name_filter = "ungoogled"
//! asset_suffix = "win64.7z"
//! daily_time = "03:30"
//! ```
//!
//! # Platform Support
//!
//! The update cycle runs anywhere 7-Zip is available. Registration uses the
//! `HKCU` Run key and Task Scheduler on Windows, and the user's crontab
//! elsewhere.

// Update cycle
pub mod archive;
pub mod install;
pub mod process;
pub mod release;
pub mod updater;

// Automation
pub mod schedule;

// Supporting modules
pub mod cli;
pub mod config;
pub mod core;
pub mod utils;

// Test utilities (only available in test builds)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
