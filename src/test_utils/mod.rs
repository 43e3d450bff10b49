//! Test utilities for the updater
//!
//! In-process stand-ins for every external collaborator of an update cycle,
//! so orchestrator behaviour can be exercised without a network, a 7-Zip
//! install or a live browser:
//! - [`FakeReleaseIndex`] serves a fixed release list and archive body
//! - [`FakeArchiveTool`] lists and extracts a scripted payload
//! - [`StaticProcessInspector`] reports a fixed process table
//! - [`fixtures`] builds release index records and archive listings
//!
//! # Example
//!
//! ```rust,ignore
//! use chromium_updater::test_utils::{FakeArchiveTool, init_test_logging};
//!
//! init_test_logging(None);
//! let tool = FakeArchiveTool::for_payload("ungoogled-12.3.0-win64", "12.3.0", &[("chrome.exe", "v12")]);
//! ```

mod fakes;
pub mod fixtures;

pub use fakes::{FakeArchiveTool, FakeReleaseIndex, StaticProcessInspector};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays
/// off.
///
/// ```bash
/// RUST_LOG=chromium_updater=debug cargo test --features test-utils
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
