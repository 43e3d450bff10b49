//! Download progress reporting.
//!
//! Progress bars are shown only for interactive runs. They are hidden when:
//! - [`disable_progress`] was called (the CLI does so for `--no-progress` and
//!   `--quiet`)
//! - `CHROMIUM_UPDATER_NO_PROGRESS` is set
//! - stderr is not a terminal (scheduled runs, redirected output)

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};

/// Environment variable that disables all progress output.
pub const NO_PROGRESS_ENV: &str = "CHROMIUM_UPDATER_NO_PROGRESS";

static PROGRESS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Hide every progress bar created from now on in this process.
pub fn disable_progress() {
    PROGRESS_DISABLED.store(true, Ordering::Relaxed);
}

fn is_progress_disabled() -> bool {
    PROGRESS_DISABLED.load(Ordering::Relaxed)
        || std::env::var_os(NO_PROGRESS_ENV).is_some()
        || !std::io::stderr().is_terminal()
}

/// A byte-count progress bar for archive downloads.
#[derive(Clone)]
pub struct DownloadProgress {
    inner: IndicatifBar,
}

impl DownloadProgress {
    /// Create a bar for a download of `len` bytes, or a spinner-like bar when
    /// the server did not send a content length.
    #[must_use]
    pub fn new(len: Option<u64>, prefix: impl Into<String>) -> Self {
        let inner = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            match len {
                Some(len) => {
                    let bar = IndicatifBar::new(len);
                    bar.set_style(download_style());
                    bar
                }
                None => {
                    let bar = IndicatifBar::new_spinner();
                    bar.set_style(spinner_style());
                    bar
                }
            }
        };
        inner.set_prefix(prefix.into());
        Self {
            inner,
        }
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn download_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("=> ")
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{prefix:.bold.cyan} {spinner:.cyan} {bytes}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_accepts_updates() {
        // stderr is not a terminal under the test harness, so this is hidden.
        let progress = DownloadProgress::new(Some(10), "Downloading");
        progress.inc(5);
        progress.inc(5);
        progress.finish_and_clear();
    }
}
