//! Error handling for the updater
//!
//! This module provides the typed error taxonomy of an update cycle and the
//! user-facing error reporting used by the binary. Two layers are involved:
//! 1. **Strongly-typed errors** ([`UpdaterError`]) for the failures that are part
//!    of an operation's contract (a guard tripping, an archive failing
//!    verification, the extractor exiting non-zero, ...)
//! 2. **User-friendly messages** ([`ErrorContext`]) with details and suggestions
//!    for whoever reads the terminal or the scheduler's log
//!
//! Library functions return [`anyhow::Result`]. Contract failures are raised as
//! an [`UpdaterError`] wrapped in [`anyhow::Error`], so callers and tests can
//! recover the variant with `downcast_ref::<UpdaterError>()`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use chromium_updater::core::{UpdaterError, user_friendly_error};
//!
//! let error = anyhow::Error::from(UpdaterError::AlreadyRunning {
//!     path: r"C:\ProgramData\Ungoogled Chromium\chrome.exe".to_string(),
//! });
//! user_friendly_error(error).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Failures of an update cycle.
///
/// Every variant aborts the whole cycle. There is no partial success and no
/// automatic retry; the recurring schedule is the retry mechanism.
#[derive(Error, Debug)]
pub enum UpdaterError {
    /// The target application is running from the install directory.
    ///
    /// Raised before any network access or filesystem mutation.
    #[error("Application is currently running from {path}")]
    AlreadyRunning {
        /// Executable path of the live process
        path: String,
    },

    /// Another updater holds the install directory lock
    #[error("Another update is already in progress for {path}")]
    UpdateInProgress {
        /// Install directory that is locked
        path: String,
    },

    /// Transport or HTTP failure talking to the release index or downloading
    #[error("Network error: {operation}")]
    NetworkError {
        /// What was being fetched
        operation: String,
        /// Underlying transport error or HTTP status
        reason: String,
    },

    /// No release matched both the name filter and the platform asset suffix
    #[error("No release matching '{filter}' with an asset ending in '{suffix}' was found")]
    NotFound {
        /// Release name filter in effect
        filter: String,
        /// Asset suffix in effect
        suffix: String,
    },

    /// A name-matched release had a tag with no recognizable version
    #[error("Release version could not be parsed from tag '{tag}'")]
    ParseError {
        /// The offending tag
        tag: String,
    },

    /// The downloaded archive does not contain the expected manifest entry
    #[error("Unexpected contents of archive {archive}: {reason}")]
    CorruptArchive {
        /// Archive that failed verification
        archive: String,
        /// Why it was rejected
        reason: String,
    },

    /// The external archive tool exited unsuccessfully while extracting
    #[error("Archive extraction failed for {archive}")]
    ExtractionError {
        /// Archive being extracted
        archive: String,
        /// Error output of the tool
        stderr: String,
    },

    /// The install directory is not in the shape a swap requires
    #[error("Unexpected install directory state at {path}: {reason}")]
    DirectoryState {
        /// Offending path
        path: String,
        /// What was wrong with it
        reason: String,
    },

    /// No usable 7-Zip executable could be located
    #[error("7-Zip was not found")]
    ArchiveToolNotFound {
        /// Locations that were searched
        searched: Vec<String>,
    },

    /// Invalid configuration file or value
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// Registering or removing the recurring run failed
    #[error("Failed to {action} recurring execution '{name}'")]
    RegistrationError {
        /// "register" or "unregister"
        action: String,
        /// Task name
        name: String,
        /// Output of the failing OS command
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl UpdaterError {
    /// Shorthand for a [`UpdaterError::NetworkError`].
    pub fn network(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::NetworkError {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a [`UpdaterError::DirectoryState`].
    pub fn directory_state(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::DirectoryState {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// When displayed, errors show the main message in red, optional details in
/// yellow and an optional suggestion in green.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: UpdaterError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: UpdaterError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`].
///
/// Recognizes [`UpdaterError`] anywhere in the chain and IO permission errors;
/// anything else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let typed = error.chain().find_map(|cause| cause.downcast_ref::<UpdaterError>());
    if let Some(updater_error) = typed {
        if !matches!(updater_error, UpdaterError::IoError(_) | UpdaterError::Other { .. }) {
            return create_error_context(updater_error);
        }
    }

    if let Some(io_error) = error.chain().find_map(|cause| cause.downcast_ref::<std::io::Error>())
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(UpdaterError::Other {
            message: format_chain(&error),
        })
        .with_suggestion(
            "Run the updater from an account that can write to the install directory \
             (Administrator for Program Files / ProgramData installs)",
        )
        .with_details("The updater was denied access to a file it needed to read or replace");
    }

    ErrorContext::new(UpdaterError::Other {
        message: format_chain(&error),
    })
}

fn format_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }
    message
}

/// Map each contract failure to tailored suggestions.
fn create_error_context(error: &UpdaterError) -> ErrorContext {
    let cloned = clone_error(error);
    match error {
        UpdaterError::AlreadyRunning { .. } => ErrorContext::new(cloned)
            .with_suggestion("Close every browser window and run the updater again")
            .with_details("Replacing files of a running browser would corrupt the installation, so nothing was changed"),

        UpdaterError::UpdateInProgress { .. } => ErrorContext::new(cloned)
            .with_suggestion("Wait for the other update to finish; the next scheduled run will pick up anything it missed"),

        UpdaterError::NetworkError { reason, .. } => ErrorContext::new(cloned)
            .with_details(reason.clone())
            .with_suggestion("Check your internet connection. GitHub rate limits anonymous API use; set github_token in the config if this persists"),

        UpdaterError::NotFound { .. } => ErrorContext::new(cloned)
            .with_suggestion("Check release_name_filter and asset_suffix in the config against the published release names")
            .with_details("Releases without a matching asset are skipped; none were left"),

        UpdaterError::ParseError { .. } => ErrorContext::new(cloned)
            .with_suggestion("Adjust version_pattern in the config so its first capture group matches the tag's version"),

        UpdaterError::CorruptArchive { .. } => ErrorContext::new(cloned)
            .with_details("The install directory was left untouched")
            .with_suggestion("The download may be truncated or the release layout changed; the next run will download it again"),

        UpdaterError::ExtractionError { stderr, .. } => ErrorContext::new(cloned)
            .with_details(stderr.clone())
            .with_suggestion("Check free disk space and that 7-Zip can open the archive"),

        UpdaterError::DirectoryState { .. } => ErrorContext::new(cloned)
            .with_suggestion("Inspect the install directory; removing the version record forces a clean reinstall on the next run"),

        UpdaterError::ArchiveToolNotFound { searched } => ErrorContext::new(cloned)
            .with_details(format!("Searched: {}", searched.join(", ")))
            .with_suggestion("Install 7-Zip from https://www.7-zip.org/ or set archive_tool in the config"),

        UpdaterError::ConfigError { .. } => ErrorContext::new(cloned)
            .with_suggestion("Fix the configuration file or remove it to fall back to defaults"),

        UpdaterError::RegistrationError { reason, .. } => ErrorContext::new(cloned)
            .with_details(reason.clone())
            .with_suggestion("Re-run with --install or --uninstall from an account allowed to manage scheduled tasks"),

        UpdaterError::IoError(_) | UpdaterError::Other { .. } => ErrorContext::new(cloned),
    }
}

fn clone_error(error: &UpdaterError) -> UpdaterError {
    match error {
        UpdaterError::AlreadyRunning { path } => UpdaterError::AlreadyRunning {
            path: path.clone(),
        },
        UpdaterError::UpdateInProgress { path } => UpdaterError::UpdateInProgress {
            path: path.clone(),
        },
        UpdaterError::NetworkError { operation, reason } => UpdaterError::NetworkError {
            operation: operation.clone(),
            reason: reason.clone(),
        },
        UpdaterError::NotFound { filter, suffix } => UpdaterError::NotFound {
            filter: filter.clone(),
            suffix: suffix.clone(),
        },
        UpdaterError::ParseError { tag } => UpdaterError::ParseError {
            tag: tag.clone(),
        },
        UpdaterError::CorruptArchive { archive, reason } => UpdaterError::CorruptArchive {
            archive: archive.clone(),
            reason: reason.clone(),
        },
        UpdaterError::ExtractionError { archive, stderr } => UpdaterError::ExtractionError {
            archive: archive.clone(),
            stderr: stderr.clone(),
        },
        UpdaterError::DirectoryState { path, reason } => UpdaterError::DirectoryState {
            path: path.clone(),
            reason: reason.clone(),
        },
        UpdaterError::ArchiveToolNotFound { searched } => UpdaterError::ArchiveToolNotFound {
            searched: searched.clone(),
        },
        UpdaterError::ConfigError { message } => UpdaterError::ConfigError {
            message: message.clone(),
        },
        UpdaterError::RegistrationError { action, name, reason } => {
            UpdaterError::RegistrationError {
                action: action.clone(),
                name: name.clone(),
                reason: reason.clone(),
            }
        }
        // io::Error is not Clone
        UpdaterError::IoError(e) => UpdaterError::Other {
            message: format!("IO error: {e}"),
        },
        UpdaterError::Other { message } => UpdaterError::Other {
            message: message.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_error_display() {
        let error = UpdaterError::AlreadyRunning {
            path: "/opt/chromium/chrome".to_string(),
        };
        assert_eq!(error.to_string(), "Application is currently running from /opt/chromium/chrome");

        let error = UpdaterError::NotFound {
            filter: "ungoogled".to_string(),
            suffix: "win64.7z".to_string(),
        };
        assert!(error.to_string().contains("'ungoogled'"));
        assert!(error.to_string().contains("'win64.7z'"));
    }

    #[test]
    fn test_user_friendly_error_finds_typed_error_under_context() {
        let error = anyhow::Error::from(UpdaterError::ArchiveToolNotFound {
            searched: vec!["7z".to_string(), "7za".to_string()],
        })
        .context("Failed to prepare update");

        let ctx = user_friendly_error(error);
        assert!(matches!(ctx.error, UpdaterError::ArchiveToolNotFound { .. }));
        assert_eq!(ctx.details.as_deref(), Some("Searched: 7z, 7za"));
        assert!(ctx.suggestion.unwrap().contains("7-zip.org"));
    }

    #[test]
    fn test_user_friendly_error_permission_denied() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error: anyhow::Error =
            Err::<(), _>(io).context("Failed to remove chrome.exe").unwrap_err();

        let ctx = user_friendly_error(error);
        assert!(ctx.suggestion.unwrap().contains("Administrator"));
        assert!(ctx.error.to_string().contains("Failed to remove chrome.exe"));
    }

    #[test]
    fn test_user_friendly_error_generic_includes_chain() {
        let error = anyhow::anyhow!("root cause").context("outer");
        let ctx = user_friendly_error(error);
        let message = ctx.error.to_string();
        assert!(message.starts_with("outer"));
        assert!(message.contains("1: root cause"));
        assert!(ctx.suggestion.is_none());
    }

    #[test]
    fn test_error_context_display_format() {
        let ctx = ErrorContext::new(UpdaterError::Other {
            message: "boom".to_string(),
        })
        .with_details("some details")
        .with_suggestion("try again");

        assert_eq!(ctx.to_string(), "boom\nDetails: some details\nSuggestion: try again");
    }
}
