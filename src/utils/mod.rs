//! Cross-platform utilities and helpers
//!
//! # Modules
//!
//! - [`command`] - External command execution with timeouts
//! - [`fs`] - File system operations with atomic writes, copies and moves
//! - [`platform`] - Platform-specific helpers and path comparison
//! - [`progress`] - Download progress bars

pub mod command;
pub mod fs;
pub mod platform;
pub mod progress;

pub use fs::{atomic_write, copy_dir, ensure_dir};
pub use platform::{is_windows, paths_equal};
