//! File system utilities for the install directory.
//!
//! - [`atomic`]: temp-and-rename writes for the version record and journal
//! - [`dirs`]: directory creation, recursive copy/removal and entry moves

pub mod atomic;
pub mod dirs;

// Directory operations
pub use dirs::{copy_dir, ensure_dir, move_entry, remove_dir_all, remove_file_if_exists};

// Atomic write operations
pub use atomic::atomic_write;
