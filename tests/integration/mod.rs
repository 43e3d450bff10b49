//! Integration test suite for chromium-updater
//!
//! End-to-end update cycles against a mock release index, plus tests that
//! drive the compiled binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration --features test-utils
//! ```
//!
//! # Test Organization
//!
//! - **update_cycle**: Full cycles over HTTP with a scripted archive tool
//! - **cli**: Argument handling and error reporting of the binary

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod update_cycle;
