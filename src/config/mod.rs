//! Configuration management.
//!
//! The updater has a single configuration document, [`UpdaterConfig`], loaded
//! from TOML at startup and passed by value into the orchestrator. Nothing
//! reads configuration from globals after that point.

mod global;

pub use global::{CONFIG_PATH_ENV, UpdaterConfig, parse_daily_time};
