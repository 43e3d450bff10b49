//! Command-line interface for the Chromium updater.
//!
//! The binary performs one update cycle per invocation. Scheduled runs are
//! just invocations started by the OS, so the same entry point serves manual
//! and automatic use.
//!
//! # Usage
//!
//! ```bash
//! # Check for and apply an update
//! chromium-updater
//!
//! # Update, then run automatically at login and daily
//! chromium-updater --install
//!
//! # Update, then stop running automatically
//! chromium-updater --uninstall
//!
//! # Use a different install directory and verbose logs
//! chromium-updater --install-dir ~/Apps/Chromium --verbose
//! ```
//!
//! # Registration After Failure
//!
//! `--install` and `--uninstall` take effect even when the update attempt
//! fails: turning automation on or off does not depend on whether this
//! particular run found or applied a new build. A configuration file that
//! fails to load counts as a failed update; registration then uses the
//! default settings. When both steps fail, the update error is reported and
//! the registration error is logged.
//!
//! # Exit Status
//!
//! | Result                         | Exit code |
//! |--------------------------------|-----------|
//! | Updated or already up to date  | 0         |
//! | Any update or registration error | 1       |

use crate::config::UpdaterConfig;
use crate::schedule::{RecurringTaskRegistrar, ScheduledInvocation, platform_registrar, set_schedule};
use crate::updater::{UpdateOrchestrator, UpdateOutcome, install_updater_binary, scheduled_program_in};
use crate::utils::progress::disable_progress;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Arguments passed to scheduled runs.
const SCHEDULED_RUN_ARGS: [&str; 2] = ["--no-progress", "--quiet"];

/// Keeps an ungoogled Chromium build up to date.
#[derive(Parser, Debug)]
#[command(
    name = "chromium-updater",
    about = "Keep an ungoogled Chromium install up to date",
    version,
    long_about = "Checks the release index for a newer ungoogled Chromium build and, if there is one, \
                  downloads it and replaces the install directory. Optionally registers itself to \
                  run at login and once a day."
)]
pub struct Cli {
    /// After updating, register this updater to run at login and daily.
    ///
    /// The updater binaries are first copied into the install directory and
    /// the windowless copy is what gets registered.
    #[arg(long, conflicts_with = "uninstall")]
    install: bool,

    /// After updating, remove the login and daily registrations.
    #[arg(long)]
    uninstall: bool,

    /// Path to the configuration file.
    ///
    /// Defaults to `CHROMIUM_UPDATER_CONFIG`, then
    /// `<config dir>/chromium-updater/config.toml`.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Install directory, overriding the configuration file.
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,

    /// Enable debug logging. Mutually exclusive with `--quiet`.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors.
    #[arg(short, long)]
    quiet: bool,

    /// Disable the download progress bar.
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    /// `Some(true)` for `--install`, `Some(false)` for `--uninstall`.
    #[must_use]
    pub fn schedule_request(&self) -> Option<bool> {
        if self.install {
            Some(true)
        } else if self.uninstall {
            Some(false)
        } else {
            None
        }
    }

    /// Log filter directive implied by `--verbose` / `--quiet`.
    #[must_use]
    pub fn log_directive(&self) -> String {
        let level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };
        format!("chromium_updater={level},warn")
    }

    /// Install the global tracing subscriber. `RUST_LOG` takes precedence over
    /// the flags.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_directive()));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Load configuration and apply command-line overrides.
    pub async fn load_config(&self) -> Result<UpdaterConfig> {
        let config = UpdaterConfig::load(self.config.clone()).await?;
        self.apply_overrides(config)
    }

    fn apply_overrides(&self, config: UpdaterConfig) -> Result<UpdaterConfig> {
        Ok(match &self.install_dir {
            Some(dir) => {
                let dir = std::path::absolute(dir)
                    .with_context(|| format!("Invalid install directory {}", dir.display()))?;
                config.with_install_dir(dir)
            }
            None => config,
        })
    }

    pub async fn execute(self) -> Result<()> {
        self.execute_on(platform_registrar()).await
    }

    /// [`Cli::execute`] with an explicit registrar.
    ///
    /// A configuration that fails to load still lets `--install` and
    /// `--uninstall` run, against the default configuration plus
    /// `--install-dir`. The load error is what gets reported.
    pub async fn execute_on(self, registrar: Arc<dyn RecurringTaskRegistrar>) -> Result<()> {
        self.init_logging();
        if self.no_progress || self.quiet {
            disable_progress();
        }

        match self.load_config().await {
            Ok(config) => {
                let orchestrator = UpdateOrchestrator::from_config(config.clone());
                self.execute_with(config, orchestrator, registrar).await
            }
            Err(e) if self.schedule_request().is_some() => {
                warn!("Configuration could not be loaded, applying schedule change with defaults");
                let fallback = self.apply_overrides(UpdaterConfig::default())?;
                self.execute_with(fallback, Err(e), registrar).await
            }
            Err(e) => Err(e),
        }
    }

    /// Run the update with the given collaborators, then apply any schedule
    /// change.
    ///
    /// `orchestrator` is a `Result` so a failure to set up the update (no
    /// archive tool, bad HTTP client settings) still lets registration run.
    pub async fn execute_with(
        self,
        config: UpdaterConfig,
        orchestrator: Result<UpdateOrchestrator>,
        registrar: Arc<dyn RecurringTaskRegistrar>,
    ) -> Result<()> {
        let update = match orchestrator {
            Ok(mut orchestrator) => orchestrator.run().await,
            Err(e) => Err(e),
        };
        match &update {
            Ok(UpdateOutcome::UpToDate { version, .. }) => info!("Chromium {} is up to date", version),
            Ok(UpdateOutcome::Updated { record, .. }) => {
                info!("Chromium updated to {}", record.tag_version);
            }
            Err(_) => {}
        }

        let schedule = match self.schedule_request() {
            Some(enabled) => self.apply_schedule(&config, enabled, registrar.as_ref()).await,
            None => Ok(()),
        };

        match (update, schedule) {
            (Ok(_), Ok(())) => Ok(()),
            (Err(update), Ok(())) => Err(update),
            (Ok(_), Err(schedule)) => Err(schedule),
            (Err(update), Err(schedule)) => {
                error!("Schedule change also failed: {:#}", schedule);
                Err(update)
            }
        }
    }

    async fn apply_schedule(
        &self,
        config: &UpdaterConfig,
        enabled: bool,
        registrar: &dyn RecurringTaskRegistrar,
    ) -> Result<()> {
        let program = if enabled {
            let current = std::env::current_exe().context("Failed to locate the running executable")?;
            let installed = install_updater_binary(&current, &config.install_dir).await?;
            installed.scheduled_program().to_path_buf()
        } else {
            scheduled_program_in(&config.install_dir)
        };

        let invocation = ScheduledInvocation::new(&config.task_name, program, &config.daily_time)
            .with_args(self.scheduled_args(config)?);
        set_schedule(registrar, enabled, &invocation).await
    }

    /// Arguments for scheduled runs: quiet, no progress, plus any explicit
    /// config or install directory so the scheduled run targets the same
    /// install.
    fn scheduled_args(&self, config: &UpdaterConfig) -> Result<Vec<String>> {
        let mut args: Vec<String> = SCHEDULED_RUN_ARGS.iter().map(ToString::to_string).collect();
        if let Some(path) = &self.config {
            let path = std::path::absolute(path)
                .with_context(|| format!("Invalid config path {}", path.display()))?;
            args.push("--config".to_string());
            args.push(path.display().to_string());
        }
        if self.install_dir.is_some() {
            args.push("--install-dir".to_string());
            args.push(config.install_dir.display().to_string());
        }
        Ok(args)
    }
}
