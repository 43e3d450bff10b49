//! Recurring execution of the updater.
//!
//! Two triggers are registered under one well-known name: one at user login
//! and one daily at a fixed time. Unregistering removes both and succeeds when
//! they are already gone.
//!
//! | Platform | Login trigger                 | Daily trigger          |
//! |----------|-------------------------------|------------------------|
//! | Windows  | `HKCU\...\CurrentVersion\Run` | Task Scheduler (`schtasks`) |
//! | other    | `@reboot` crontab line        | crontab line           |

mod cron;
mod windows;

pub use cron::CronRegistrar;
pub use windows::WindowsTaskRegistrar;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

/// The command a recurring trigger runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledInvocation {
    /// Registration name, shared by both triggers.
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Daily trigger time as `HH:MM`.
    pub daily_time: String,
}

impl ScheduledInvocation {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>, daily_time: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            daily_time: daily_time.into(),
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// OS integration for running the updater on a schedule.
#[async_trait]
pub trait RecurringTaskRegistrar: Send + Sync {
    /// Create or replace the login and daily triggers for `invocation`.
    async fn register(&self, invocation: &ScheduledInvocation) -> Result<()>;

    /// Remove both triggers named `name`. Absent triggers are not an error.
    async fn unregister(&self, name: &str) -> Result<()>;
}

/// Enable or disable recurring execution of `invocation`.
pub async fn set_schedule(
    registrar: &dyn RecurringTaskRegistrar,
    enabled: bool,
    invocation: &ScheduledInvocation,
) -> Result<()> {
    if enabled {
        registrar.register(invocation).await?;
        info!(
            "Registered '{}' to run at login and daily at {}",
            invocation.name, invocation.daily_time
        );
    } else {
        registrar.unregister(&invocation.name).await?;
        info!("Removed scheduled runs of '{}'", invocation.name);
    }
    Ok(())
}

/// The registrar for the current operating system.
#[must_use]
pub fn platform_registrar() -> Arc<dyn RecurringTaskRegistrar> {
    if cfg!(windows) {
        Arc::new(WindowsTaskRegistrar::new())
    } else {
        Arc::new(CronRegistrar::new())
    }
}

/// Registrar that only remembers registrations. Used in tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryRegistrar {
    registrations: Mutex<HashMap<String, ScheduledInvocation>>,
}

impl InMemoryRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ScheduledInvocation> {
        self.registrations.lock().ok()?.get(name).cloned()
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

#[async_trait]
impl RecurringTaskRegistrar for InMemoryRegistrar {
    async fn register(&self, invocation: &ScheduledInvocation) -> Result<()> {
        let mut registrations =
            self.registrations.lock().map_err(|_| anyhow::anyhow!("registrar state poisoned"))?;
        registrations.insert(invocation.name.clone(), invocation.clone());
        Ok(())
    }

    async fn unregister(&self, name: &str) -> Result<()> {
        let mut registrations =
            self.registrations.lock().map_err(|_| anyhow::anyhow!("registrar state poisoned"))?;
        registrations.remove(name);
        Ok(())
    }
}
