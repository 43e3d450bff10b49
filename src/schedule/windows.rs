//! Windows login key and Task Scheduler registration.

use super::{RecurringTaskRegistrar, ScheduledInvocation};
use crate::core::UpdaterError;
use crate::utils::command::{ToolCommand, ToolOutput};
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

const RUN_KEY: &str = r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run";

/// Registers the updater through `reg.exe` and `schtasks.exe`.
///
/// Removal queries each trigger first and deletes only what exists, so a
/// missing entry never depends on parsing localized error text.
#[derive(Debug, Clone)]
pub struct WindowsTaskRegistrar {
    reg: String,
    schtasks: String,
}

impl Default for WindowsTaskRegistrar {
    fn default() -> Self {
        Self {
            reg: "reg".to_string(),
            schtasks: "schtasks".to_string(),
        }
    }
}

impl WindowsTaskRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// `"<program>" <args...>`, the command both triggers execute.
    #[must_use]
    pub fn command_line(invocation: &ScheduledInvocation) -> String {
        let mut line = format!("\"{}\"", invocation.program.display());
        for arg in &invocation.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push_str(&format!("\"{arg}\""));
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    fn run_key_add(&self, invocation: &ScheduledInvocation) -> ToolCommand {
        ToolCommand::new(&self.reg)
            .args(["add", RUN_KEY, "/v"])
            .arg(&invocation.name)
            .args(["/t", "REG_SZ", "/d"])
            .arg(Self::command_line(invocation))
            .arg("/f")
            .with_context("Registering login trigger")
    }

    fn run_key_query(&self, name: &str) -> ToolCommand {
        ToolCommand::new(&self.reg).args(["query", RUN_KEY, "/v", name])
    }

    fn run_key_delete(&self, name: &str) -> ToolCommand {
        ToolCommand::new(&self.reg)
            .args(["delete", RUN_KEY, "/v", name, "/f"])
            .with_context("Removing login trigger")
    }

    fn task_create(&self, invocation: &ScheduledInvocation) -> ToolCommand {
        ToolCommand::new(&self.schtasks)
            .args(["/Create", "/SC", "DAILY", "/TN"])
            .arg(&invocation.name)
            .arg("/TR")
            .arg(Self::command_line(invocation))
            .arg("/ST")
            .arg(&invocation.daily_time)
            .arg("/F")
            .with_context("Registering daily task")
    }

    fn task_query(&self, name: &str) -> ToolCommand {
        ToolCommand::new(&self.schtasks).args(["/Query", "/TN", name])
    }

    fn task_delete(&self, name: &str) -> ToolCommand {
        ToolCommand::new(&self.schtasks)
            .args(["/Delete", "/TN", name, "/F"])
            .with_context("Removing daily task")
    }
}

async fn run(command: ToolCommand, action: &str, name: &str) -> Result<()> {
    let output = command.execute().await.map_err(|e| registration_error(action, name, e))?;
    if !output.success {
        return Err(registration_error(action, name, failure_text(&output)).into());
    }
    Ok(())
}

async fn exists(command: ToolCommand) -> Result<bool> {
    Ok(command.execute().await?.success)
}

fn registration_error(action: &str, name: &str, reason: impl ToString) -> UpdaterError {
    UpdaterError::RegistrationError {
        action: action.to_string(),
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn failure_text(output: &ToolOutput) -> String {
    let text = if output.stderr.trim().is_empty() { &output.stdout } else { &output.stderr };
    text.trim().to_string()
}

#[async_trait]
impl RecurringTaskRegistrar for WindowsTaskRegistrar {
    async fn register(&self, invocation: &ScheduledInvocation) -> Result<()> {
        run(self.run_key_add(invocation), "register login trigger", &invocation.name).await?;
        run(self.task_create(invocation), "register daily task", &invocation.name).await
    }

    async fn unregister(&self, name: &str) -> Result<()> {
        if exists(self.run_key_query(name)).await? {
            run(self.run_key_delete(name), "remove login trigger", name).await?;
        } else {
            debug!("No login trigger named '{}'", name);
        }

        if exists(self.task_query(name)).await? {
            run(self.task_delete(name), "remove daily task", name).await?;
        } else {
            debug!("No scheduled task named '{}'", name);
        }
        Ok(())
    }
}
