//! User crontab registration for non-Windows hosts.

use super::{RecurringTaskRegistrar, ScheduledInvocation};
use crate::config::parse_daily_time;
use crate::core::UpdaterError;
use crate::utils::command::ToolCommand;
use crate::utils::fs::remove_file_if_exists;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Owns the crontab lines ending in `# <name>`: one `@reboot` entry and one
/// daily entry. Every other line of the user's crontab is preserved.
#[derive(Debug, Clone)]
pub struct CronRegistrar {
    crontab: PathBuf,
}

impl Default for CronRegistrar {
    fn default() -> Self {
        Self {
            crontab: PathBuf::from("crontab"),
        }
    }
}

impl CronRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `crontab` executable.
    pub fn with_program(crontab: impl Into<PathBuf>) -> Self {
        Self {
            crontab: crontab.into(),
        }
    }

    async fn read(&self) -> Result<String> {
        let output = ToolCommand::new(&self.crontab).arg("-l").execute().await?;
        if output.success {
            return Ok(output.stdout);
        }
        // `crontab -l` exits non-zero when the user has no crontab yet.
        if output.stderr.to_lowercase().contains("no crontab") {
            return Ok(String::new());
        }
        Err(anyhow::anyhow!("crontab -l failed: {}", output.stderr.trim()))
    }

    async fn write(&self, content: &str) -> Result<()> {
        let staged = std::env::temp_dir().join(format!("chromium-updater-{}.cron", uuid::Uuid::new_v4()));
        tokio::fs::write(&staged, content)
            .await
            .with_context(|| format!("Failed to write {}", staged.display()))?;

        let result = ToolCommand::new(&self.crontab).arg(staged.display().to_string()).execute().await;
        remove_file_if_exists(&staged)?;

        let output = result?;
        if !output.success {
            anyhow::bail!("crontab install failed: {}", output.stderr.trim());
        }
        Ok(())
    }

    async fn apply(&self, name: &str, entry: Option<&ScheduledInvocation>) -> Result<()> {
        let existing = self.read().await?;
        let rewritten = rewrite_crontab(&existing, name, entry)?;
        if rewritten == existing {
            debug!("Crontab already up to date for '{}'", name);
            return Ok(());
        }
        self.write(&rewritten).await
    }

    async fn update(&self, action: &str, name: &str, entry: Option<&ScheduledInvocation>) -> Result<()> {
        self.apply(name, entry).await.map_err(|e| {
            UpdaterError::RegistrationError {
                action: action.to_string(),
                name: name.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl RecurringTaskRegistrar for CronRegistrar {
    async fn register(&self, invocation: &ScheduledInvocation) -> Result<()> {
        self.update("register", &invocation.name, Some(invocation)).await
    }

    async fn unregister(&self, name: &str) -> Result<()> {
        self.update("unregister", name, None).await
    }
}

/// Drop every line tagged `# <name>` and, when `entry` is given, append its
/// `@reboot` and daily lines.
pub(crate) fn rewrite_crontab(
    existing: &str,
    name: &str,
    entry: Option<&ScheduledInvocation>,
) -> Result<String> {
    let tag = format!("# {name}");
    let mut lines: Vec<String> = existing
        .lines()
        .filter(|line| !line.trim_end().ends_with(&tag))
        .map(str::to_string)
        .collect();

    if let Some(entry) = entry {
        let (hour, minute) = parse_daily_time(&entry.daily_time)?;
        let command = shell_command(entry);
        lines.push(format!("@reboot {command} {tag}"));
        lines.push(format!("{minute} {hour} * * * {command} {tag}"));
    }

    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    Ok(content)
}

fn shell_command(entry: &ScheduledInvocation) -> String {
    std::iter::once(entry.program.display().to_string())
        .chain(entry.args.iter().cloned())
        .map(|part| shell_quote(&part))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value.chars().all(|c| c.is_ascii_alphanumeric() || "-_./=:@+".contains(c))
    {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
