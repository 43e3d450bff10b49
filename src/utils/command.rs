//! External command execution with captured output.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Captured result of an external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Builder for a single external tool invocation with captured output.
///
/// ```rust,ignore
/// use chromium_updater::utils::command::ToolCommand;
///
/// let output = ToolCommand::new("7z")
///     .args(["l", "archive.7z"])
///     .with_context("Listing archive")
///     .execute()
///     .await?;
/// ```
///
/// A non-zero exit status is reported through [`ToolOutput::success`] rather
/// than as an error; only spawn failures and timeouts fail `execute`. On
/// Windows the child gets no console window.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_duration: Some(Duration::from_secs(300)),
            context: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = Some(duration);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The full command line, for logs and error messages.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub async fn execute(self) -> Result<ToolOutput> {
        let command_line = self.command_line();
        match &self.context {
            Some(ctx) => tracing::debug!(target: "command", "({}) Executing command: {}", ctx, command_line),
            None => tracing::debug!(target: "command", "Executing command: {}", command_line),
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let output_future = cmd.output();
        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result.with_context(|| format!("Failed to execute {command_line}"))?,
                Err(_) => {
                    tracing::warn!(
                        target: "command",
                        "Command timed out after {} seconds: {}",
                        duration.as_secs(),
                        command_line
                    );
                    anyhow::bail!("{command_line} timed out after {} seconds", duration.as_secs());
                }
            },
            None => output_future.await.with_context(|| format!("Failed to execute {command_line}"))?,
        };

        let result = ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success {
            tracing::debug!(target: "command", "Command exited with {:?}: {}", result.code, result.stderr.trim());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_joins_program_and_args() {
        let cmd = ToolCommand::new("schtasks").args(["/Delete", "/TN", "Updater"]).arg("/F");
        assert_eq!(cmd.command_line(), "schtasks /Delete /TN Updater /F");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let result = ToolCommand::new("/nonexistent/tool/binary").arg("l").execute().await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_status() {
        let output = ToolCommand::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]).execute().await.unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_error() {
        let result = ToolCommand::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        assert!(result.is_err());
    }
}
