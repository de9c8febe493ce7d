// (c) 2024 Ross Younger

use std::process::Stdio;

use anyhow::{Context as _, Result};
use tokio::process::{Child, Command};
use tracing::trace;

use super::{CommandOutput, Shell};

/// Runs commands on this machine via `sh -c`
#[derive(Debug, Clone, Copy, Default)]
pub struct Local {}

impl Local {
    fn command(command: &str) -> Command {
        let mut cmd = Command::new("sh");
        let _ = cmd.arg("-c").arg(command).stdin(Stdio::null());
        cmd
    }
}

impl Shell for Local {
    fn name(&self) -> &str {
        "local"
    }

    async fn run(&self, command: &str) -> Result<CommandOutput> {
        trace!("local: {command}");
        let output = Self::command(command)
            .stderr(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to run `{command}`"))?;
        Ok(CommandOutput::from_process(&output))
    }

    fn spawn(&self, command: &str) -> Result<Child> {
        trace!("local (spawn): {command}");
        Self::command(command)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start `{command}`"))
    }

    fn user_command(&self, command: &str) -> String {
        command.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::Local;
    use crate::remote::Shell as _;

    #[tokio::test]
    async fn captures_lines_and_status() {
        let out = Local::default()
            .run("printf 'a\\nb\\n'; exit 3")
            .await
            .unwrap();
        assert_eq!(out.lines, vec!["a", "b"]);
        assert_eq!(out.status, Some(3));
        assert!(!out.success());
    }
}
