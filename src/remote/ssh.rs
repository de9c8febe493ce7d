// (c) 2024 Ross Younger

use std::process::Stdio;

use anyhow::{Context as _, Result};
use tokio::process::{Child, Command};
use tracing::{debug, trace};

use super::{shell_quote, CommandOutput, Shell};
use crate::config::Configuration;

/// ssh exits 255 when the connection itself failed
const SSH_CONNECTION_FAILED: i32 = 255;

/// Runs commands on the remote host over ssh.
///
/// Each command is a separate ssh invocation. `BatchMode` is forced on, because
/// a password prompt would hang the run.
#[derive(Debug, Clone)]
pub struct Ssh {
    program: String,
    options: Vec<String>,
    destination: String,
}

impl Ssh {
    /// Constructor
    #[must_use]
    pub fn new(config: &Configuration, host: &str) -> Self {
        Self {
            program: config.ssh.clone(),
            options: config.ssh_options.clone(),
            destination: config.ssh_destination(host),
        }
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        let _ = cmd
            .args(["-o", "BatchMode=yes"])
            .args(&self.options)
            .arg(&self.destination)
            .arg(command)
            .stdin(Stdio::null());
        cmd
    }
}

impl Shell for Ssh {
    fn name(&self) -> &str {
        &self.destination
    }

    async fn run(&self, command: &str) -> Result<CommandOutput> {
        trace!("{}: {command}", self.destination);
        // stderr goes through tracing, so it cannot scribble over the progress display
        let output = self
            .command(command)
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("could not launch {}", self.program))?;
        let errors = stderr_lines(&output.stderr);
        for line in &errors {
            debug!("{} stderr: {line}", self.destination);
        }
        let result = CommandOutput::from_process(&output);
        if result.status == Some(SSH_CONNECTION_FAILED) {
            let reason = errors.last().map(|r| format!(": {r}")).unwrap_or_default();
            anyhow::bail!("ssh connection to {} failed{reason}", self.destination);
        }
        Ok(result)
    }

    fn spawn(&self, command: &str) -> Result<Child> {
        trace!("{} (spawn): {command}", self.destination);
        self.command(command)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("could not launch {}", self.program))
    }

    fn user_command(&self, command: &str) -> String {
        let mut words = vec![shell_quote(&self.program)];
        words.extend(self.options.iter().map(|o| shell_quote(o)));
        words.push(shell_quote(&self.destination));
        words.push(shell_quote(command));
        words.join(" ")
    }
}

/// Non-blank lines of a process's standard error
fn stderr_lines(stderr: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}
