//! Command execution on the local and remote hosts
// (c) 2024 Ross Younger
//!
//! Everything mtubench does to a host goes through a [`Shell`]:
//! interface changes, probes and iperf runs. The remote side is an ssh
//! session which must be able to log in without prompting, as an account
//! that may change interface MTUs.

mod local;
mod ssh;

pub use local::Local;
pub use ssh::Ssh;

use anyhow::Result;
use tokio::process::Child;

/// The result of running a command to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, split into lines
    pub lines: Vec<String>,
    /// Exit status; None if the process was killed by a signal
    pub status: Option<i32>,
}

impl CommandOutput {
    /// Did the command exit zero?
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// The first line of output, trimmed
    #[must_use]
    pub fn first_line(&self) -> Option<&str> {
        self.lines.first().map(|s| s.trim())
    }

    pub(crate) fn from_process(output: &std::process::Output) -> Self {
        Self {
            lines: String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(String::from)
                .collect(),
            status: output.status.code(),
        }
    }
}

/// A host we can run shell commands on
// Only ever used with concrete types, so Send bounds on the futures don't matter.
#[allow(async_fn_in_trait)]
pub trait Shell {
    /// Short description for messages, e.g. `local` or `root@10.0.0.2`
    fn name(&self) -> &str;

    /// Runs a shell command to completion, capturing its standard output.
    ///
    /// A non-zero exit status is not an error; only failure to run the command at all is.
    async fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Starts a long-running command without waiting for it.
    /// The child is killed if the returned handle is dropped.
    fn spawn(&self, command: &str) -> Result<Child>;

    /// Formats a command the way a user would type it to run it on this host
    fn user_command(&self, command: &str) -> String;
}

/// Quotes a string for inclusion in a POSIX shell command line
#[must_use]
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod test {
    use super::{shell_quote, CommandOutput};

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("eth0"), "eth0");
        assert_eq!(shell_quote("/usr/bin/iperf"), "/usr/bin/iperf");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn output_accessors() {
        let o = CommandOutput {
            lines: vec!["  9000 ".into(), "x".into()],
            status: Some(0),
        };
        assert!(o.success());
        assert_eq!(o.first_line(), Some("9000"));
        assert!(!CommandOutput::default().success());
    }
}
