//! Path MTU probes
// (c) 2024 Ross Younger

use std::net::IpAddr;

use anyhow::Result;
use tracing::trace;

use crate::remote::Shell;

/// Sends a single probe and reports whether it got through
// Only ever used with concrete types, so Send bounds on the futures don't matter.
#[allow(async_fn_in_trait)]
pub trait Prober {
    /// Sends one echo request with `payload` bytes of data and the Don't Fragment flag set.
    ///
    /// Returns true if a reply came back. Loss, an ICMP "fragmentation needed" or a local
    /// "message too long" are all simply `false`; errors mean the probe could not be sent at all.
    async fn probe(&self, payload: u32) -> Result<bool>;
}

/// Probes with iputils `ping`, from the local host to the remote
#[derive(Debug, Clone)]
pub struct Ping<S: Shell> {
    shell: S,
    target: IpAddr,
    timeout_secs: u16,
}

impl<S: Shell> Ping<S> {
    /// Constructor
    pub fn new(shell: S, target: IpAddr, timeout_secs: u16) -> Self {
        Self {
            shell,
            target,
            timeout_secs: timeout_secs.max(1),
        }
    }

    fn command(&self, payload: u32) -> String {
        format!(
            "ping -n -q -M do -c 1 -W {} -s {payload} {}",
            self.timeout_secs, self.target
        )
    }
}

impl<S: Shell> Prober for Ping<S> {
    async fn probe(&self, payload: u32) -> Result<bool> {
        let out = self.shell.run(&self.command(payload)).await?;
        trace!("probe {payload} to {} -> {:?}", self.target, out.status);
        // iputils: 0 = reply received, 1 = no reply, 2 = other error (which includes EMSGSIZE)
        Ok(out.success())
    }
}

#[cfg(test)]
mod test {
    use super::{Ping, Prober as _};
    use crate::testing::ScriptedShell;

    #[tokio::test]
    async fn status_decides() {
        let shell = ScriptedShell::new("local")
            .on("ping -n -q -M do -c 1 -W 1 -s 1472 10.0.0.2", "", 0)
            .on("ping -n -q -M do -c 1 -W 1 -s 8972 10.0.0.2", "", 1);
        let ping = Ping::new(shell, "10.0.0.2".parse().unwrap(), 0);
        assert!(ping.probe(1472).await.unwrap());
        assert!(!ping.probe(8972).await.unwrap());
    }
}
