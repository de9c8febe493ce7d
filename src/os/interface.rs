// iproute2 interface adapter
// (c) 2024 Ross Younger

use std::net::IpAddr;

use anyhow::{Context as _, Result};
use tracing::{debug, trace};

use super::Interface;
use crate::remote::{shell_quote, Shell};

/// An interface on some host, controlled with `ip link`
#[derive(Debug, Clone)]
pub struct IpLink<S: Shell> {
    shell: S,
    device: String,
}

impl<S: Shell> IpLink<S> {
    /// Constructor
    pub fn new(shell: S, device: &str) -> Self {
        Self {
            shell,
            device: device.to_string(),
        }
    }

    fn set_command(&self, mtu: u32) -> String {
        format!("ip link set dev {} mtu {mtu}", shell_quote(&self.device))
    }
}

impl<S: Shell> Interface for IpLink<S> {
    fn describe(&self) -> String {
        format!("{} {}", self.shell.name(), self.device)
    }

    async fn set_mtu(&self, mtu: u32) -> Result<u32> {
        let out = self.shell.run(&self.set_command(mtu)).await?;
        if !out.success() {
            debug!("{}: setting MTU {mtu} failed ({:?})", self.describe(), out.status);
        }
        self.read_mtu().await
    }

    async fn read_mtu(&self) -> Result<u32> {
        let command = format!("cat /sys/class/net/{}/mtu", shell_quote(&self.device));
        let out = self.shell.run(&command).await?;
        anyhow::ensure!(
            out.success(),
            "could not read MTU of {} (status {:?})",
            self.describe(),
            out.status
        );
        let text = out.first_line().unwrap_or_default();
        text.parse()
            .with_context(|| format!("unexpected MTU value {text:?} from {}", self.describe()))
    }

    fn restore_hint(&self, mtu: u32) -> String {
        self.shell.user_command(&self.set_command(mtu))
    }
}

/// Finds the name of the interface which carries a given address.
///
/// Returns `Ok(None)` if no interface on that host has the address.
pub async fn detect_interface<S: Shell>(shell: &S, address: IpAddr) -> Result<Option<String>> {
    let out = shell.run("ip -o addr show").await?;
    anyhow::ensure!(
        out.success(),
        "`ip addr` failed on {} (status {:?})",
        shell.name(),
        out.status
    );
    let found = find_device(&out.lines, address);
    trace!("{}: address {address} is on {found:?}", shell.name());
    Ok(found)
}

/// Scans `ip -o addr show` output, e.g.
/// ```text
/// 2: eth0    inet 192.168.1.10/24 brd 192.168.1.255 scope global eth0\       valid_lft forever preferred_lft forever
/// ```
fn find_device(lines: &[String], address: IpAddr) -> Option<String> {
    lines.iter().find_map(|line| {
        let mut words = line.split_whitespace();
        let _index = words.next()?;
        let device = words.next()?;
        let _family = words.next()?;
        let (addr, _prefix) = words.next()?.split_once('/')?;
        let addr: IpAddr = addr.parse().ok()?;
        (addr == address).then(|| {
            // VLAN and similar devices show as `name@parent`
            device.split('@').next().unwrap_or(device).to_string()
        })
    })
}
