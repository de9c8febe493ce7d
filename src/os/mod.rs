//! Network interface control
// (c) 2024 Ross Younger
//!
//! mtubench changes interface MTUs with iproute2 (`ip link`) and reads them back from sysfs,
//! so both hosts must be Linux.

mod interface;
pub use interface::{detect_interface, IpLink};

use anyhow::Result;

/// A network interface whose MTU we can change
// Only ever used with concrete types, so Send bounds on the futures don't matter.
#[allow(async_fn_in_trait)]
pub trait Interface {
    /// Short description for messages, e.g. `local eth0`
    fn describe(&self) -> String;

    /// Requests a new MTU, then reads back and returns the value the interface actually has.
    ///
    /// The kernel may refuse the change (for example if the driver does not support jumbo frames);
    /// that is not an error, it shows up as a read-back value differing from the request.
    /// Errors mean we could not talk to the host, or could not make sense of what it said.
    async fn set_mtu(&self, mtu: u32) -> Result<u32>;

    /// Reads the interface's current MTU
    async fn read_mtu(&self) -> Result<u32>;

    /// The command a user would type to put the MTU back to `mtu`
    fn restore_hint(&self, mtu: u32) -> String;
}

static_assertions::assert_cfg!(unix, "This OS is not yet supported");
