//! mtubench: path MTU discovery and throughput benchmarking between two hosts
// (c) 2024 Ross Younger
//!
//! mtubench finds the largest MTU that two directly-connected Linux hosts can exchange,
//! then runs iperf trials at a ladder of MTUs up to it and charts the results.
//!
//! ## How it works
//!
//! 1. The interfaces carrying the two given addresses are found, on this host directly
//!    and on the remote host over ssh.
//! 2. Discovery ([`discovery`]) bisects between the minimum MTU and a ceiling,
//!    applying each candidate to both interfaces and checking it with a non-fragmenting ping.
//! 3. The benchmark ([`benchmark`]) sets each MTU in turn and runs half- and full-duplex
//!    iperf trials, averaging the results.
//! 4. The report ([`report`]) charts every series against the single best figure.
//! 5. The original MTUs are put back, even on failure or Ctrl-C.
//!
//! Both hosts need iproute2, and iperf version 2. This host also needs iputils `ping`.
//! The remote account must be able to change interface MTUs without a password prompt.
//!
//! See [doc::troubleshooting] if things go wrong.

mod cli;
pub use cli::cli;

#[doc(hidden)]
pub use derive_deftly;

/// Run-time configuration
pub mod config;
pub mod benchmark;
pub mod discovery;
pub mod doc;
pub mod error;
pub mod os;
pub mod probe;
pub mod remote;
pub mod report;
pub mod session;
pub mod throughput;
/// Utilities
pub mod util;

#[cfg(test)]
mod testing;
