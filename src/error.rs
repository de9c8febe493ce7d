//! Errors which end a run
// (c) 2024 Ross Younger

use std::net::IpAddr;

/// A condition which ends the run with a specific exit status.
///
/// Anything else that goes wrong is an `anyhow::Error` and exits with [`Fatal::OTHER_EXIT_CODE`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fatal {
    /// No local interface carries the given address
    #[error("no local interface has address {0}")]
    LocalInterfaceNotFound(IpAddr),
    /// No interface on the remote host carries the given address
    #[error("no interface on the remote host has address {0}")]
    RemoteInterfaceNotFound(IpAddr),
    /// The minimum MTU did not work, so nothing else can be trusted
    #[error("the baseline MTU {mtu} does not work between these hosts; check cabling, addressing and that both hosts can ping each other")]
    BaselineRejected {
        /// The MTU tried
        mtu: u32,
    },
    /// The maximum MTU to benchmark is below the minimum
    #[error("maximum MTU {found} is below the minimum {min}")]
    InvalidMaxMtu {
        /// Discovered or configured maximum
        found: u32,
        /// Configured minimum
        min: u32,
    },
    /// Discovery ran out of iterations
    #[error("MTU discovery did not settle after {0} iterations")]
    NotConverged(u32),
    /// The remote interface did not take an MTU during the benchmark
    #[error("remote interface did not take MTU {requested}: {detail}")]
    RemoteApply {
        /// MTU requested
        requested: u32,
        /// What happened instead
        detail: String,
    },
    /// The local interface did not take an MTU during the benchmark
    #[error("local interface did not take MTU {requested}: {detail}")]
    LocalApply {
        /// MTU requested
        requested: u32,
        /// What happened instead
        detail: String,
    },
    /// Ctrl-C
    #[error("interrupted")]
    Interrupted,
}

impl Fatal {
    /// Exit status for errors which are not a `Fatal`
    pub const OTHER_EXIT_CODE: u8 = 8;

    /// The process exit status for this error
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Fatal::LocalInterfaceNotFound(_) => 1,
            Fatal::BaselineRejected { .. } => 3,
            Fatal::InvalidMaxMtu { .. } | Fatal::NotConverged(_) => 4,
            Fatal::RemoteApply { .. } => 5,
            Fatal::LocalApply { .. } => 6,
            Fatal::RemoteInterfaceNotFound(_) => 7,
            Fatal::Interrupted => 130,
        }
    }

    /// Finds the exit status for any error
    #[must_use]
    pub fn exit_code_for(error: &anyhow::Error) -> u8 {
        error
            .downcast_ref::<Fatal>()
            .map_or(Self::OTHER_EXIT_CODE, Fatal::exit_code)
    }
}
