//! Throughput measurement
// (c) 2024 Ross Younger
//!
//! A trial needs a listener on the remote host and a client on the local host.
//! The listener is started in the background and left to settle before the client connects;
//! the orchestration lives in [`crate::benchmark`].

mod iperf;
pub use iperf::{parse_report, Iperf};

use anyhow::Result;
use tokio::task::JoinHandle;

/// How traffic flows during a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Duplex {
    /// One direction at a time
    #[strum(to_string = "half-duplex")]
    Half,
    /// Both directions at once
    #[strum(to_string = "full-duplex")]
    Full,
}

/// Which way the data went, from the local host's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    /// Local to remote
    Tx,
    /// Remote to local
    Rx,
}

/// One direction's figures from one trial, in the tool's native units
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurement {
    /// Length of the measured interval
    pub seconds: f64,
    /// Data moved, in KBytes
    pub transferred_kb: f64,
    /// Achieved rate, in Kbits/sec
    pub bandwidth_kbps: f64,
}

/// Everything a single trial produced. A direction is None if the tool did not report it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrialMeasurements {
    /// Local to remote
    pub tx: Option<Measurement>,
    /// Remote to local
    pub rx: Option<Measurement>,
}

impl TrialMeasurements {
    /// Accessor by direction
    #[must_use]
    pub fn get(&self, direction: Direction) -> Option<Measurement> {
        match direction {
            Direction::Tx => self.tx,
            Direction::Rx => self.rx,
        }
    }
}

/// Handle to a background listener task. Dropping it stops the task and kills its local process.
#[derive(Debug, Default)]
pub struct Listener {
    task: Option<JoinHandle<()>>,
}

impl Listener {
    /// Wraps a running task
    #[must_use]
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Has the listener already gone away?
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_some_and(JoinHandle::is_finished)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Runs throughput trials between the two hosts
// Only ever used with concrete types, so Send bounds on the futures don't matter.
#[allow(async_fn_in_trait)]
pub trait Throughput {
    /// Starts the remote listener in the background
    async fn start_listener(&self) -> Result<Listener>;

    /// Kills any listener process on the remote host, whoever started it
    async fn stop_listener(&self) -> Result<()>;

    /// Runs one trial against a listener which must already be up
    async fn run_trial(&self, mode: Duplex) -> Result<TrialMeasurements>;
}
