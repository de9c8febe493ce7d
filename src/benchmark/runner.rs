// Benchmark orchestration
// (c) 2024 Ross Younger

use anyhow::Result;
use indicatif::ProgressBar;
use strum::IntoEnumIterator as _;
use tracing::{debug, info, warn};

use super::{mtu_sequence, MtuBenchmarkRecord, ResultTable, TrialResult};
use crate::{
    config::Configuration,
    error::Fatal,
    os::Interface,
    throughput::{Duplex, Throughput, TrialMeasurements},
};

/// Runs throughput trials at each MTU in turn and collects the averages.
///
/// Trials never overlap: the link under test is the thing being measured.
#[derive(Debug)]
pub struct BenchmarkRunner<'a, L, R, T> {
    config: &'a Configuration,
    local: &'a L,
    remote: &'a R,
    throughput: &'a T,
    progress: ProgressBar,
}

impl<'a, L: Interface, R: Interface, T: Throughput> BenchmarkRunner<'a, L, R, T> {
    /// Constructor. Progress is not shown unless [`with_progress`](Self::with_progress) is called.
    pub fn new(config: &'a Configuration, local: &'a L, remote: &'a R, throughput: &'a T) -> Self {
        Self {
            config,
            local,
            remote,
            throughput,
            progress: ProgressBar::hidden(),
        }
    }

    /// Reports progress (one tick per trial) to the given bar
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Benchmarks every MTU from `min_mtu` to `max_mtu` inclusive.
    ///
    /// An interface which does not take a requested MTU is fatal: the MTU was already known
    /// to work, so something else has changed the hosts under us.
    pub async fn run(&self, max_mtu: u32) -> Result<ResultTable> {
        let min = self.config.min_mtu;
        if max_mtu < min {
            return Err(Fatal::InvalidMaxMtu {
                found: max_mtu,
                min,
            }
            .into());
        }
        let mtus = mtu_sequence(min, max_mtu, self.config.step);
        let trials = self.config.trials;
        let trials_per_mtu = u64::from(trials) * Duplex::iter().len() as u64;
        self.progress.set_length(mtus.len() as u64 * trials_per_mtu);
        info!(
            "Benchmarking {} MTU(s): {}",
            mtus.len(),
            mtus.iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut table = ResultTable::default();
        for mtu in mtus {
            self.apply(mtu).await?;
            let mut record = MtuBenchmarkRecord::new(mtu, trials);
            for n in 1..=trials {
                for duplex in Duplex::iter() {
                    self.progress
                        .set_message(format!("MTU {mtu} {duplex} trial {n}/{trials}"));
                    let measurements = self.trial(duplex).await?;
                    for result in TrialResult::from_trial(duplex, &measurements) {
                        debug!(
                            "MTU {mtu} {duplex} {}: {:.0} Kbits/sec",
                            result.direction, result.bandwidth_kbps
                        );
                        record.add(&result);
                    }
                    self.progress.inc(1);
                }
            }
            let result = record.finalize();
            info!(
                "MTU {mtu}: {}",
                result
                    .avg_mbps
                    .series()
                    .map(|(d, r, v)| format!("{d} {r} {v} Mbits/sec"))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            table.push(result);
        }
        self.progress.finish_with_message("Benchmark complete");
        Ok(table)
    }

    /// Applies an MTU, remote first
    async fn apply(&self, mtu: u32) -> Result<()> {
        info!("Setting MTU {mtu}");
        if let Some(detail) = check_apply(self.remote, mtu).await {
            return Err(Fatal::RemoteApply {
                requested: mtu,
                detail,
            }
            .into());
        }
        if let Some(detail) = check_apply(self.local, mtu).await {
            return Err(Fatal::LocalApply {
                requested: mtu,
                detail,
            }
            .into());
        }
        Ok(())
    }

    /// One trial, with a fresh listener.
    ///
    /// Any leftover listener is killed before starting and after finishing,
    /// even if the trial itself failed.
    async fn trial(&self, duplex: Duplex) -> Result<TrialMeasurements> {
        self.throughput.stop_listener().await?;
        let listener = self.throughput.start_listener().await?;
        tokio::time::sleep(self.config.settle_duration()).await;
        if listener.is_finished() {
            warn!("the remote listener exited before the {duplex} trial started");
        }
        let result = self.throughput.run_trial(duplex).await;
        drop(listener);
        self.throughput.stop_listener().await?;
        result
    }
}

/// Sets an MTU. Returns a description of what went wrong, if anything did.
async fn check_apply<I: Interface>(iface: &I, mtu: u32) -> Option<String> {
    match iface.set_mtu(mtu).await {
        Ok(actual) if actual == mtu => None,
        Ok(actual) => Some(format!("{} reads back {actual}", iface.describe())),
        Err(e) => Some(format!("{}: {e:#}", iface.describe())),
    }
}
