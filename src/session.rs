//! A complete run: find the maximum MTU, benchmark up to it, put things back
// (c) 2024 Ross Younger

use std::future::Future;

use anyhow::{Context as _, Result};
use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::{
    benchmark::{BenchmarkRunner, ResultTable},
    config::Configuration,
    discovery::{MtuDiscoverer, SearchReport},
    error::Fatal,
    os::Interface,
    probe::Prober,
    throughput::Throughput,
    util::time::PhaseTimer,
};

/// Phase names, for `--profile`
pub(crate) const DISCOVERY_PHASE: &str = "discovery";
pub(crate) const BENCHMARK_PHASE: &str = "benchmark";

/// Interface MTUs as they were before the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalMtus {
    /// Local interface
    pub local: u32,
    /// Remote interface
    pub remote: u32,
}

/// What a run found
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// The largest MTU benchmarked (or that would have been)
    pub max_mtu: u32,
    /// Details of the search, if there was one
    pub search: Option<SearchReport>,
    /// Benchmark results, unless we stopped after discovery
    pub results: Option<ResultTable>,
}

/// Ties the adapters for one pair of hosts to a configuration
#[derive(Debug)]
pub struct Session<'a, L, R, P, T> {
    config: &'a Configuration,
    local: &'a L,
    remote: &'a R,
    prober: &'a P,
    throughput: &'a T,
    progress: ProgressBar,
}

impl<'a, L, R, P, T> Session<'a, L, R, P, T>
where
    L: Interface,
    R: Interface,
    P: Prober,
    T: Throughput,
{
    /// Constructor
    pub fn new(
        config: &'a Configuration,
        local: &'a L,
        remote: &'a R,
        prober: &'a P,
        throughput: &'a T,
    ) -> Self {
        Self {
            config,
            local,
            remote,
            prober,
            throughput,
            progress: ProgressBar::hidden(),
        }
    }

    /// Sets the progress bar handed to the benchmark
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Reads both MTUs so they can be put back afterwards
    pub async fn record_original(&self) -> Result<OriginalMtus> {
        let remote = self
            .remote
            .read_mtu()
            .await
            .with_context(|| format!("reading MTU of {}", self.remote.describe()))?;
        let local = self
            .local
            .read_mtu()
            .await
            .with_context(|| format!("reading MTU of {}", self.local.describe()))?;
        info!(
            "Current MTUs: {} {remote}, {} {local}",
            self.remote.describe(),
            self.local.describe()
        );
        Ok(OriginalMtus { local, remote })
    }

    /// Discovers the maximum MTU, or checks the configured one
    pub async fn max_mtu(&self) -> Result<(u32, Option<SearchReport>)> {
        let (mtu, search) = if let Some(fixed) = self.config.fixed_max_mtu() {
            info!("Using configured maximum MTU {fixed}");
            self.check_fixed(fixed).await;
            (fixed, None)
        } else {
            let report = MtuDiscoverer::new(self.config, self.local, self.remote, self.prober)
                .discover()
                .await?;
            info!(
                "Maximum usable MTU is {} (found in {} iterations)",
                report.confirmed_good_mtu, report.iterations
            );
            (report.confirmed_good_mtu, Some(report))
        };
        if mtu < self.config.min_mtu {
            return Err(Fatal::InvalidMaxMtu {
                found: mtu,
                min: self.config.min_mtu,
            }
            .into());
        }
        Ok((mtu, search))
    }

    /// A configured maximum gets one probe. Failure is reported but does not stop the run.
    async fn check_fixed(&self, mtu: u32) {
        let mut problems = Vec::new();
        for (iface, actual) in [
            (self.remote.describe(), self.remote.set_mtu(mtu).await),
            (self.local.describe(), self.local.set_mtu(mtu).await),
        ] {
            match actual {
                Ok(m) if m == mtu => (),
                Ok(m) => problems.push(format!("{iface} reads back {m}")),
                Err(e) => problems.push(format!("{iface}: {e:#}")),
            }
        }
        if problems.is_empty() {
            let payload = mtu.saturating_sub(self.config.icmp_overhead);
            match self.prober.probe(payload).await {
                Ok(true) => (),
                Ok(false) => problems.push("probe was not answered".into()),
                Err(e) => problems.push(format!("probe failed: {e:#}")),
            }
        }
        if !problems.is_empty() {
            warn!(
                "Configured maximum MTU {mtu} did not check out ({}); continuing anyway",
                problems.join("; ")
            );
        }
    }

    /// Runs discovery and, unless `discover_only`, the benchmark
    pub async fn run(&self, discover_only: bool, timers: &mut PhaseTimer) -> Result<RunOutcome> {
        timers.begin(DISCOVERY_PHASE);
        let (max_mtu, search) = self.max_mtu().await?;
        if discover_only {
            timers.finish();
            return Ok(RunOutcome {
                max_mtu,
                search,
                results: None,
            });
        }
        timers.begin(BENCHMARK_PHASE);
        let results =
            BenchmarkRunner::new(self.config, self.local, self.remote, self.throughput)
                .with_progress(self.progress.clone())
                .run(max_mtu)
                .await?;
        timers.finish();
        Ok(RunOutcome {
            max_mtu,
            search,
            results: Some(results),
        })
    }

    /// As [`run`](Self::run), but gives up with [`Fatal::Interrupted`] if `interrupt` completes first.
    ///
    /// Whatever was in flight is dropped, including any listener handle; follow up with
    /// [`restore`](Self::restore) to kill the remote listener and put the MTUs back.
    pub async fn run_until<F: Future>(
        &self,
        discover_only: bool,
        timers: &mut PhaseTimer,
        interrupt: F,
    ) -> Result<RunOutcome> {
        tokio::select! {
            r = self.run(discover_only, timers) => r,
            _ = interrupt => {
                warn!("Interrupted; cleaning up");
                Err(Fatal::Interrupted.into())
            }
        }
    }

    /// Kills any listener and puts the MTUs back, remote first.
    ///
    /// Best effort: returns the commands the user needs to run to finish the job, if any.
    pub async fn restore(&self, original: OriginalMtus) -> Vec<String> {
        if let Err(e) = self.throughput.stop_listener().await {
            warn!("could not stop the remote listener: {e:#}");
        }
        let mut remediation = Vec::new();
        if !restore_one(self.remote, original.remote).await {
            remediation.push(self.remote.restore_hint(original.remote));
        }
        if !restore_one(self.local, original.local).await {
            remediation.push(self.local.restore_hint(original.local));
        }
        remediation
    }
}

async fn restore_one<I: Interface>(iface: &I, mtu: u32) -> bool {
    match iface.set_mtu(mtu).await {
        Ok(m) if m == mtu => {
            info!("Restored {} to MTU {mtu}", iface.describe());
            true
        }
        Ok(m) => {
            warn!("{} did not go back to MTU {mtu} (has {m})", iface.describe());
            false
        }
        Err(e) => {
            warn!("could not restore {}: {e:#}", iface.describe());
            false
        }
    }
}
