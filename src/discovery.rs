//! Path MTU discovery
// (c) 2024 Ross Younger
//!
//! The search is a bisection over `[min_mtu, mtu_ceiling]`, in 100-byte steps.
//! Each candidate is applied to both interfaces (remote first) and then checked with a
//! full-size, non-fragmenting probe. A candidate is only declared bad after every
//! configured attempt at it has failed, so occasional packet loss does not drag the
//! result down.
//!
//! The step size halves on every iteration whatever the outcome, so the search settles
//! within about `log2(mtu_ceiling - min_mtu)` iterations. Once the step drops below 50 bytes
//! the rounded candidate repeats, which ends the search.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::{
    config::Configuration, error::Fatal, os::Interface, probe::Prober, util::round_to_hundred,
};

/// Hard limit on search iterations. Halving means we never get near it.
pub const MAX_ITERATIONS: u32 = 1000;

/// The result of one attempt at a candidate MTU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// The MTU that was applied
    pub requested_mtu: u32,
    /// Whether both interfaces took it and the probe came back
    pub accepted: bool,
}

/// Mutable state of a single search. Created and discarded by [`MtuDiscoverer::discover`].
#[derive(Debug, Clone)]
struct SearchState {
    min_mtu: u32,
    ceiling: u32,
    /// Largest candidate known good so far
    low_bound: u32,
    /// Smallest candidate known bad so far
    high_bound: u32,
    candidate: u32,
    /// Initial search span; step `i` moves by `difference / 2^i`
    difference: f64,
    iteration: u32,
    /// Never decreases
    confirmed_good_mtu: u32,
    consecutive_transient_failures: u8,
    visited: BTreeSet<u32>,
    good: BTreeSet<u32>,
    bad: BTreeSet<u32>,
}

impl SearchState {
    fn new(min_mtu: u32, ceiling: u32) -> Self {
        Self {
            min_mtu,
            ceiling,
            low_bound: min_mtu,
            high_bound: ceiling,
            candidate: round_to_hundred(f64::from(ceiling)).clamp(min_mtu, ceiling),
            difference: f64::from(ceiling - min_mtu),
            iteration: 1,
            confirmed_good_mtu: min_mtu,
            consecutive_transient_failures: 0,
            visited: BTreeSet::new(),
            good: BTreeSet::new(),
            bad: BTreeSet::new(),
        }
    }

    /// Marks the current candidate visited. Returns false if it already was.
    fn visit(&mut self) -> bool {
        self.visited.insert(self.candidate)
    }

    fn confirm_good(&mut self, mtu: u32) {
        let _ = self.good.insert(mtu);
        self.low_bound = self.low_bound.max(mtu);
        self.confirmed_good_mtu = self.confirmed_good_mtu.max(mtu);
    }

    fn confirm_bad(&mut self, mtu: u32) {
        let _ = self.bad.insert(mtu);
        self.high_bound = self.high_bound.min(mtu);
    }

    /// Moves the candidate up (after a success) or down (after a failure) by this iteration's step
    fn advance(&mut self, accepted: bool) {
        let exponent = i32::try_from(self.iteration).unwrap_or(i32::MAX);
        let delta = self.difference / 2_f64.powi(exponent);
        let next = if accepted {
            f64::from(self.candidate) + delta
        } else {
            f64::from(self.candidate) - delta
        };
        self.candidate = round_to_hundred(next).clamp(self.min_mtu, self.ceiling);
        self.iteration += 1;
    }

    fn report(self, iterations: u32) -> SearchReport {
        SearchReport {
            confirmed_good_mtu: self.confirmed_good_mtu,
            iterations,
            good: self.good,
            bad: self.bad,
        }
    }
}

/// What a completed search found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReport {
    /// The largest MTU that both interfaces accepted and a probe confirmed.
    /// This is `min_mtu` if nothing above it worked.
    pub confirmed_good_mtu: u32,
    /// Number of candidates tried (not counting the baseline or retries)
    pub iterations: u32,
    /// Candidates confirmed good
    pub good: BTreeSet<u32>,
    /// Candidates confirmed bad
    pub bad: BTreeSet<u32>,
}

/// Finds the largest MTU two hosts can use
#[derive(Debug)]
pub struct MtuDiscoverer<'a, L, R, P> {
    config: &'a Configuration,
    local: &'a L,
    remote: &'a R,
    prober: &'a P,
}

impl<'a, L: Interface, R: Interface, P: Prober> MtuDiscoverer<'a, L, R, P> {
    /// Constructor
    pub fn new(config: &'a Configuration, local: &'a L, remote: &'a R, prober: &'a P) -> Self {
        Self {
            config,
            local,
            remote,
            prober,
        }
    }

    /// Runs the search.
    ///
    /// Fails with [`Fatal::BaselineRejected`] if `min_mtu` itself does not work,
    /// or [`Fatal::NotConverged`] if the search runs away.
    /// Interface and probe failures during the search are not errors; they steer it.
    pub async fn discover(&self) -> Result<SearchReport, Fatal> {
        let min = self.config.min_mtu;
        let ceiling = self.config.mtu_ceiling;
        let mut state = SearchState::new(min, ceiling);

        info!("Checking baseline MTU {min}");
        let baseline = self.try_candidate(&mut state, min).await;
        if !baseline.accepted {
            return Err(Fatal::BaselineRejected { mtu: min });
        }
        info!("Searching for the largest usable MTU up to {ceiling}");

        for iterations in 1..=MAX_ITERATIONS {
            if !state.visit() {
                debug!("candidate {} repeated; search complete", state.candidate);
                return Ok(state.report(iterations - 1));
            }
            let candidate = state.candidate;
            let outcome = self.try_candidate(&mut state, candidate).await;

            if outcome.accepted {
                info!("MTU {candidate} works");
                state.confirm_good(candidate);
                if iterations == 1 {
                    // The ceiling works; nothing to narrow down
                    return Ok(state.report(iterations));
                }
            } else {
                info!("MTU {candidate} does not work");
                state.confirm_bad(candidate);
            }
            state.advance(outcome.accepted);
            debug!(
                "known good {}, known bad {}, next candidate {}",
                state.low_bound, state.high_bound, state.candidate
            );
        }
        Err(Fatal::NotConverged(MAX_ITERATIONS))
    }

    /// Tries a candidate until it works or the attempts run out.
    /// Each attempt is the full apply-then-probe sequence.
    async fn try_candidate(&self, state: &mut SearchState, mtu: u32) -> ProbeOutcome {
        let attempts = self.config.probe_attempts.max(1);
        loop {
            let outcome = self.attempt(mtu).await;
            if outcome.accepted {
                state.consecutive_transient_failures = 0;
                return outcome;
            }
            state.consecutive_transient_failures += 1;
            if state.consecutive_transient_failures >= attempts {
                state.consecutive_transient_failures = 0;
                return outcome;
            }
            debug!(
                "MTU {mtu} attempt {} of {attempts} failed; retrying",
                state.consecutive_transient_failures
            );
            tokio::time::sleep(self.config.retry_delay_duration()).await;
        }
    }

    async fn attempt(&self, mtu: u32) -> ProbeOutcome {
        let accepted = apply(self.remote, mtu).await && apply(self.local, mtu).await && {
            let payload = mtu.saturating_sub(self.config.icmp_overhead);
            match self.prober.probe(payload).await {
                Ok(ok) => ok,
                Err(e) => {
                    warn!("probe failed to run: {e:#}");
                    false
                }
            }
        };
        debug!("MTU {mtu}: {}", if accepted { "ok" } else { "failed" });
        ProbeOutcome {
            requested_mtu: mtu,
            accepted,
        }
    }
}

/// Sets an MTU, reporting whether the interface really took it
async fn apply<I: Interface>(iface: &I, mtu: u32) -> bool {
    match iface.set_mtu(mtu).await {
        Ok(actual) if actual == mtu => true,
        Ok(actual) => {
            debug!("{} refused MTU {mtu} (has {actual})", iface.describe());
            false
        }
        Err(e) => {
            warn!("{}: could not set MTU {mtu}: {e:#}", iface.describe());
            false
        }
    }
}
