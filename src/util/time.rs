//! Phase timing for `--profile`
// (c) 2024 Ross Younger

use std::{fmt::Display, time::Duration};

use human_repr::HumanDuration as _;
use tokio::time::Instant;

/// One completed (or still running) phase of the run
#[derive(Debug, Clone)]
struct Phase {
    name: &'static str,
    started: Instant,
    finished: Option<Instant>,
}

impl Phase {
    fn elapsed(&self) -> Option<Duration> {
        self.finished.map(|f| f - self.started)
    }
}

/// Records how long each named phase of the run took.
///
/// Starting a phase closes the one before it.
#[derive(Debug, Default, Clone)]
pub struct PhaseTimer {
    phases: Vec<Phase>,
}

impl PhaseTimer {
    /// Closes the current phase (if any) and opens a new one
    pub fn begin(&mut self, name: &'static str) {
        let now = Instant::now();
        self.close_at(now);
        self.phases.push(Phase {
            name,
            started: now,
            finished: None,
        });
    }

    /// Closes the current phase. Further calls to `begin()` are still permitted.
    pub fn finish(&mut self) {
        self.close_at(Instant::now());
    }

    fn close_at(&mut self, now: Instant) {
        if let Some(p) = self.phases.last_mut() {
            if p.finished.is_none() {
                p.finished = Some(now);
            }
        }
    }

    /// Looks up a phase duration by name. Returns None if the phase was never started or has not finished.
    #[must_use]
    pub fn elapsed(&self, name: &str) -> Option<Duration> {
        self.phases
            .iter()
            .find(|p| p.name == name)
            .and_then(Phase::elapsed)
    }
}

impl Display for PhaseTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self.phases.iter().map(|p| p.name.len()).max().unwrap_or(0);
        for p in &self.phases {
            match p.elapsed() {
                Some(t) => writeln!(f, "  {:width$}: {}", p.name, t.human_duration())?,
                None => writeln!(f, "  {:width$}: (running)", p.name)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::PhaseTimer;

    #[test]
    fn phases_chain() {
        let mut t = PhaseTimer::default();
        t.begin("a");
        t.begin("b");
        assert!(t.elapsed("a").is_some());
        assert!(t.elapsed("b").is_none());
        t.finish();
        assert!(t.elapsed("b").is_some());
        assert!(t.elapsed("c").is_none());
        let s = t.to_string();
        assert!(s.contains("  a: "));
        assert!(s.contains("  b: "));
    }

    #[test]
    fn empty_displays_nothing() {
        assert_eq!(PhaseTimer::default().to_string(), "");
    }
}
