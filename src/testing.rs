//! Scripted stand-ins for the host adapters, for unit tests
// (c) 2024 Ross Younger

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use tokio::process::{Child, Command};

use crate::{
    os::Interface,
    probe::Prober,
    remote::{CommandOutput, Shell},
    throughput::{Duplex, Listener, Measurement, Throughput, TrialMeasurements},
};

/// A shell which answers commands from a script and remembers what it was asked.
/// Unscripted commands exit 127.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedShell {
    name: String,
    script: HashMap<String, CommandOutput>,
    history: Arc<Mutex<Vec<String>>>,
}

impl ScriptedShell {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            script: HashMap::new(),
            history: Arc::default(),
        }
    }

    pub(crate) fn on(mut self, command: &str, output: &str, status: i32) -> Self {
        let _ = self.script.insert(
            command.into(),
            CommandOutput {
                lines: output.lines().map(String::from).collect(),
                status: Some(status),
            },
        );
        self
    }

    pub(crate) fn history(&self) -> Vec<String> {
        self.history.lock().unwrap().clone()
    }
}

impl Shell for ScriptedShell {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, command: &str) -> Result<CommandOutput> {
        self.history.lock().unwrap().push(command.into());
        Ok(self.script.get(command).cloned().unwrap_or(CommandOutput {
            lines: vec![],
            status: Some(127),
        }))
    }

    fn spawn(&self, command: &str) -> Result<Child> {
        self.history.lock().unwrap().push(command.into());
        Ok(Command::new("true").kill_on_drop(true).spawn()?)
    }

    fn user_command(&self, command: &str) -> String {
        command.into()
    }
}

/// Shared log of adapter calls, in order, across all fakes in a test
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(crate) fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }
    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

type MtuRule = Box<dyn Fn(u32) -> u32>;

/// An interface which accepts MTUs up to a limit. Logs `set <name> <mtu>`.
pub(crate) struct FakeInterface {
    name: &'static str,
    current: Mutex<u32>,
    /// Maps a requested MTU to the value the interface ends up with
    rule: MtuRule,
    log: CallLog,
}

impl std::fmt::Debug for FakeInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeInterface")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FakeInterface {
    /// Accepts anything up to `limit`; above that, the MTU stays as it was
    pub(crate) fn with_limit(name: &'static str, limit: u32, log: &CallLog) -> Self {
        Self {
            name,
            current: Mutex::new(1500),
            rule: Box::new(move |m| if m <= limit { m } else { 0 }),
            log: log.clone(),
        }
    }

    /// Applies an arbitrary request-to-result rule; a result of 0 means "unchanged"
    pub(crate) fn with_rule(name: &'static str, rule: MtuRule, log: &CallLog) -> Self {
        Self {
            name,
            current: Mutex::new(1500),
            rule,
            log: log.clone(),
        }
    }
}

impl Interface for FakeInterface {
    fn describe(&self) -> String {
        self.name.into()
    }

    async fn set_mtu(&self, mtu: u32) -> Result<u32> {
        self.log.push(format!("set {} {mtu}", self.name));
        let mut current = self.current.lock().unwrap();
        match (self.rule)(mtu) {
            0 => (),
            m => *current = m,
        }
        Ok(*current)
    }

    async fn read_mtu(&self) -> Result<u32> {
        Ok(*self.current.lock().unwrap())
    }

    fn restore_hint(&self, mtu: u32) -> String {
        format!("restore {} {mtu}", self.name)
    }
}

type ProbeRule = Box<dyn Fn(u32, usize) -> bool>;

/// A prober driven by a rule on (payload, call number). Logs `probe <payload>`.
pub(crate) struct FakeProber {
    rule: ProbeRule,
    calls: Mutex<usize>,
    log: CallLog,
}

impl std::fmt::Debug for FakeProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeProber").finish_non_exhaustive()
    }
}

impl FakeProber {
    pub(crate) fn new(rule: ProbeRule, log: &CallLog) -> Self {
        Self {
            rule,
            calls: Mutex::new(0),
            log: log.clone(),
        }
    }

    /// Succeeds for every payload up to `limit`
    pub(crate) fn threshold(limit: u32, log: &CallLog) -> Self {
        Self::new(Box::new(move |p, _| p <= limit), log)
    }
}

impl Prober for FakeProber {
    async fn probe(&self, payload: u32) -> Result<bool> {
        self.log.push(format!("probe {payload}"));
        let n = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        Ok((self.rule)(payload, n))
    }
}

/// Returns scripted trial results in turn, cycling when it runs out.
/// Logs `listen`, `stop` and `trial <mode>`.
#[derive(Debug)]
pub(crate) struct FakeThroughput {
    results: Vec<TrialMeasurements>,
    next: Mutex<usize>,
    /// Trials never finish
    hang: bool,
    log: CallLog,
}

impl FakeThroughput {
    pub(crate) fn new(results: Vec<TrialMeasurements>, log: &CallLog) -> Self {
        Self {
            results,
            next: Mutex::new(0),
            hang: false,
            log: log.clone(),
        }
    }

    /// Every trial starts but none completes
    pub(crate) fn hanging(log: &CallLog) -> Self {
        Self {
            hang: true,
            ..Self::new(vec![], log)
        }
    }

    /// Every trial reports the same rate in both directions
    pub(crate) fn constant(kbps: f64, log: &CallLog) -> Self {
        let m = Measurement {
            seconds: 10.,
            transferred_kb: kbps * 10. / 8.,
            bandwidth_kbps: kbps,
        };
        Self::new(
            vec![TrialMeasurements {
                tx: Some(m),
                rx: Some(m),
            }],
            log,
        )
    }
}

impl Throughput for FakeThroughput {
    async fn start_listener(&self) -> Result<Listener> {
        self.log.push("listen".into());
        Ok(Listener::default())
    }

    async fn stop_listener(&self) -> Result<()> {
        self.log.push("stop".into());
        Ok(())
    }

    async fn run_trial(&self, mode: Duplex) -> Result<TrialMeasurements> {
        self.log.push(format!("trial {mode}"));
        if self.hang {
            return Ok(std::future::pending().await);
        }
        let mut next = self.next.lock().unwrap();
        let r = self.results[*next % self.results.len()];
        *next += 1;
        Ok(r)
    }
}
