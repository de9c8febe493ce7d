// iperf2 throughput adapter
// (c) 2024 Ross Younger

use std::{collections::HashMap, net::IpAddr, time::Duration};

use anyhow::Result;
use tracing::{debug, trace, warn};

use super::{Direction, Duplex, Listener, Measurement, Throughput, TrialMeasurements};
use crate::{
    config::Configuration,
    remote::{shell_quote, Shell},
};

/// `pkill` exits 1 when nothing matched
const PKILL_NO_MATCH: i32 = 1;

/// Drives iperf version 2: a server on the remote host, a client on the local host.
///
/// Half-duplex trials use the client's `-r` (tradeoff) mode, full-duplex trials use `-d` (dual).
/// In both modes the remote connects back to the client for the reverse direction.
///
/// The iperf2 server does not reliably let go of its listening socket between runs,
/// so [`stop_listener`](Throughput::stop_listener) kills it by name.
#[derive(Debug, Clone)]
pub struct Iperf<L: Shell, R: Shell> {
    local: L,
    remote: R,
    remote_addr: IpAddr,
    program: String,
    port: u16,
    duration: Duration,
}

impl<L: Shell, R: Shell> Iperf<L, R> {
    /// Constructor
    pub fn new(local: L, remote: R, remote_addr: IpAddr, config: &Configuration) -> Self {
        Self {
            local,
            remote,
            remote_addr,
            program: config.iperf.clone(),
            port: config.iperf_port,
            duration: config.trial_length(),
        }
    }

    fn program_name(&self) -> &str {
        self.program.rsplit('/').next().unwrap_or(&self.program)
    }

    /// iperf2 only speaks IPv6 when asked to
    fn family_flag(&self) -> &'static str {
        if self.remote_addr.is_ipv6() {
            " -V"
        } else {
            ""
        }
    }

    fn server_command(&self) -> String {
        format!(
            "{}{} -s -f k -p {}",
            shell_quote(&self.program),
            self.family_flag(),
            self.port
        )
    }

    fn client_command(&self, mode: Duplex) -> String {
        let flag = match mode {
            Duplex::Half => "-r",
            Duplex::Full => "-d",
        };
        format!(
            "{}{} -c {} -p {port} -L {port} -f k -t {} {flag}",
            shell_quote(&self.program),
            self.family_flag(),
            self.remote_addr,
            self.duration.as_secs().max(1),
            port = self.port,
        )
    }
}

impl<L: Shell, R: Shell> Throughput for Iperf<L, R> {
    async fn start_listener(&self) -> Result<Listener> {
        let mut child = self.remote.spawn(&self.server_command())?;
        let name = self.remote.name().to_string();
        let task = tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("iperf listener on {name} exited: {status}"),
                Err(e) => warn!("iperf listener on {name}: {e}"),
            }
        });
        Ok(Listener::new(task))
    }

    async fn stop_listener(&self) -> Result<()> {
        let command = format!("pkill -x {}", shell_quote(self.program_name()));
        let out = self.remote.run(&command).await?;
        match out.status {
            Some(0) => trace!("killed iperf on {}", self.remote.name()),
            Some(PKILL_NO_MATCH) => (),
            other => warn!(
                "could not stop iperf on {} (status {other:?})",
                self.remote.name()
            ),
        }
        Ok(())
    }

    async fn run_trial(&self, mode: Duplex) -> Result<TrialMeasurements> {
        let out = self.local.run(&self.client_command(mode)).await?;
        if !out.success() {
            warn!("iperf client exited with status {:?}", out.status);
        }
        Ok(parse_report(&out.lines, self.port))
    }
}

/// Identifies the stream on an iperf2 connection line.
///
/// `[  5] local 10.0.0.1 port 43210 connected with 10.0.0.2 port 5001`
/// is outbound, because the far end is on the server port.
/// The reverse connection arrives at our own listener on the server port.
fn parse_connection(rest: &str, server_port: u16) -> Option<Direction> {
    let words: Vec<&str> = rest.split_whitespace().collect();
    match words.as_slice() {
        ["local", _, "port", local_port, "connected", "with", _, "port", remote_port, ..] => {
            let local_port: u16 = local_port.parse().ok()?;
            let remote_port: u16 = remote_port.parse().ok()?;
            if remote_port == server_port {
                Some(Direction::Tx)
            } else if local_port == server_port {
                Some(Direction::Rx)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Parses an iperf2 interval report line (after the stream ID), when run with `-f k`:
///
/// `0.0-10.0 sec  1126528 KBytes  922535 Kbits/sec`
fn parse_interval(rest: &str) -> Option<Measurement> {
    // short intervals are padded: `0.0- 1.0 sec`
    let rest = rest.replace("- ", "-");
    let words: Vec<&str> = rest.split_whitespace().collect();
    match words.as_slice() {
        [interval, "sec", transfer, "KBytes", rate, "Kbits/sec", ..] => {
            let (start, end) = interval.split_once('-')?;
            let start: f64 = start.parse().ok()?;
            let end: f64 = end.parse().ok()?;
            Some(Measurement {
                seconds: end - start,
                transferred_kb: transfer.parse().ok()?,
                bandwidth_kbps: rate.parse().ok()?,
            })
        }
        _ => None,
    }
}

/// Extracts per-direction figures from the client's output.
///
/// Lines which do not parse are skipped. A direction whose report is missing is left as None.
/// Where a stream reports more than one interval, the last one (the summary) wins.
#[must_use]
pub fn parse_report(lines: &[String], server_port: u16) -> TrialMeasurements {
    let mut streams = HashMap::<u32, Direction>::new();
    let mut result = TrialMeasurements::default();

    for line in lines {
        let Some((id, rest)) = line
            .trim_start()
            .strip_prefix('[')
            .and_then(|l| l.split_once(']'))
        else {
            continue;
        };
        // skips the "[ ID]" heading and "[SUM]" lines
        let Ok(id) = id.trim().parse::<u32>() else {
            continue;
        };
        if let Some(direction) = parse_connection(rest, server_port) {
            let _ = streams.insert(id, direction);
        } else if let Some(m) = parse_interval(rest) {
            match streams.get(&id) {
                Some(Direction::Tx) => result.tx = Some(m),
                Some(Direction::Rx) => result.rx = Some(m),
                None => trace!("report for unknown stream {id}: {line}"),
            }
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::{parse_report, Iperf};
    use crate::{
        config::Configuration,
        testing::ScriptedShell,
        throughput::{Duplex, Measurement, Throughput as _},
    };

    const DUAL: &str = r"------------------------------------------------------------
Server listening on TCP port 5001
TCP window size: 85.3 KByte (default)
------------------------------------------------------------
------------------------------------------------------------
Client connecting to 10.0.0.2, TCP port 5001
TCP window size:  289 KByte (default)
------------------------------------------------------------
[  3] local 10.0.0.1 port 43210 connected with 10.0.0.2 port 5001
[  5] local 10.0.0.1 port 5001 connected with 10.0.0.2 port 51234
[ ID] Interval       Transfer     Bandwidth
[  3]  0.0-10.0 sec  1126528 KBytes  922535 Kbits/sec
[  5]  0.0-10.1 sec  1024000 KBytes  830566 Kbits/sec
[SUM]  0.0-10.1 sec  2150528 KBytes  1753101 Kbits/sec";

    const TRADEOFF: &str = r"------------------------------------------------------------
Server listening on TCP port 5001
TCP window size: 85.3 KByte (default)
------------------------------------------------------------
------------------------------------------------------------
Client connecting to 2001:db8::2, TCP port 5001
TCP window size:  289 KByte (default)
------------------------------------------------------------
[  3] local 2001:db8::1 port 43210 connected with 2001:db8::2 port 5001
[ ID] Interval       Transfer     Bandwidth
[  3]  0.0-10.0 sec  1126528 KBytes  922535 Kbits/sec
[  4] local 2001:db8::1 port 5001 connected with 2001:db8::2 port 51234
[  4]  0.0-10.0 sec  1100000 KBytes  880000 Kbits/sec";

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(String::from).collect()
    }

    #[test]
    fn dual_report() {
        let r = parse_report(&lines(DUAL), 5001);
        assert_eq!(
            r.tx,
            Some(Measurement {
                seconds: 10.0,
                transferred_kb: 1_126_528.0,
                bandwidth_kbps: 922_535.0,
            })
        );
        let rx = r.rx.unwrap();
        assert!((rx.seconds - 10.1).abs() < 1e-9);
        assert!((rx.bandwidth_kbps - 830_566.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tradeoff_report() {
        // one direction after the other, each with its own stream
        let r = parse_report(&lines(TRADEOFF), 5001);
        assert!((r.tx.unwrap().bandwidth_kbps - 922_535.0).abs() < f64::EPSILON);
        let rx = r.rx.unwrap();
        assert!((rx.bandwidth_kbps - 880_000.0).abs() < f64::EPSILON);
        assert!((rx.transferred_kb - 1_100_000.0).abs() < f64::EPSILON);
        assert!((rx.seconds - 10.0).abs() < 1e-9);
    }

    #[test]
    fn missing_direction_is_none() {
        let text = "[  3] local 10.0.0.1 port 43210 connected with 10.0.0.2 port 5001\n\
                    [  3]  0.0-10.0 sec  1126528 KBytes  922535 Kbits/sec\n\
                    connect failed: Connection refused";
        let r = parse_report(&lines(text), 5001);
        assert!(r.tx.is_some());
        assert!(r.rx.is_none());
    }

    #[test]
    fn garbage_is_empty() {
        let r = parse_report(&lines("[  3] something odd\n[ x] 1-2 sec\n\nhello"), 5001);
        assert!(r.tx.is_none());
        assert!(r.rx.is_none());
    }

    #[test]
    fn last_interval_wins() {
        let text = "[  4] local 10.0.0.1 port 40000 connected with 10.0.0.2 port 6000\n\
                    [  4]  0.0- 1.0 sec  1000 KBytes  8192 Kbits/sec\n\
                    [  4]  0.0-10.0 sec  20000 KBytes  16384 Kbits/sec";
        let r = parse_report(&lines(text), 6000);
        assert!((r.tx.unwrap().bandwidth_kbps - 16384.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn commands() {
        let local = ScriptedShell::new("local").on(
            "iperf -c 10.0.0.2 -p 5001 -L 5001 -f k -t 10 -d",
            DUAL,
            0,
        );
        let remote = ScriptedShell::new("root@10.0.0.2").on("pkill -x iperf", "", 1);
        let iperf = Iperf::new(
            local.clone(),
            remote.clone(),
            "10.0.0.2".parse().unwrap(),
            &Configuration::default(),
        );
        let r = iperf.run_trial(Duplex::Full).await.unwrap();
        assert!(r.tx.is_some() && r.rx.is_some());
        iperf.stop_listener().await.unwrap();
        assert_eq!(remote.history(), vec!["pkill -x iperf"]);
    }

    #[tokio::test]
    async fn half_duplex_over_ipv6() {
        let local = ScriptedShell::new("local").on(
            "iperf -V -c 2001:db8::2 -p 5201 -L 5201 -f k -t 5 -r",
            &TRADEOFF.replace("5001", "5201"),
            0,
        );
        let remote = ScriptedShell::new("root@2001:db8::2");
        let config = Configuration {
            iperf_port: 5201,
            trial_duration: 5,
            ..Default::default()
        };
        let iperf = Iperf::new(
            local.clone(),
            remote.clone(),
            "2001:db8::2".parse().unwrap(),
            &config,
        );
        let r = iperf.run_trial(Duplex::Half).await.unwrap();
        assert!(r.tx.is_some() && r.rx.is_some());
        let _listener = iperf.start_listener().await.unwrap();
        assert_eq!(remote.history(), vec!["iperf -V -s -f k -p 5201"]);
    }
}
