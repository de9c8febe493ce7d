//! Configuration structure
// (c) 2024 Ross Younger

use std::{net::IpAddr, time::Duration};

use clap::Parser;
use human_repr::HumanDuration as _;
use serde::{Deserialize, Serialize};
use struct_field_names_as_array::FieldNamesAsSlice;

use crate::util::derive_deftly_template_Optionalify;

use derive_deftly::Deftly;

/// An IPv6 header is 20 bytes longer than an IPv4 header without options
pub const IPV6_EXTRA_HEADER: u32 = 20;

/// The set of configurable options supported by mtubench.
///
/// **Note:** `default()` returns the hard-wired configuration defaults.
///
/// The [Optionalify](derive_deftly_template_Optionalify) template derives `Configuration_Optional`,
/// the same struct with every member wrapped in `Option`. The command line parses into that,
/// so values the user did not enter fall through to configuration files and defaults.
///
/// A `Configuration` is immutable once a run starts.
// Maintainer note: None of the members of this struct should be Option<anything>. That leads to strange warts (Some(Some(foo))).
#[derive(Deftly)]
#[derive_deftly(Optionalify)]
#[deftly(visibility = "pub(crate)")]
#[derive(Debug, Clone, PartialEq, Eq, Parser, Deserialize, Serialize, FieldNamesAsSlice)]
pub struct Configuration {
    // SEARCH PARAMETERS ===============================================================================
    /// The baseline MTU, which both interfaces must accept before anything else happens.
    /// Benchmarking starts here. [default: 1500]
    #[arg(long, value_name("bytes"), help_heading("MTU search"), display_order(1))]
    pub min_mtu: u32,

    /// The largest MTU the discovery search will try. [default: 9000]
    #[arg(long, value_name("bytes"), help_heading("MTU search"), display_order(2))]
    pub mtu_ceiling: u32,

    /// Skips discovery and benchmarks up to this MTU instead.
    /// 0 means discover it. [default: 0]
    #[arg(long, value_name("bytes"), help_heading("MTU search"), display_order(3))]
    pub max_mtu: u32,

    /// Bytes of IPv4 and ICMP header which are not part of a ping payload.
    /// 20 more are allowed for automatically when the remote address is IPv6. [default: 28]
    #[arg(long, value_name("bytes"), help_heading("MTU search"))]
    pub icmp_overhead: u32,

    /// How many times to try each candidate MTU before declaring it bad. [default: 3]
    #[arg(long, value_name("n"), help_heading("MTU search"))]
    pub probe_attempts: u8,

    /// Delay between attempts at the same candidate MTU, in milliseconds. [default: 500]
    #[arg(long, value_name("ms"), help_heading("MTU search"))]
    pub retry_delay: u32,

    /// How long to wait for each probe reply, in seconds. [default: 1]
    #[arg(long, value_name("sec"), help_heading("MTU search"))]
    pub probe_timeout: u16,

    // BENCHMARK PARAMETERS ============================================================================
    /// MTU increment between benchmark runs. [default: 500]
    #[arg(long, value_name("bytes"), help_heading("Benchmark"), display_order(10))]
    pub step: u32,

    /// Number of half-duplex and full-duplex trials to average at each MTU. [default: 3]
    #[arg(long, value_name("n"), help_heading("Benchmark"), display_order(11))]
    pub trials: u16,

    /// Length of each throughput trial, in seconds. [default: 10]
    #[arg(long, value_name("sec"), help_heading("Benchmark"))]
    pub trial_duration: u16,

    /// How long to let the remote listener start up before connecting to it, in milliseconds. [default: 1000]
    #[arg(long, value_name("ms"), help_heading("Benchmark"))]
    pub settle_time: u32,

    /// The iperf (version 2) program to run on both hosts [default: `iperf`]
    #[arg(long, value_name("program"), help_heading("Benchmark"))]
    pub iperf: String,

    /// TCP port for the iperf listener [default: 5001]
    #[arg(long, value_name("port"), help_heading("Benchmark"))]
    pub iperf_port: u16,

    // CONNECTION ======================================================================================
    /// Specifies the ssh client program to use [default: `ssh`]
    #[arg(long, help_heading("Connection"))]
    pub ssh: String,

    /// Provides an additional option or argument to pass to the ssh client. [default: none]
    ///
    /// **On the command line** you must repeat `-S` for each argument.
    /// For example, to pass `-i /dev/null` to ssh, specify: `-S -i -S /dev/null`
    ///
    /// **In a configuration file** this field is an array of strings.
    /// For the same example: `ssh_options=["-i", "/dev/null"]`
    #[arg(
        short = 'S',
        action,
        value_name("ssh-option"),
        allow_hyphen_values(true),
        help_heading("Connection")
    )]
    pub ssh_options: Vec<String>,

    /// The account to log in as on the remote host. It must be able to change interface MTUs
    /// without a password. [default: root]
    #[arg(long, value_name("user"), help_heading("Connection"))]
    pub remote_user: String,
}

impl Configuration {
    /// Checks the values for consistency
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.min_mtu <= self.mtu_ceiling,
            "min_mtu ({}) must not exceed mtu_ceiling ({})",
            self.min_mtu,
            self.mtu_ceiling
        );
        anyhow::ensure!(
            self.icmp_overhead < self.min_mtu,
            "icmp_overhead ({}) must be less than min_mtu ({})",
            self.icmp_overhead,
            self.min_mtu
        );
        anyhow::ensure!(self.step > 0, "step must be greater than zero");
        anyhow::ensure!(self.trials > 0, "trials must be greater than zero");
        anyhow::ensure!(
            self.probe_attempts > 0,
            "probe_attempts must be greater than zero"
        );
        Ok(())
    }

    /// Specialises the configuration for a remote address.
    ///
    /// IPv6 probes carry a larger IP header, so less of each packet is payload.
    #[must_use]
    pub fn for_target(&self, target: IpAddr) -> Self {
        let mut config = self.clone();
        if target.is_ipv6() {
            config.icmp_overhead = config.icmp_overhead.saturating_add(IPV6_EXTRA_HEADER);
        }
        config
    }

    /// Fixed maximum MTU, if one was configured
    #[must_use]
    pub fn fixed_max_mtu(&self) -> Option<u32> {
        match self.max_mtu {
            0 => None,
            m => Some(m),
        }
    }

    /// Accessor for `retry_delay`, as a Duration
    #[must_use]
    pub fn retry_delay_duration(&self) -> Duration {
        Duration::from_millis(self.retry_delay.into())
    }

    /// Accessor for `settle_time`, as a Duration
    #[must_use]
    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.settle_time.into())
    }

    /// Accessor for `trial_duration`, as a Duration
    #[must_use]
    pub fn trial_length(&self) -> Duration {
        Duration::from_secs(self.trial_duration.into())
    }

    /// The ssh destination for a given remote address
    #[must_use]
    pub fn ssh_destination(&self, host: &str) -> String {
        if self.remote_user.is_empty() {
            host.to_string()
        } else {
            format!("{}@{host}", self.remote_user)
        }
    }

    /// Formats the run plan for display
    #[must_use]
    pub fn format_plan(&self) -> String {
        let upper = match self.fixed_max_mtu() {
            Some(m) => format!("fixed maximum {m}"),
            None => format!("discovered maximum (search ceiling {})", self.mtu_ceiling),
        };
        let per_mtu = self.trial_length() * 2 * u32::from(self.trials);
        format!(
            "MTU {min} to {upper} in steps of {step}; {trials} trial(s) per duplex mode, about {per_mtu} per MTU",
            min = self.min_mtu,
            step = self.step,
            trials = self.trials,
            per_mtu = per_mtu.human_duration(),
        )
    }
}

impl Default for Configuration {
    /// **(Unusual!)**
    /// Returns mtubench's hard-wired configuration defaults.
    fn default() -> Self {
        Self {
            min_mtu: 1500,
            mtu_ceiling: 9000,
            max_mtu: 0,
            icmp_overhead: 28,
            probe_attempts: 3,
            retry_delay: 500,
            probe_timeout: 1,

            step: 500,
            trials: 3,
            trial_duration: 10,
            settle_time: 1000,
            iperf: "iperf".into(),
            iperf_port: 5001,

            ssh: "ssh".into(),
            ssh_options: vec![],
            remote_user: "root".into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Configuration;
    use assertables::assert_contains;

    #[test]
    fn flattened() {
        let v = Configuration::default();
        let j = serde_json::to_value(&v).unwrap();
        assert!(j.get("min_mtu").is_some());
        assert!(j.get("Configuration").is_none());
    }

    #[test]
    fn defaults_validate() {
        Configuration::default().validate().unwrap();
    }

    #[test]
    fn inverted_bounds_rejected() {
        let c = Configuration {
            min_mtu: 9000,
            mtu_ceiling: 1500,
            ..Default::default()
        };
        assert_contains!(c.validate().unwrap_err().to_string(), "must not exceed");
    }

    #[test]
    fn zero_step_rejected() {
        let c = Configuration {
            step: 0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn fixed_max() {
        assert_eq!(Configuration::default().fixed_max_mtu(), None);
        let c = Configuration {
            max_mtu: 4000,
            ..Default::default()
        };
        assert_eq!(c.fixed_max_mtu(), Some(4000));
    }

    #[test]
    fn overhead_follows_address_family() {
        let c = Configuration::default();
        assert_eq!(c.for_target("10.0.0.2".parse().unwrap()).icmp_overhead, 28);
        let v6 = c.for_target("2001:db8::2".parse().unwrap());
        assert_eq!(v6.icmp_overhead, 48);
        // 1500 byte packet: 40 bytes IPv6, 8 bytes ICMPv6, the rest payload
        assert_eq!(1500 - v6.icmp_overhead, 1452);
        let custom = Configuration {
            icmp_overhead: 30,
            ..c
        };
        assert_eq!(custom.for_target("::1".parse().unwrap()).icmp_overhead, 50);
    }

    #[test]
    fn ssh_destination() {
        let mut c = Configuration::default();
        assert_eq!(c.ssh_destination("10.1.1.2"), "root@10.1.1.2");
        c.remote_user = String::new();
        assert_eq!(c.ssh_destination("10.1.1.2"), "10.1.1.2");
    }
}
