// (c) 2024 Ross Younger

//! 🕵️ Troubleshooting
//!
//! ## General
//!
//! The `--debug` option reports every command mtubench runs and what came back.
//!
//! This program also understands the `RUST_LOG` environment variable which might let you probe deeper.
//! Some possible settings for this variable are:
//!
//! * `mtubench=trace` is the same as `--debug`
//! * `mtubench::discovery=trace` shows only the search
//!
//! Use `--log-file` to keep a copy; `RUST_LOG_FILE_DETAIL` sets its level separately.
//!
//! ### You can't ssh to the remote machine
//!
//! That's a prerequisite. mtubench runs ssh in batch mode, so it will not prompt for a password
//! or passphrase; set up key authentication (or an agent) first.
//! Pass extra ssh options with `-S`, or `ssh_options` in a configuration file.
//!
//! ### "no local interface has address" / "no interface on the remote host has address"
//!
//! Each address must be configured on an interface on its host, as shown by `ip addr`.
//! Use the addresses on the link you want to test, not (say) a management network.
//!
//! ### The baseline MTU does not work
//!
//! mtubench could not ping the remote host at the minimum MTU (1500 unless you changed it).
//! Check that the hosts can ping each other at all, and that nothing in between filters ICMP.
//!
//! ### The run stopped with "did not take MTU"
//!
//! An interface which had already accepted an MTU refused it during the benchmark.
//! Something else (a network manager, another user) may be changing interface settings.
//!
//! ### The interfaces were left at the wrong MTU
//!
//! mtubench tries hard to put the original MTUs back and prints the commands to do it yourself
//! if it could not. They look like
//!
//! ```text
//! ip link set dev eth0 mtu 1500
//! ssh root@10.0.0.2 'ip link set dev eth0 mtu 1500'
//! ```
//!
//! ### Throughput figures are zero
//!
//! A zero means iperf did not report that direction. Check that the same major version of iperf (2)
//! is installed on both hosts, and that no firewall blocks the iperf port (5001 by default)
//! in either direction: both duplex modes have the remote host connect back to this one.
