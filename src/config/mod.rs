// (c) 2024 Ross Younger
//! # Configuration management
//!
//! mtubench obtains run-time configuration from the following sources, in order:
//! 1. Command-line options
//! 2. The user's configuration file (`~/.mtubench.toml`)
//! 3. The system-wide configuration file (`/etc/mtubench.toml`)
//! 4. Hard-wired defaults
//!
//! Each option may appear in multiple places, but only the first match is used.
//! To see the files that apply, run `mtubench --config-files`;
//! to see the merged result and where each value came from, run `mtubench --show-config`.
//!
//! ## File format
//!
//! Configuration files are TOML. Keys are the long option names with underscores.
//!
//! ```text
//! # Our switches only go to 9216
//! mtu_ceiling = 9200
//! step = 1000
//! trials = 5
//! ssh_options = ["-i", "/root/.ssh/bench_key"]
//! ```
//!
//! The full list of supported fields is defined by [Configuration].
//! A configuration is fixed for the duration of a run.

mod structure;
pub use structure::Configuration;
pub(crate) use structure::Configuration_Optional;

mod manager;
pub use manager::Manager;

pub(crate) const BASE_CONFIG_FILENAME: &str = "mtubench.toml";
