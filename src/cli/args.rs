// mtubench command-line arguments
// (c) 2024 Ross Younger

use std::net::IpAddr;

use clap::Parser;

use crate::config::Configuration_Optional;

/// Options that switch us into another mode i.e. which don't require address arguments
pub(crate) const MODE_OPTIONS: &[&str] = &["show_config", "config_files"];

#[derive(Debug, Parser, Clone)]
#[command(
    author,
    version(env!("MTUBENCH_VERSION_STRING")),
    about,
    before_help = "e.g.   mtubench 10.0.0.1 10.0.0.2",
    infer_long_args(true)
)]
#[command(help_template(
    "\
{name} version {version}
{about-with-newline}
{usage-heading} {usage}
{before-help}
{all-args}{after-help}
"
))]
#[command(styles = super::styles::CLAP_STYLES)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CliArgs {
    // MODE SELECTION ======================================================================
    /// Outputs the configuration, then exits.
    ///
    /// This shows every setting, its value, and where the value came from.
    #[arg(long, help_heading("Configuration"), display_order(0))]
    pub show_config: bool,

    /// Outputs the paths of the configuration files we read, then exits
    #[arg(long, help_heading("Configuration"), display_order(0))]
    pub config_files: bool,

    // RUN CONTROL =========================================================================
    /// Stops after finding the maximum MTU, without benchmarking
    #[arg(long, action)]
    pub discover_only: bool,

    /// Skips the confirmation prompt
    #[arg(short, long, action)]
    pub yes: bool,

    /// Quiet mode
    ///
    /// Switches off progress display; reports only errors and the results
    #[arg(short, long, action, conflicts_with("debug"))]
    pub quiet: bool,

    // DEBUG ===============================================================================
    /// Enable detailed debug output
    ///
    /// This has the same effect as setting `RUST_LOG=mtubench=trace` in the environment.
    /// If present, `RUST_LOG` overrides this option.
    #[arg(short, long, action, help_heading("Debug"))]
    pub debug: bool,

    /// Prints timing profile data after completion
    #[arg(long, action, help_heading("Debug"))]
    pub profile: bool,

    /// Log to a file
    ///
    /// By default the log receives everything printed to stderr.
    /// To override this behaviour, set the environment variable `RUST_LOG_FILE_DETAIL` (same semantics as `RUST_LOG`).
    #[arg(short('l'), long, action, help_heading("Debug"), value_name("FILE"))]
    pub log_file: Option<String>,

    // CONFIGURABLE OPTIONS ================================================================
    #[command(flatten)]
    pub config: Configuration_Optional,

    // POSITIONAL ARGUMENTS ================================================================
    /// An address on this host, on the link to be tested
    #[arg(
        conflicts_with_all(MODE_OPTIONS),
        required = true,
        value_name = "LOCAL_IP"
    )]
    pub local: Option<IpAddr>,

    /// The remote host's address on the link to be tested.
    ///
    /// We log in here over ssh to change its MTU and run the iperf listener.
    #[arg(
        conflicts_with_all(MODE_OPTIONS),
        required = true,
        value_name = "REMOTE_IP"
    )]
    pub remote: Option<IpAddr>,
}

impl CliArgs {
    /// Both addresses, which clap guarantees unless we are in a mode that doesn't need them
    pub(crate) fn addresses(&self) -> anyhow::Result<(IpAddr, IpAddr)> {
        match (self.local, self.remote) {
            (Some(l), Some(r)) => Ok((l, r)),
            _ => anyhow::bail!("both local and remote addresses must be specified"),
        }
    }

    pub(crate) fn trace_level(&self) -> &'static str {
        if self.debug {
            "trace"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod test {
    use super::CliArgs;
    use clap::{error::ErrorKind, Parser as _};

    #[test]
    fn positional_addresses() {
        let args = CliArgs::try_parse_from(["mtubench", "10.0.0.1", "10.0.0.2"]).unwrap();
        let (l, r) = args.addresses().unwrap();
        assert_eq!(l.to_string(), "10.0.0.1");
        assert_eq!(r.to_string(), "10.0.0.2");
        assert_eq!(args.config.max_mtu, None);
        assert_eq!(args.trace_level(), "info");
    }

    #[test]
    fn config_options() {
        let args = CliArgs::try_parse_from([
            "mtubench",
            "--max-mtu",
            "4000",
            "--step",
            "250",
            "-S",
            "-i",
            "-S",
            "/dev/null",
            "-y",
            "10.0.0.1",
            "10.0.0.2",
        ])
        .unwrap();
        assert_eq!(args.config.max_mtu, Some(4000));
        assert_eq!(args.config.step, Some(250));
        assert_eq!(
            args.config.ssh_options,
            Some(vec!["-i".to_string(), "/dev/null".to_string()])
        );
        assert!(args.yes);
    }

    #[test]
    fn addresses_required() {
        let e = CliArgs::try_parse_from(["mtubench", "10.0.0.1"]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn bad_address() {
        let e = CliArgs::try_parse_from(["mtubench", "10.0.0.1", "not-an-ip"]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn modes_need_no_addresses() {
        let args = CliArgs::try_parse_from(["mtubench", "--show-config"]).unwrap();
        assert!(args.show_config);
        assert!(args.addresses().is_err());
    }

    #[test]
    fn quiet_conflicts_with_debug() {
        let e = CliArgs::try_parse_from(["mtubench", "-q", "-d", "10.0.0.1", "10.0.0.2"])
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::ArgumentConflict);
    }
}
