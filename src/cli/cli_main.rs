// Main CLI entrypoint
// (c) 2024 Ross Younger

use std::process::ExitCode;

use super::{args::CliArgs, styles};

use crate::{
    config::{Configuration, Manager},
    error::Fatal,
    os::{detect_interface, Interface as _, IpLink},
    probe::Ping,
    remote::{Local, Ssh},
    report,
    session::{RunOutcome, Session},
    throughput::Iperf,
    util::{setup_tracing, time::PhaseTimer},
};
use anstream::{eprintln, println};
use anyhow::Context as _;
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressFinish, ProgressStyle};
use tracing::{error, info};

const SETUP_PHASE: &str = "setup";
const RESTORE_PHASE: &str = "restore";
const REPORT_PHASE: &str = "report";

const PROGRESS_STYLE: &str = "{msg:.dim} {wide_bar:.cyan} {pos}/{len} trials [{elapsed_precise}]";

/// Main CLI entrypoint
pub fn cli() -> anyhow::Result<ExitCode> {
    let args = CliArgs::parse();
    if args.config_files {
        for file in Manager::config_files() {
            println!("{file}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut manager = Manager::new();
    manager.merge_provider(args.config.clone());
    if args.show_config {
        println!("{manager}");
        return Ok(ExitCode::SUCCESS);
    }
    let config = match manager
        .get::<Configuration>()
        .map_err(anyhow::Error::from)
        .and_then(|c| c.validate().map(|()| c))
    {
        Ok(c) => c,
        Err(e) => {
            let style = styles::ERROR;
            eprintln!("{style}ERROR{style:#} {e:#}");
            return Ok(ExitCode::from(Fatal::OTHER_EXIT_CODE));
        }
    };
    run(&args, &config)
}

#[tokio::main(flavor = "current_thread")]
async fn run(args: &CliArgs, config: &Configuration) -> anyhow::Result<ExitCode> {
    let display = MultiProgress::new(); // This writes to stderr
    setup_tracing(args.trace_level(), Some(&display), args.log_file.as_deref())
        .inspect_err(|e| eprintln!("{e:?}"))?;

    let code = match benchmark_main(args, config, &display).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{e:#}");
            Fatal::exit_code_for(&e)
        }
    };
    Ok(ExitCode::from(code))
}

/// Asks the user to go ahead. Anything but yes is no.
async fn confirm(question: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let term = console::Term::stderr();
        term.write_str(&format!("{question} [y/N] "))?;
        let answer = term.read_line()?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    })
    .await?
}

fn progress_bar(display: &MultiProgress, quiet: bool) -> anyhow::Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    Ok(display.add(
        ProgressBar::new(0)
            .with_style(ProgressStyle::with_template(PROGRESS_STYLE)?)
            .with_finish(ProgressFinish::AndClear),
    ))
}

// Caution: As we are using ProgressBar, anything to be printed to console during the run should go through tracing.
async fn benchmark_main(
    args: &CliArgs,
    config: &Configuration,
    display: &MultiProgress,
) -> anyhow::Result<()> {
    let mut timers = PhaseTimer::default();
    timers.begin(SETUP_PHASE);
    let (local_ip, remote_ip) = args.addresses()?;
    let config = &config.for_target(remote_ip);
    config.validate()?;

    let local_shell = Local::default();
    let remote_shell = Ssh::new(config, &remote_ip.to_string());
    let local_device = detect_interface(&local_shell, local_ip)
        .await
        .context("looking for the local interface")?
        .ok_or(Fatal::LocalInterfaceNotFound(local_ip))?;
    let remote_device = detect_interface(&remote_shell, remote_ip)
        .await
        .context("looking for the remote interface")?
        .ok_or(Fatal::RemoteInterfaceNotFound(remote_ip))?;

    let local = IpLink::new(local_shell, &local_device);
    let remote = IpLink::new(remote_shell.clone(), &remote_device);
    let prober = Ping::new(local_shell, remote_ip, config.probe_timeout);
    let iperf = Iperf::new(local_shell, remote_shell, remote_ip, config);

    info!(
        "Testing the link between {} ({local_ip}) and {} ({remote_ip})",
        local.describe(),
        remote.describe()
    );
    info!("{}", config.format_plan());
    if !args.yes
        && !confirm("This will change the MTU of both interfaces. Continue?".into()).await?
    {
        info!("Nothing was changed");
        return Ok(());
    }

    let session = Session::new(config, &local, &remote, &prober, &iperf)
        .with_progress(progress_bar(display, args.quiet)?);
    let original = session.record_original().await?;

    let result = session
        .run_until(args.discover_only, &mut timers, tokio::signal::ctrl_c())
        .await;

    timers.begin(RESTORE_PHASE);
    let unrestored = session.restore(original).await;
    timers.finish();
    if !unrestored.is_empty() {
        error!(
            "Could not put the original MTUs back. To do it by hand, run:\n  {}",
            unrestored.join("\n  ")
        );
    } else if result.is_err() {
        info!(
            "Original MTUs restored. If anything looks wrong, these commands put them back:\n  {}\n  {}",
            remote.restore_hint(original.remote),
            local.restore_hint(original.local)
        );
    }
    display.clear()?;

    let outcome = result?;
    timers.begin(REPORT_PHASE);
    print_outcome(&outcome);
    timers.finish();

    if args.profile {
        info!("Elapsed time by phase:\n{timers}");
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    if let Some(search) = &outcome.search {
        info!(
            "MTU search: {} candidate(s); good {:?}; bad {:?}",
            search.iterations, search.good, search.bad
        );
    }
    println!("Maximum usable MTU: {}", outcome.max_mtu);
    if let Some(results) = &outcome.results {
        report::print(results);
    }
}
