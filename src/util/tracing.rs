//! Tracing helpers
// (c) 2024 Ross Younger

use std::{
    fs::File,
    io::Write,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use indicatif::MultiProgress;
use tracing_subscriber::{fmt, fmt::time::ChronoLocal, prelude::*, EnvFilter, Layer};

const STANDARD_ENV_VAR: &str = "RUST_LOG";
const LOG_FILE_DETAIL_ENV_VAR: &str = "RUST_LOG_FILE_DETAIL";

struct FilterResult {
    filter: EnvFilter,
    /// Whether the filter came from the environment
    used_env: bool,
}

/// Uses the given environment variable if set; otherwise logs only mtubench events at `trace_level`.
fn filter_for(trace_level: &str, key: &str) -> anyhow::Result<FilterResult> {
    EnvFilter::try_from_env(key)
        .map(|filter| FilterResult {
            filter,
            used_env: true,
        })
        .or_else(|e| {
            if std::env::var(key).is_ok() {
                anyhow::bail!("{key} (set in environment) was invalid: {e}");
            }
            Ok(FilterResult {
                filter: EnvFilter::new(format!("mtubench={trace_level}")),
                used_env: false,
            })
        })
}

/// Sets up tracing to the console (through the `MultiProgress`, if there is one) and optionally to a file.
///
/// `RUST_LOG` overrides the level we were given.
/// The file log honours `RUST_LOG_FILE_DETAIL` if set, otherwise it follows the console filter.
///
/// **CAUTION:** If this fails, tracing is not set up; the caller must report the error itself.
pub fn setup(
    trace_level: &str,
    display: Option<&MultiProgress>,
    filename: Option<&str>,
) -> anyhow::Result<()> {
    let mut layers = Vec::new();

    let filter = filter_for(trace_level, STANDARD_ENV_VAR)?;
    // Targets are only interesting when the user asked for other crates' events.
    let format = fmt::layer().compact().with_target(filter.used_env);

    match display {
        None => {
            layers.push(
                format
                    .with_writer(std::io::stderr)
                    .with_filter(filter.filter)
                    .boxed(),
            );
        }
        Some(mp) => {
            layers.push(
                format
                    .with_writer(ProgressWriter::wrap(mp))
                    .with_filter(filter.filter)
                    .boxed(),
            );
        }
    }

    if let Some(filename) = filename {
        let out_file = Arc::new(File::create(filename).context("Failed to open log file")?);
        let filter = if std::env::var(LOG_FILE_DETAIL_ENV_VAR).is_ok() {
            FilterResult {
                filter: EnvFilter::try_from_env(LOG_FILE_DETAIL_ENV_VAR)?,
                used_env: true,
            }
        } else {
            filter_for(trace_level, STANDARD_ENV_VAR)?
        };
        layers.push(
            fmt::layer()
                .with_writer(out_file)
                .with_target(filter.used_env)
                .with_timer(ChronoLocal::rfc_3339())
                .compact()
                .with_ansi(false)
                .with_filter(filter.filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).init();
    Ok(())
}

/// Routes log output around any active progress bars
struct ProgressWriter {
    display: MultiProgress,
}

impl ProgressWriter {
    fn wrap(display: &MultiProgress) -> Mutex<Self> {
        Mutex::new(Self {
            display: display.clone(),
        })
    }
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = std::str::from_utf8(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let msg = msg.trim_end_matches('\n');
        if self.display.is_hidden() {
            eprintln!("{msg}");
        } else {
            self.display.println(msg)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
