//! Result presentation
// (c) 2024 Ross Younger
//!
//! The chart shows one block per MTU, highest first, with a bar for each of the four series.
//! Every bar is scaled against the single highest figure in the whole table,
//! so bars are comparable across MTUs as well as within one.

use std::fmt::Write as _;

use owo_colors::OwoColorize as _;
use tabled::{settings::style::Style, Table, Tabled};

use crate::{
    benchmark::{MtuResult, ResultTable},
    cli::styles::HEADING,
    throughput::{Direction, Duplex},
};

/// Bars are never narrower than this, however narrow the terminal
pub const MIN_BAR_WIDTH: usize = 10;

/// `  full-duplex rx ` (series label and indent)
const LABEL_WIDTH: usize = 17;
/// ` 123456.78 Mbits/sec`
const VALUE_WIDTH: usize = 20;

/// Length in characters of the bar for `value`, out of `width`
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn bar_length(value: f64, highest: f64, width: usize) -> usize {
    if highest <= 0. || value <= 0. {
        return 0;
    }
    let length = (value / highest * width as f64).round() as usize;
    length.min(width)
}

fn bar_width(terminal_width: usize) -> usize {
    terminal_width
        .saturating_sub(LABEL_WIDTH + VALUE_WIDTH)
        .max(MIN_BAR_WIDTH)
}

fn render_mtu(out: &mut String, result: &MtuResult, highest: f64, width: usize, colour: bool) {
    if colour {
        let style = HEADING;
        let _ = writeln!(out, "{style}MTU {}{style:#}", result.mtu);
    } else {
        let _ = writeln!(out, "MTU {}", result.mtu);
    }
    for (duplex, direction, value) in result.avg_mbps.series() {
        let length = bar_length(value, highest, width);
        let bar = "#".repeat(length);
        let bar = if colour {
            match duplex {
                Duplex::Half => bar.cyan().to_string(),
                Duplex::Full => bar.green().to_string(),
            }
        } else {
            bar
        };
        let pad = " ".repeat(width - length);
        let _ = writeln!(
            out,
            "  {:<15}{bar}{pad} {value:>9.2} Mbits/sec",
            format!("{duplex} {direction}")
        );
    }
}

/// Draws the bar chart for a terminal `terminal_width` characters wide
#[must_use]
pub fn render_chart(table: &ResultTable, terminal_width: usize, colour: bool) -> String {
    let highest = table.highest_bandwidth_mbps();
    let width = bar_width(terminal_width);
    let mut out = String::new();
    for result in table.records().iter().rev() {
        render_mtu(&mut out, result, highest, width, colour);
    }
    out
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "MTU")]
    mtu: u32,
    #[tabled(rename = "half tx")]
    half_tx: String,
    #[tabled(rename = "half rx")]
    half_rx: String,
    #[tabled(rename = "full tx")]
    full_tx: String,
    #[tabled(rename = "full rx")]
    full_rx: String,
}

impl From<&MtuResult> for SummaryRow {
    fn from(r: &MtuResult) -> Self {
        let cell = |d, dir| format!("{:.2}", r.mbps(d, dir));
        Self {
            mtu: r.mtu,
            half_tx: cell(Duplex::Half, Direction::Tx),
            half_rx: cell(Duplex::Half, Direction::Rx),
            full_tx: cell(Duplex::Full, Direction::Tx),
            full_rx: cell(Duplex::Full, Direction::Rx),
        }
    }
}

/// A table of the averages in Mbits/sec, in the order the MTUs were tested
#[must_use]
pub fn render_summary(table: &ResultTable) -> String {
    let rows: Vec<SummaryRow> = table.records().iter().map(SummaryRow::from).collect();
    Table::new(rows).with(Style::sharp()).to_string()
}

/// Prints the chart and summary to stdout, sized to the terminal
pub fn print(table: &ResultTable) {
    use anstream::println;
    if table.is_empty() {
        println!("No results.");
        return;
    }
    let term = console::Term::stdout();
    // size() falls back to a sensible default when stdout is not a terminal
    let width = usize::from(term.size().1);
    let colour = console::colors_enabled();
    println!("{}", render_chart(table, width, colour));
    println!("Average throughput (Mbits/sec):\n{}", render_summary(table));
}
