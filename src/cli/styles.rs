// (c) 2024 Ross Younger
//! Terminal styling for mtubench output
//!
//! Print styled text with anstream's `println!` / `eprintln!`, which strip the styles
//! when the output is not a terminal.

use anstyle::{AnsiColor, Color, Style};
use clap::builder::styling::Styles;

const fn fg(colour: AnsiColor) -> Style {
    Style::new().fg_color(Some(Color::Ansi(colour)))
}

pub(crate) const ERROR: Style = fg(AnsiColor::Red).bold();
pub(crate) const WARNING: Style = fg(AnsiColor::Yellow).bold();
pub(crate) const INFO: Style = fg(AnsiColor::Cyan);
/// Headings, in help output and in the results chart
pub(crate) const HEADING: Style = fg(AnsiColor::Yellow).underline();

pub(crate) const CLAP_STYLES: Styles = Styles::styled()
    .usage(HEADING)
    .header(HEADING)
    .literal(Style::new().bold())
    .invalid(WARNING)
    .error(ERROR)
    .valid(INFO.bold().underline())
    .placeholder(INFO);
