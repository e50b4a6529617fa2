//! Newline-delimited JSON signal input
//!
//! Blank lines and lines starting with `#` are skipped. A line that does
//! not parse is an error naming its line number.

use anyhow::{Context, Result};
use remediation::Signal;

pub fn parse_signals(text: &str) -> Result<Vec<Signal>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str::<Signal>(line).with_context(|| format!("signal on line {}", i + 1))
        })
        .collect()
}
