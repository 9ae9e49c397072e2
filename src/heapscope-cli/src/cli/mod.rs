//! CLI argument definitions for heapscope
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod core;
mod shrc;
mod tags;

pub use core::{Cli, Commands, ImageArgs};
pub use shrc::ShrcCommand;
pub use tags::TagsCommand;

/// Parse a hex (`0x`-prefixed) or decimal address
pub fn parse_address(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid address '{text}': {e}"))
}
