//! CLI argument definitions for memscan
//!
//! The scanner takes no positional arguments; stray arguments fail
//! with a usage error. Every option refines the run rather than
//! selecting a different input.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "memscan")]
#[command(about = "Scan every readable region of this process's own memory", long_about = None)]
pub struct Cli {
    /// Byte value to count, as hex (e.g. "41" or "0x41") or a single
    /// character
    #[arg(short, long)]
    pub target_byte: Option<String>,

    /// Mapping path to exclude from the scan, in addition to the
    /// configured set (repeatable)
    #[arg(short = 'x', long = "exclude")]
    pub exclude: Vec<String>,

    /// List regions and their eligibility without touching any memory
    #[arg(short, long)]
    pub list: bool,

    /// Emit the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Alternate config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Parse a target-byte argument: a single ASCII character, or one or
/// two hex digits with an optional `0x` prefix.
pub fn parse_target_byte(arg: &str) -> Result<u8> {
    if arg.len() == 1 && arg.is_ascii() {
        return Ok(arg.as_bytes()[0]);
    }

    let hex = arg.strip_prefix("0x").unwrap_or(arg);
    if hex.len() <= 2 {
        if let Ok(value) = u8::from_str_radix(hex, 16) {
            return Ok(value);
        }
    }

    bail!("invalid target byte `{arg}`: expected a single character or a hex value 00-ff")
}
