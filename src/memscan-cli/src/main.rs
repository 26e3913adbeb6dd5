//! memscan: scan every readable region of this process's own memory.
//!
//! The pipeline is a single synchronous pass: read `/proc/self/maps`,
//! apply the eligibility policy to each region, walk every byte of the
//! eligible ones, and print one report line per region. Any failure to
//! open, parse, or close the map is fatal; skipped regions are not.

mod cli;
mod config;
mod report;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{parse_target_byte, Cli};
use config::Config;
use memscan::{read_regions, scan_regions, skip_reason, ScanConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Defaults, then config file, then flags.
    let mut scan_config = ScanConfig::default();
    if let Some(arg) = config.target_byte.as_deref() {
        scan_config.target = parse_target_byte(arg)
            .context("invalid target_byte in config file")?;
    }
    scan_config.excluded_paths.extend(config.exclude);
    if let Some(arg) = cli.target_byte.as_deref() {
        scan_config.target = parse_target_byte(arg)?;
    }
    scan_config.excluded_paths.extend(cli.exclude);

    let regions = read_regions()?;

    if cli.list {
        for (index, region) in regions.iter().enumerate() {
            let skipped = skip_reason(region, &scan_config);
            println!("{}", report::format_list_line(index, region, skipped));
        }
        return Ok(());
    }

    let reports = scan_regions(&regions, &scan_config);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for region_report in &reports {
            println!(
                "{}",
                report::format_report_line(region_report, scan_config.target)
            );
        }
    }

    Ok(())
}
