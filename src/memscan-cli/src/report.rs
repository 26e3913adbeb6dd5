//! Report line formatting for scan results.
//!
//! One line per region, in map order. Address ranges are displayed
//! inclusively: the maps file reports `[start, end)`, the report shows
//! `start` through `end - 1`.

use memscan::{Region, RegionReport, SkipReason};

/// Format a count with thousands separators, e.g. `1234567` ->
/// `"1,234,567"`.
pub fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

/// One report line for a scanned (or skipped) region.
pub fn format_report_line(report: &RegionReport, target: u8) -> String {
    let region = &report.region;
    let path = region.path.as_deref().unwrap_or("");
    let prefix = format!(
        "{:3}: {:#x} - {:#x} {}",
        report.index,
        region.start,
        region.inclusive_end(),
        region.perms
    );

    match report.outcome.skipped {
        Some(reason) => format!("{prefix}  {reason}  {path}"),
        None => format!(
            "{prefix}  read {:>12} bytes, count of {:#04x} is {:>9}  {path}",
            group_digits(report.outcome.bytes_scanned),
            target,
            group_digits(report.outcome.match_count)
        ),
    }
}

/// One line for --list mode: eligibility only, no statistics.
pub fn format_list_line(index: usize, region: &Region, skipped: Option<SkipReason>) -> String {
    let path = region.path.as_deref().unwrap_or("");
    let eligibility = match skipped {
        Some(reason) => reason.to_string(),
        None => "eligible".to_string(),
    };

    format!(
        "{:3}: {:#x} - {:#x} {}  {}  {}",
        index,
        region.start,
        region.inclusive_end(),
        region.perms,
        eligibility,
        path
    )
}
