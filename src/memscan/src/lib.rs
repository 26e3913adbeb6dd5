//! # memscan
//!
//! Self-process memory introspection: enumerate the mapped regions of
//! the running process from `/proc/self/maps` and walk every byte of
//! every safely readable region, counting occurrences of a target byte.
//!
//! The pipeline has two stages, consumed in sequence:
//! - [`maps`] reads and parses the memory map into an ordered list of
//!   [`Region`] records.
//! - [`scan`] applies the eligibility policy (read permission, then
//!   exclusion list) to each region and performs the byte walk,
//!   producing one [`RegionReport`] per region in input order.
//!
//! ## Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let regions = memscan::read_regions()?;
//! let config = memscan::ScanConfig::default();
//!
//! for report in memscan::scan_regions(&regions, &config) {
//!     match report.outcome.skipped {
//!         Some(reason) => println!("{}: skipped ({})", report.index, reason),
//!         None => println!(
//!             "{}: {} bytes, {} matches",
//!             report.index, report.outcome.bytes_scanned, report.outcome.match_count
//!         ),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod maps;
pub mod scan;

// Re-export commonly used items
#[doc(inline)]
pub use maps::{parse_regions, read_regions, MapsError, Permissions, Region, MAX_REGIONS};
#[doc(inline)]
pub use scan::{
    scan_region, scan_regions, skip_reason, RegionReport, ScanConfig, ScanOutcome, SkipReason,
    DEFAULT_EXCLUDED_PATHS, DEFAULT_TARGET_BYTE,
};
