//! Region scanning: eligibility policy and the byte walk.
//!
//! Regions are visited exactly once, in map order, and a region's
//! content can never abort the run: ineligible regions are recorded
//! with a skip reason instead of being touched. Eligibility is the
//! hard safety boundary here, not a performance optimization: a
//! single read from a genuinely unreadable region would fault the
//! process.

use serde::Serialize;
use std::fmt;
use std::ptr;

use crate::maps::Region;

/// The byte value counted by default
pub const DEFAULT_TARGET_BYTE: u8 = b'A';

/// Mapping paths never scanned by default.
///
/// The vvar pages fault on ordinary loads on x86, see
/// <https://lwn.net/Articles/615809/>.
pub const DEFAULT_EXCLUDED_PATHS: &[&str] = &["[vvar]", "[vvar_vclock]"];

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Byte value to count occurrences of
    pub target: u8,
    /// Exact-match paths excluded from the scan regardless of
    /// permissions
    pub excluded_paths: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            target: DEFAULT_TARGET_BYTE,
            excluded_paths: DEFAULT_EXCLUDED_PATHS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Why a region's byte walk did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Read permission not set on the region
    Unreadable,
    /// Path matched the exclusion list
    Excluded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unreadable => write!(f, "read permission not set"),
            SkipReason::Excluded => write!(f, "excluded from scan"),
        }
    }
}

/// Per-region scan statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    pub bytes_scanned: u64,
    pub match_count: u64,
    pub skipped: Option<SkipReason>,
}

/// One region's metadata paired with its scan outcome
#[derive(Debug, Clone, Serialize)]
pub struct RegionReport {
    pub index: usize,
    pub region: Region,
    pub outcome: ScanOutcome,
}

/// Evaluate the eligibility policy for one region.
///
/// The permission check runs before the exclusion check; the exclusion
/// list is a linear search, which is fine at its intended size of a
/// handful of entries.
pub fn skip_reason(region: &Region, config: &ScanConfig) -> Option<SkipReason> {
    if !region.perms.is_readable() {
        return Some(SkipReason::Unreadable);
    }
    if let Some(path) = &region.path {
        if config.excluded_paths.iter().any(|p| p == path) {
            return Some(SkipReason::Excluded);
        }
    }
    None
}

/// Scan one region, honoring the eligibility policy.
///
/// Eligible regions get a full byte walk over `[start, end)`: every
/// byte is read, and on writable regions the just-read value is
/// immediately written back to the same address. The write is a probe
/// that exercises the writable path without changing content, and is
/// never issued on a region whose writable flag is unset.
///
/// The one exception is the region backing the scanner's own stack:
/// that region is read and counted like any other, but the probe write
/// is suppressed there. The volatile ops compile to real calls in
/// unoptimized builds and build their frames inside that region while
/// an iteration is in flight, so a write-back would store a stale byte
/// over a frame the walk itself is using.
pub fn scan_region(region: &Region, config: &ScanConfig) -> ScanOutcome {
    if let Some(reason) = skip_reason(region, config) {
        return ScanOutcome {
            skipped: Some(reason),
            ..ScanOutcome::default()
        };
    }

    let mut bytes_scanned: u64 = 0;
    let mut match_count: u64 = 0;

    // A local's address pins down the region holding this call's own
    // frames. Never probe-write that region: between the read and the
    // write-back the callee frames of the volatile ops themselves land
    // in it, and the write-back would clobber them with a stale value.
    let stack_marker = &bytes_scanned as *const u64 as usize;
    let on_own_stack = (region.start..region.end).contains(&stack_marker);
    let writable = region.perms.is_writable() && !on_own_stack;

    for address in region.start..region.end {
        // SAFETY: the eligibility policy above has already passed for
        // this region: the kernel reported [start, end) as a mapped,
        // readable span of our own address space in a snapshot taken
        // this run, the region is not on the exclusion list of pages
        // known to fault on ordinary loads, and nothing in this
        // process unmaps regions while the scan is running. The write
        // only happens when the kernel reported the region writable
        // and the region is not the one backing our own call frames,
        // and stores the value just read from the same address.
        // Volatile ops keep the probe write from being elided and
        // preserve the read-before-write ordering.
        let byte = unsafe {
            let p = address as *const u8;
            let byte = ptr::read_volatile(p);
            if writable {
                ptr::write_volatile(p as *mut u8, byte);
            }
            byte
        };

        bytes_scanned += 1;
        if byte == config.target {
            match_count += 1;
        }
    }

    ScanOutcome {
        bytes_scanned,
        match_count,
        skipped: None,
    }
}

/// Scan every region in order, producing one report per region.
pub fn scan_regions(regions: &[Region], config: &ScanConfig) -> Vec<RegionReport> {
    regions
        .iter()
        .enumerate()
        .map(|(index, region)| RegionReport {
            index,
            region: region.clone(),
            outcome: scan_region(region, config),
        })
        .collect()
}
