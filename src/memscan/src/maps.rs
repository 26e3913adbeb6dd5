//! Reading and parsing `/proc/self/maps`.
//!
//! Each line of the maps file describes one contiguous region of the
//! process's virtual address space:
//!
//! ```text
//! 00403000-00404000 r--p 00002000 00:30 641        /mnt/src/t
//! 00cc3000-00ce4000 rw-p 00000000 00:00 0          [heap]
//! 7f8670628000-7f867062a000 rw-p 00000000 00:00 0
//! ```
//!
//! The address range is half-open: the end address is one past the
//! last valid byte. The path field is absent for anonymous mappings
//! and may be a bracketed pseudo-path such as `[heap]` or `[vdso]`.
//!
//! The map is assumed either fully parseable or unusable: any
//! malformed line aborts the whole read with no partial-record
//! recovery.

use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::os::fd::IntoRawFd;
use std::path::Path;
use thiserror::Error;

/// The maps file for the current process
pub const MAPS_PATH: &str = "/proc/self/maps";

/// Upper bound on the number of regions accepted from one read
pub const MAX_REGIONS: usize = 8192;

#[derive(Error, Debug)]
pub enum MapsError {
    #[error("unable to open the memory map: {0}")]
    Open(io::Error),

    #[error("unable to read the memory map: {0}")]
    Read(io::Error),

    #[error("region {index}: malformed address token `{token}`")]
    MalformedAddress { index: usize, token: String },

    #[error("region {index}: missing {field} field")]
    MalformedLine { index: usize, field: &'static str },

    #[error("region {index}: bad permissions token `{token}`")]
    BadPermissions { index: usize, token: String },

    #[error("memory map has more than {} regions", MAX_REGIONS)]
    TooManyRegions,

    // A failed close may mask data corruption on some platforms, so it
    // is surfaced instead of being swallowed by the File drop.
    #[error("unable to close the memory map: {0}")]
    Close(io::Error),
}

/// Validated 4-character permission token from the alphabet
/// `{r,-}{w,-}{x,-}{s,p}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Permissions {
    token: String,
}

impl Permissions {
    /// Validate and wrap a permissions token, e.g. `"r-xp"`.
    pub fn parse(token: &str) -> Option<Self> {
        let bytes = token.as_bytes();
        if bytes.len() != 4 {
            return None;
        }
        let valid = matches!(bytes[0], b'r' | b'-')
            && matches!(bytes[1], b'w' | b'-')
            && matches!(bytes[2], b'x' | b'-')
            && matches!(bytes[3], b's' | b'p');
        valid.then(|| Permissions {
            token: token.to_string(),
        })
    }

    pub fn is_readable(&self) -> bool {
        self.token.as_bytes()[0] == b'r'
    }

    pub fn is_writable(&self) -> bool {
        self.token.as_bytes()[1] == b'w'
    }

    pub fn is_executable(&self) -> bool {
        self.token.as_bytes()[2] == b'x'
    }

    pub fn is_shared(&self) -> bool {
        self.token.as_bytes()[3] == b's'
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

/// One region of the process's virtual address space
#[derive(Debug, Clone, Serialize)]
pub struct Region {
    /// First address of the region
    pub start: usize,
    /// One past the last valid address (half-open range)
    pub end: usize,
    pub perms: Permissions,
    /// File offset for file-backed mappings, 0 otherwise
    pub offset: u64,
    /// `major:minor` device token, not interpreted further
    pub device: String,
    /// Inode number for file-backed mappings, 0 otherwise
    pub inode: u64,
    /// Backing path, absent for anonymous mappings; may be a bracketed
    /// pseudo-path such as `[heap]` or `[vvar]`
    pub path: Option<String>,
}

impl Region {
    pub fn size(&self) -> u64 {
        (self.end - self.start) as u64
    }

    /// Last valid address of the region, for inclusive-range display.
    pub fn inclusive_end(&self) -> usize {
        self.end - 1
    }
}

/// Read the current process's memory map.
///
/// Opens the maps file, parses it to exhaustion, and explicitly closes
/// the descriptor, reporting a close failure as an error in its own
/// right. The returned list is ordered as the kernel reported it and
/// is a snapshot: the live address space may change after the read.
pub fn read_regions() -> Result<Vec<Region>, MapsError> {
    read_regions_from(Path::new(MAPS_PATH))
}

/// Open, parse, and explicitly close one maps file.
///
/// The descriptor is released on every exit path, success or parse
/// failure alike. A parse error outranks a close failure; a close
/// failure after a clean parse is fatal in its own right.
fn read_regions_from(path: &Path) -> Result<Vec<Region>, MapsError> {
    let file = File::open(path).map_err(MapsError::Open)?;
    let mut reader = BufReader::new(file);
    let parsed = parse_regions(&mut reader);

    let fd = reader.into_inner().into_raw_fd();
    let close_error = if unsafe { libc::close(fd) } != 0 {
        Some(io::Error::last_os_error())
    } else {
        None
    };

    let regions = parsed?;
    if let Some(err) = close_error {
        return Err(MapsError::Close(err));
    }

    Ok(regions)
}

/// Parse a maps-format stream into an ordered region list.
///
/// Fails on the first malformed line, and refuses maps with more than
/// [`MAX_REGIONS`] entries rather than silently truncating.
pub fn parse_regions<R: BufRead>(reader: R) -> Result<Vec<Region>, MapsError> {
    let mut regions = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(MapsError::Read)?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if regions.len() == MAX_REGIONS {
            return Err(MapsError::TooManyRegions);
        }
        regions.push(parse_line(regions.len(), line)?);
    }

    Ok(regions)
}

/// Parse one maps line into a [`Region`].
///
/// Fields are positional: address range, permissions, offset, device,
/// inode, then an optional path which keeps any internal spaces.
fn parse_line(index: usize, line: &str) -> Result<Region, MapsError> {
    // The path field is padded with spaces and may itself contain
    // spaces, so split off at most the five leading fields.
    let mut fields = line.splitn(6, ' ');

    let range = fields.next().unwrap_or_default();
    let (start_token, end_token) =
        range
            .split_once('-')
            .ok_or_else(|| MapsError::MalformedAddress {
                index,
                token: range.to_string(),
            })?;
    let start =
        usize::from_str_radix(start_token, 16).map_err(|_| MapsError::MalformedAddress {
            index,
            token: start_token.to_string(),
        })?;
    let end = usize::from_str_radix(end_token, 16).map_err(|_| MapsError::MalformedAddress {
        index,
        token: end_token.to_string(),
    })?;
    if start >= end {
        return Err(MapsError::MalformedAddress {
            index,
            token: range.to_string(),
        });
    }

    let perms_token = fields.next().ok_or(MapsError::MalformedLine {
        index,
        field: "permissions",
    })?;
    let perms = Permissions::parse(perms_token).ok_or_else(|| MapsError::BadPermissions {
        index,
        token: perms_token.to_string(),
    })?;

    let offset_token = fields.next().ok_or(MapsError::MalformedLine {
        index,
        field: "offset",
    })?;
    let offset =
        u64::from_str_radix(offset_token, 16).map_err(|_| MapsError::MalformedLine {
            index,
            field: "offset",
        })?;

    let device = fields
        .next()
        .ok_or(MapsError::MalformedLine {
            index,
            field: "device",
        })?
        .to_string();

    let inode_token = fields.next().ok_or(MapsError::MalformedLine {
        index,
        field: "inode",
    })?;
    let inode: u64 = inode_token.parse().map_err(|_| MapsError::MalformedLine {
        index,
        field: "inode",
    })?;

    // Each Region owns its path so the record stays valid after the
    // line buffer is gone.
    let path = fields
        .next()
        .map(str::trim_start)
        .filter(|p| !p.is_empty())
        .map(String::from);

    Ok(Region {
        start,
        end,
        perms,
        offset,
        device,
        inode,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_file_backed_region() {
        let line = "00403000-00404000 r--p 00002000 00:30 641        /mnt/src/t";
        let regions = parse_regions(Cursor::new(line)).unwrap();

        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(region.start, 0x403000);
        assert_eq!(region.end, 0x404000);
        assert_eq!(region.inclusive_end(), 0x403fff);
        assert_eq!(region.size(), 4096);
        assert_eq!(region.perms.as_str(), "r--p");
        assert_eq!(region.offset, 0x2000);
        assert_eq!(region.device, "00:30");
        assert_eq!(region.inode, 641);
        assert_eq!(region.path.as_deref(), Some("/mnt/src/t"));
    }

    #[test]
    fn test_parse_anonymous_region() {
        let line = "7f8670628000-7f867062a000 rw-p 00000000 00:00 0";
        let regions = parse_regions(Cursor::new(line)).unwrap();

        let region = &regions[0];
        assert_eq!(region.start, 0x7f8670628000);
        assert_eq!(region.offset, 0);
        assert_eq!(region.inode, 0);
        assert_eq!(region.path, None);
    }

    #[test]
    fn test_parse_pseudo_path() {
        let line = "00cc3000-00ce4000 rw-p 00000000 00:00 0          [heap]";
        let regions = parse_regions(Cursor::new(line)).unwrap();

        assert_eq!(regions[0].path.as_deref(), Some("[heap]"));
    }

    #[test]
    fn test_parse_path_with_spaces() {
        let line = "7f0000000000-7f0000001000 r--p 00000000 08:01 99  /opt/some app/lib.so";
        let regions = parse_regions(Cursor::new(line)).unwrap();

        assert_eq!(regions[0].path.as_deref(), Some("/opt/some app/lib.so"));
    }

    #[test]
    fn test_parse_preserves_order() {
        let input = "\
00403000-00404000 r--p 00002000 00:30 641 /mnt/src/t
00404000-00405000 rw-p 00003000 00:30 641 /mnt/src/t
00cc3000-00ce4000 rw-p 00000000 00:00 0   [heap]
";
        let regions = parse_regions(Cursor::new(input)).unwrap();

        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].start, 0x403000);
        assert_eq!(regions[1].start, 0x404000);
        assert_eq!(regions[2].path.as_deref(), Some("[heap]"));
        for region in &regions {
            assert!(region.start < region.end);
        }
    }

    #[test]
    fn test_malformed_address_is_fatal() {
        let line = "0040zzzz-00404000 r--p 00002000 00:30 641 /mnt/src/t";
        let err = parse_regions(Cursor::new(line)).unwrap_err();

        assert!(matches!(err, MapsError::MalformedAddress { index: 0, .. }));
    }

    #[test]
    fn test_missing_range_separator_is_fatal() {
        let line = "0040300000404000 r--p 00002000 00:30 641";
        let err = parse_regions(Cursor::new(line)).unwrap_err();

        assert!(matches!(err, MapsError::MalformedAddress { .. }));
    }

    #[test]
    fn test_inverted_range_is_fatal() {
        let line = "00404000-00403000 r--p 00002000 00:30 641";
        let err = parse_regions(Cursor::new(line)).unwrap_err();

        assert!(matches!(err, MapsError::MalformedAddress { .. }));
    }

    #[test]
    fn test_no_recovery_after_malformed_line() {
        let input = "\
00403000-00404000 r--p 00002000 00:30 641 /mnt/src/t
badline
00cc3000-00ce4000 rw-p 00000000 00:00 0 [heap]
";
        assert!(parse_regions(Cursor::new(input)).is_err());
    }

    #[test]
    fn test_bad_permissions_token() {
        let line = "00403000-00404000 rwxq 00002000 00:30 641";
        let err = parse_regions(Cursor::new(line)).unwrap_err();

        assert!(matches!(err, MapsError::BadPermissions { .. }));
    }

    #[test]
    fn test_permissions_alphabet() {
        assert!(Permissions::parse("rwxp").is_some());
        assert!(Permissions::parse("r--s").is_some());
        assert!(Permissions::parse("---p").is_some());
        assert!(Permissions::parse("rw-").is_none());
        assert!(Permissions::parse("rw-pp").is_none());
        assert!(Permissions::parse("wr-p").is_none());
        assert!(Permissions::parse("rw-x").is_none());
    }

    #[test]
    fn test_permission_flags() {
        let perms = Permissions::parse("rw-p").unwrap();
        assert!(perms.is_readable());
        assert!(perms.is_writable());
        assert!(!perms.is_executable());
        assert!(!perms.is_shared());

        let perms = Permissions::parse("--xs").unwrap();
        assert!(!perms.is_readable());
        assert!(perms.is_executable());
        assert!(perms.is_shared());
    }

    #[test]
    fn test_too_many_regions() {
        let mut input = String::new();
        for i in 0..=MAX_REGIONS {
            let start = 0x1000 * (i + 1);
            input.push_str(&format!(
                "{:012x}-{:012x} r--p 00000000 00:00 0\n",
                start,
                start + 0x1000
            ));
        }
        let err = parse_regions(Cursor::new(input)).unwrap_err();

        assert!(matches!(err, MapsError::TooManyRegions));
    }

    #[test]
    fn test_parse_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("maps");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "00403000-00404000 r--p 00002000 00:30 641 /mnt/src/t").unwrap();
        writeln!(file, "ffffffffff600000-ffffffffff601000 --xp 00000000 00:00 0 [vsyscall]")
            .unwrap();
        drop(file);

        let regions = parse_regions(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(regions.len(), 2);
        assert!(!regions[1].perms.is_readable());
        assert_eq!(regions[1].path.as_deref(), Some("[vsyscall]"));
    }

    #[test]
    fn test_parse_error_still_releases_descriptor() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("maps");
        std::fs::write(&path, "zzzz-00404000 r--p 00000000 00:00 0\n").unwrap();

        let err = read_regions_from(&path).unwrap_err();
        assert!(matches!(err, MapsError::MalformedAddress { .. }));

        // No descriptor may still point at the file after the failed
        // read.
        let leaked = std::fs::read_dir("/proc/self/fd")
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| std::fs::read_link(entry.path()).ok())
            .any(|target| target == path);
        assert!(!leaked);
    }

    #[test]
    fn test_read_regions_live() {
        // Every Linux process has at least its own executable and stack
        // mapped.
        let regions = read_regions().unwrap();
        assert!(!regions.is_empty());
        for region in &regions {
            assert!(region.start < region.end);
        }
        assert!(regions
            .iter()
            .any(|r| r.path.as_deref() == Some("[stack]")));
    }
}
