//! Region map parsing
//!
//! Two line formats are accepted:
//! - Linux `/proc/pid/maps`: `start-end perms offset dev inode [path]`
//! - Dump segment lists: `0xSTART 0xEND SIZE FILE_OFFSET`

use anyhow::{Context, Result};
use heapscope::MemoryRegion;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// Parse a maps file (supports both /proc/pid/maps and custom dump format)
pub fn parse_maps_file(path: &Path) -> Result<Vec<MemoryRegion>> {
    let file = File::open(path).with_context(|| format!("Failed to open maps file: {:?}", path))?;
    parse_maps(BufReader::new(file))
}

pub fn parse_maps(reader: impl BufRead) -> Result<Vec<MemoryRegion>> {
    let mut regions = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read maps file")?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line) {
            Some(region) if region.end > region.start => regions.push(region),
            _ => warn!(line = number + 1, text = line, "skipping unparseable maps line"),
        }
    }

    regions.sort_by_key(|region| region.start);
    Ok(regions)
}

fn hex(text: &str) -> Option<u64> {
    u64::from_str_radix(text.trim_start_matches("0x"), 16).ok()
}

fn parse_line(line: &str) -> Option<MemoryRegion> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts[0].starts_with("0x") {
        // Custom dump format: 0xSTART 0xEND SIZE FILE_OFFSET
        if parts.len() < 4 {
            return None;
        }
        let mut region = MemoryRegion::new(hex(parts[0])?, hex(parts[1])?, "rw-p");
        region.offset = hex(parts[3])?;
        return Some(region);
    }

    // Linux /proc/pid/maps format
    let (start, end) = parts[0].split_once('-')?;
    let perms = parts.get(1).copied().unwrap_or("r--p");
    let mut region = MemoryRegion::new(hex(start)?, hex(end)?, perms);
    region.offset = parts.get(2).and_then(|s| hex(s)).unwrap_or(0);
    region.path = parts.get(5).map(|s| s.to_string());
    Some(region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_proc_maps_format() {
        let text = "\
7f0000000000-7f0000001000 r--p 00002000 08:01 1234 /usr/lib/libjvm.so
7f0000001000-7f0000003000 rw-p 00000000 00:00 0
";
        let regions = parse_maps(Cursor::new(text)).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].start, 0x7f00_0000_0000);
        assert_eq!(regions[0].offset, 0x2000);
        assert_eq!(regions[0].path.as_deref(), Some("/usr/lib/libjvm.so"));
        assert!(!regions[0].is_writable());
        assert_eq!(regions[1].size(), 0x2000);
        assert_eq!(regions[1].path, None);
    }

    #[test]
    fn test_dump_segment_format() {
        let text = "# start end size offset\n0x10000 0x12000 0x2000 0x400\n";
        let regions = parse_maps(Cursor::new(text)).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start, 0x10000);
        assert_eq!(regions[0].end, 0x12000);
        assert_eq!(regions[0].offset, 0x400);
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let text = "garbage\n0x10 0x20\nzz-10 r--p 0 0 0\n1000-2000 r--p 0 0 0\n3000-2000 r--p 0 0 0\n";
        let regions = parse_maps(Cursor::new(text)).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start, 0x1000);
    }

    #[test]
    fn test_regions_sorted() {
        let text = "2000-3000 r--p 0 0 0\n1000-2000 r--p 0 0 0\n";
        let regions = parse_maps(Cursor::new(text)).unwrap();
        assert_eq!(regions[0].start, 0x1000);
        assert_eq!(regions[1].start, 0x2000);
    }
}
