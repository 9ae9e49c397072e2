//! Memory Region Types
//!
//! Address ranges of an image, as listed by /proc/pid/maps or a dump's segment table.

use serde::Serialize;

/// A mapped address range of the target image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    /// Offset of `start` within the backing file (0 when not file-backed)
    pub offset: u64,
    pub path: Option<String>,
}

impl MemoryRegion {
    pub fn new(start: u64, end: u64, perms: &str) -> Self {
        Self {
            start,
            end,
            perms: perms.to_string(),
            offset: 0,
            path: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end
    }

    /// True when `[address, address + length)` lies entirely inside this region
    pub fn contains_range(&self, address: u64, length: u64) -> bool {
        match address.checked_add(length) {
            Some(end) => address >= self.start && end <= self.end,
            None => false,
        }
    }

    pub fn is_readable(&self) -> bool {
        self.perms.starts_with('r')
    }

    pub fn is_writable(&self) -> bool {
        self.perms.chars().nth(1) == Some('w')
    }

    pub fn is_executable(&self) -> bool {
        self.perms.chars().nth(2) == Some('x')
    }
}
