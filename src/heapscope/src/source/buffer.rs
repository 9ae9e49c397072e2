//! Buffer Memory View
//!
//! An in-memory image made of byte segments at fixed virtual addresses.
//! Used by tests and by callers that already hold the bytes they want decoded.

use super::{Endian, Fault, MemoryRegion, MemoryView};
use std::sync::atomic::{AtomicUsize, Ordering};

/// One contiguous run of bytes at a virtual address
#[derive(Debug, Clone)]
struct Segment {
    base: u64,
    data: Vec<u8>,
}

/// In-memory [`MemoryView`] over one or more segments
///
/// Every call to `read_bytes` is counted, which lets callers verify that a
/// cached lookup performed no memory access.
#[derive(Debug)]
pub struct BufferView {
    segments: Vec<Segment>,
    regions: Vec<MemoryRegion>,
    endian: Endian,
    reads: AtomicUsize,
}

impl BufferView {
    /// Create a view holding a single segment
    pub fn new(data: Vec<u8>, base: u64, endian: Endian) -> Self {
        let mut view = Self::empty(endian);
        view.add_segment(base, data);
        view
    }

    /// Create a view with no mapped memory
    pub fn empty(endian: Endian) -> Self {
        Self {
            segments: Vec::new(),
            regions: Vec::new(),
            endian,
            reads: AtomicUsize::new(0),
        }
    }

    /// Map `data` at `base`; segments must not overlap
    pub fn add_segment(&mut self, base: u64, data: Vec<u8>) {
        let end = base + data.len() as u64;
        self.regions.push(MemoryRegion::new(base, end, "r--p"));
        self.segments.push(Segment { base, data });
    }

    /// Number of `read_bytes` calls served so far, including failed ones
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn reset_read_count(&self) {
        self.reads.store(0, Ordering::Relaxed);
    }
}

impl MemoryView for BufferView {
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, Fault> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let segment = self
            .segments
            .iter()
            .find(|s| address >= s.base && address < s.base + s.data.len() as u64)
            .ok_or_else(|| Fault::new(address, length, "address not mapped"))?;

        let offset = (address - segment.base) as usize;
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= segment.data.len())
            .ok_or_else(|| {
                let segment_end = segment.base + segment.data.len() as u64;
                Fault::new(
                    address,
                    length,
                    format!("read crosses end of segment at {:#x}", segment_end),
                )
            })?;

        Ok(segment.data[offset..end].to_vec())
    }

    fn endian(&self) -> Endian {
        self.endian
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }
}
