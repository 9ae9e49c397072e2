//! Dump File Memory View
//!
//! Memory view implementation for reading from dump files (MDMP and raw/gcore formats).

use super::maps::parse_maps_file;

use anyhow::{bail, Context, Result};
use byteorder::{ByteOrder, LE};
use heapscope::{Endian, Fault, MemoryRegion, MemoryView};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Memory dump file
///
/// Regions map virtual addresses to file offsets. A raw dump with no maps
/// file is treated as linear: file offset == virtual address.
pub struct DumpFile {
    /// Memory-mapped dump file
    mmap: Mmap,
    /// Virtual address regions parsed from dump or maps file
    regions: Vec<MemoryRegion>,
    endian: Endian,
    /// Path to the dump file
    pub path: PathBuf,
}

impl DumpFile {
    /// MDMP signature "MDMP" in little-endian
    const MDMP_SIGNATURE: u32 = 0x504D444D;

    /// MDMP stream types
    const MEMORY_64_LIST_STREAM: u32 = 9;

    /// Open a memory dump file
    ///
    /// Region sources, in order: the MDMP memory list, `maps`, `<dump>.maps`,
    /// then a single linear region covering the file.
    pub fn open(path: &Path, maps: Option<&Path>, endian: Endian) -> Result<Self> {
        let path = path.to_path_buf();
        let file =
            File::open(&path).with_context(|| format!("Failed to open dump file: {:?}", path))?;

        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to mmap dump file: {:?}", path))?;

        info!(path = ?path, size = mmap.len(), "opened dump file");

        if mmap.len() >= 4 && LE::read_u32(&mmap[0..4]) == Self::MDMP_SIGNATURE {
            debug!("detected minidump format");
            let regions = Self::parse_mdmp(&mmap)?;
            return Ok(DumpFile {
                mmap,
                regions,
                endian,
                path,
            });
        }

        let sibling = path.with_extension("maps");
        let regions = match maps {
            Some(maps) => parse_maps_file(maps)?,
            None if sibling.exists() => parse_maps_file(&sibling)?,
            None => vec![MemoryRegion::new(0, mmap.len() as u64, "r--p")],
        };
        debug!(regions = regions.len(), "dump regions");

        Ok(DumpFile {
            mmap,
            regions,
            endian,
            path,
        })
    }

    /// Parse the Memory64List stream of a Windows minidump
    fn parse_mdmp(mmap: &[u8]) -> Result<Vec<MemoryRegion>> {
        if mmap.len() < 32 {
            bail!("MDMP file too small for header");
        }

        let num_streams = LE::read_u32(&mmap[0x08..0x0C]) as usize;
        let stream_dir_rva = LE::read_u32(&mmap[0x0C..0x10]) as usize;
        debug!(streams = num_streams, directory = stream_dir_rva, "minidump header");

        for i in 0..num_streams {
            let entry_offset = stream_dir_rva + i * 12;
            if entry_offset + 12 > mmap.len() {
                break;
            }

            let stream_type = LE::read_u32(&mmap[entry_offset..entry_offset + 4]);
            let rva = LE::read_u32(&mmap[entry_offset + 8..entry_offset + 12]) as usize;
            if stream_type != Self::MEMORY_64_LIST_STREAM {
                continue;
            }

            if rva + 16 > mmap.len() {
                bail!("Memory64ListStream header out of bounds");
            }

            let num_ranges = LE::read_u64(&mmap[rva..rva + 8]) as usize;
            let mut file_offset = LE::read_u64(&mmap[rva + 8..rva + 16]);

            let mut regions = Vec::with_capacity(num_ranges.min(1 << 16));
            for j in 0..num_ranges {
                let desc_offset = rva + 16 + j * 16;
                if desc_offset + 16 > mmap.len() {
                    break;
                }

                let start = LE::read_u64(&mmap[desc_offset..desc_offset + 8]);
                let size = LE::read_u64(&mmap[desc_offset + 8..desc_offset + 16]);

                let mut region = MemoryRegion::new(start, start.saturating_add(size), "rw-p");
                region.offset = file_offset;
                regions.push(region);
                file_offset = file_offset.saturating_add(size);
            }

            debug!(ranges = regions.len(), "parsed minidump memory ranges");
            return Ok(regions);
        }

        bail!("No Memory64ListStream found in MDMP - dump may be incomplete")
    }

    /// Convert a virtual address range to a file offset
    fn va_to_offset(&self, address: u64, length: usize) -> Result<usize, Fault> {
        let region = self
            .regions
            .iter()
            .find(|region| region.contains_range(address, length as u64))
            .ok_or_else(|| Fault::new(address, length, "not inside one dump region"))?;

        let offset = region.offset + (address - region.start);
        let end = offset.checked_add(length as u64);
        match end {
            Some(end) if end <= self.mmap.len() as u64 => Ok(offset as usize),
            _ => Err(Fault::new(address, length, "region data missing from dump file")),
        }
    }
}

impl MemoryView for DumpFile {
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, Fault> {
        let offset = self.va_to_offset(address, length)?;
        Ok(self.mmap[offset..offset + length].to_vec())
    }

    fn endian(&self) -> Endian {
        self.endian
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_raw_dump_is_linear() {
        let data: Vec<u8> = (0..=255).collect();
        let file = write_temp(&data);

        let dump = DumpFile::open(file.path(), None, Endian::Little).unwrap();
        assert_eq!(dump.read_bytes(0x10, 4).unwrap(), vec![0x10, 0x11, 0x12, 0x13]);
        assert!(dump.read_bytes(0xFE, 4).is_err());
        assert_eq!(dump.regions().len(), 1);
    }

    #[test]
    fn test_explicit_maps_file() {
        let data: Vec<u8> = (0..64).collect();
        let file = write_temp(&data);
        let maps = write_temp(b"0x7000 0x7010 0x10 0x20\n0x9000 0x9010 0x10 0x30\n");

        let dump = DumpFile::open(file.path(), Some(maps.path()), Endian::Big).unwrap();
        assert_eq!(dump.endian(), Endian::Big);
        assert_eq!(dump.read_bytes(0x7000, 2).unwrap(), vec![0x20, 0x21]);
        assert_eq!(dump.read_bytes(0x900F, 1).unwrap(), vec![0x3F]);

        // Reads may not straddle the gap between regions
        let fault = dump.read_bytes(0x700F, 2).unwrap_err();
        assert_eq!(fault.address, 0x700F);
        assert!(dump.read_bytes(0x8000, 1).is_err());
    }

    #[test]
    fn test_region_past_end_of_file() {
        let file = write_temp(&[0u8; 16]);
        let maps = write_temp(b"0x1000 0x2000 0x1000 0x0\n");

        let dump = DumpFile::open(file.path(), Some(maps.path()), Endian::Little).unwrap();
        assert!(dump.read_bytes(0x1000, 16).is_ok());
        assert!(dump.read_bytes(0x1008, 16).is_err());
    }

    #[test]
    fn test_minidump_memory_list() {
        // Header (32), one directory entry (12), Memory64List (16 + 16), data (8)
        let mut data = vec![0u8; 84];
        LE::write_u32(&mut data[0..4], DumpFile::MDMP_SIGNATURE);
        LE::write_u32(&mut data[8..12], 1);
        LE::write_u32(&mut data[12..16], 32);
        LE::write_u32(&mut data[32..36], DumpFile::MEMORY_64_LIST_STREAM);
        LE::write_u32(&mut data[36..40], 32);
        LE::write_u32(&mut data[40..44], 44);
        LE::write_u64(&mut data[44..52], 1);
        LE::write_u64(&mut data[52..60], 76);
        LE::write_u64(&mut data[60..68], 0x4000_0000);
        LE::write_u64(&mut data[68..76], 8);
        data[76..84].copy_from_slice(b"heapdata");
        let file = write_temp(&data);

        let dump = DumpFile::open(file.path(), None, Endian::Little).unwrap();
        assert_eq!(dump.regions().len(), 1);
        assert_eq!(dump.read_bytes(0x4000_0000, 4).unwrap(), b"heap".to_vec());
        assert_eq!(dump.read_cstring(0x4000_0004, 16).unwrap(), "data");
    }

    #[test]
    fn test_minidump_without_memory_list() {
        let mut data = vec![0u8; 48];
        LE::write_u32(&mut data[0..4], DumpFile::MDMP_SIGNATURE);
        LE::write_u32(&mut data[8..12], 1);
        LE::write_u32(&mut data[12..16], 32);
        LE::write_u32(&mut data[32..36], 4);
        let file = write_temp(&data);

        assert!(DumpFile::open(file.path(), None, Endian::Little).is_err());
    }
}
