//! Memory View Trait
//!
//! Core abstraction for reading a foreign address space.

use super::MemoryRegion;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A read that could not be satisfied in full
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot read {length} bytes at {address:#x}: {reason}")]
pub struct Fault {
    pub address: u64,
    pub length: usize,
    pub reason: String,
}

impl Fault {
    pub fn new(address: u64, length: usize, reason: impl Into<String>) -> Self {
        Self {
            address,
            length,
            reason: reason.into(),
        }
    }
}

/// Byte order of the target image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Decode an unsigned integer of `bytes.len()` (1, 2, 4 or 8) bytes
    pub fn read_uint(self, bytes: &[u8]) -> u64 {
        match (self, bytes.len()) {
            (_, 1) => bytes[0] as u64,
            (Endian::Little, 2) => LittleEndian::read_u16(bytes) as u64,
            (Endian::Big, 2) => BigEndian::read_u16(bytes) as u64,
            (Endian::Little, 4) => LittleEndian::read_u32(bytes) as u64,
            (Endian::Big, 4) => BigEndian::read_u32(bytes) as u64,
            (Endian::Little, _) => LittleEndian::read_uint(bytes, bytes.len()),
            (Endian::Big, _) => BigEndian::read_uint(bytes, bytes.len()),
        }
    }

    /// Encode `value` into `width` bytes
    pub fn encode_uint(self, value: u64, width: usize) -> Vec<u8> {
        let mut out = vec![0u8; width];
        match self {
            Endian::Little => LittleEndian::write_uint(&mut out, value, width),
            Endian::Big => BigEndian::write_uint(&mut out, value, width),
        }
        out
    }

    pub fn read_u16_slice(self, bytes: &[u8]) -> Vec<u16> {
        let mut out = vec![0u16; bytes.len() / 2];
        match self {
            Endian::Little => LittleEndian::read_u16_into(&bytes[..out.len() * 2], &mut out),
            Endian::Big => BigEndian::read_u16_into(&bytes[..out.len() * 2], &mut out),
        }
        out
    }
}

/// Trait for reading a foreign address space (core file, live process, buffer)
///
/// `read_bytes` returns exactly `length` bytes or a [`Fault`]; a partial
/// read is never reported as success.
pub trait MemoryView: Send + Sync {
    /// Read bytes from a virtual address
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, Fault>;

    /// Byte order of every multi-byte value in this image
    fn endian(&self) -> Endian;

    /// Get the list of memory regions
    fn regions(&self) -> &[MemoryRegion];

    /// Read a NUL-terminated string of at most `max_len` bytes
    fn read_cstring(&self, address: u64, max_len: usize) -> Result<String, Fault> {
        let mut out = Vec::new();
        // Read in small steps so a string near the end of a region still decodes
        let mut cursor = address;
        while out.len() < max_len {
            let step = (max_len - out.len()).min(64);
            let read = match self.read_bytes(cursor, step) {
                Err(_) if step > 1 => self.read_bytes(cursor, 1),
                other => other,
            };
            let chunk = match read {
                Ok(chunk) => chunk,
                Err(fault) if out.is_empty() => return Err(fault),
                // Unterminated string running into unmapped memory
                Err(_) => break,
            };
            if let Some(end) = chunk.iter().position(|&b| b == 0) {
                out.extend_from_slice(&chunk[..end]);
                return Ok(String::from_utf8_lossy(&out).to_string());
            }
            cursor += chunk.len() as u64;
            out.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&out).to_string())
    }

    /// Find a region containing the given address
    fn find_region(&self, address: u64) -> Option<&MemoryRegion> {
        self.regions().iter().find(|r| r.contains(address))
    }

    /// Check if an address is readable
    fn is_readable(&self, address: u64) -> bool {
        self.find_region(address)
            .map(|r| r.is_readable())
            .unwrap_or(false)
    }
}
