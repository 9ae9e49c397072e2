//! Typed addresses
//!
//! A [`TypedAddress`] pairs an address with an integer width and the view it
//! points into. Arithmetic never touches memory; [`TypedAddress::deref`] issues
//! exactly one read.

use crate::source::{Fault, MemoryView};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the integer a [`TypedAddress`] points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::W8 => 1,
            Width::W16 => 2,
            Width::W32 => 4,
            Width::W64 => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Width::W8),
            2 => Some(Width::W16),
            4 => Some(Width::W32),
            8 => Some(Width::W64),
            _ => None,
        }
    }
}

/// An address interpreted as an N-bit integer inside a [`MemoryView`]
///
/// Equality compares the address and the identity of the view, never the
/// bytes behind it.
#[derive(Clone, Copy)]
pub struct TypedAddress<'v> {
    address: u64,
    width: Width,
    view: &'v dyn MemoryView,
}

impl<'v> TypedAddress<'v> {
    pub fn new(view: &'v dyn MemoryView, address: u64, width: Width) -> Self {
        Self {
            address,
            width,
            view,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn view(&self) -> &'v dyn MemoryView {
        self.view
    }

    pub fn is_null(&self) -> bool {
        self.address == 0
    }

    /// Advance by `bytes` (not scaled by the width)
    pub fn add(self, bytes: u64) -> Self {
        Self {
            address: self.address.wrapping_add(bytes),
            ..self
        }
    }

    /// Move back by `bytes` (not scaled by the width)
    pub fn sub(self, bytes: u64) -> Self {
        Self {
            address: self.address.wrapping_sub(bytes),
            ..self
        }
    }

    /// Move by a signed byte delta, as used by self-relative pointers
    pub fn offset(self, delta: i64) -> Self {
        Self {
            address: self.address.wrapping_add_signed(delta),
            ..self
        }
    }

    /// Reinterpret the same address with another width
    pub fn cast(self, width: Width) -> Self {
        Self { width, ..self }
    }

    /// Read the unsigned value at this address
    pub fn deref(&self) -> Result<u64, Fault> {
        let bytes = self.view.read_bytes(self.address, self.width.bytes())?;
        Ok(self.view.endian().read_uint(&bytes))
    }

    /// Read the value at this address, sign-extended to 64 bits
    pub fn deref_signed(&self) -> Result<i64, Fault> {
        let raw = self.deref()?;
        let shift = 64 - self.width.bits();
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Read `length` raw bytes starting at this address
    pub fn read_bytes(&self, length: usize) -> Result<Vec<u8>, Fault> {
        self.view.read_bytes(self.address, length)
    }
}

impl PartialEq for TypedAddress<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && std::ptr::addr_eq(self.view, other.view)
    }
}

impl Eq for TypedAddress<'_> {}

impl fmt::Debug for TypedAddress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedAddress({:#x}, {:?})", self.address, self.width)
    }
}
