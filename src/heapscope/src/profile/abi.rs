//! ABI flags selecting which variant of a structure is in use

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};

/// Native pointer width of the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    pub fn bytes(self) -> u64 {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }
}

impl TryFrom<u32> for PointerWidth {
    type Error = String;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            32 => Ok(PointerWidth::Bits32),
            64 => Ok(PointerWidth::Bits64),
            other => Err(format!("pointer width must be 32 or 64, got {other}")),
        }
    }
}

impl From<PointerWidth> for u32 {
    fn from(width: PointerWidth) -> u32 {
        match width {
            PointerWidth::Bits32 => 32,
            PointerWidth::Bits64 => 64,
        }
    }
}

/// Resolved ABI of the target build
///
/// `compressed_references` is the effective mode: for a mixed-reference build
/// it is the runtime's choice, otherwise the build's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiProfile {
    pub pointer_width: PointerWidth,
    pub compressed_references: bool,
    pub mixed_reference_mode: bool,
    pub data_address_present: bool,
}

impl AbiProfile {
    /// Size of a native pointer in bytes
    pub fn pointer_size(&self) -> u64 {
        self.pointer_width.bytes()
    }

    /// Size of a heap reference slot in bytes
    pub fn reference_size(&self) -> u64 {
        if self.compressed_references || self.pointer_width == PointerWidth::Bits32 {
            4
        } else {
            8
        }
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.compressed_references && self.pointer_width == PointerWidth::Bits32 {
            return Err(DecodeError::InvalidProfile(
                "compressed references require a 64-bit target".into(),
            ));
        }
        Ok(())
    }
}
