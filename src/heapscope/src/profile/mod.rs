//! Session profile
//!
//! Everything a decoder needs to know about the target build before the first
//! read: ABI flags, algorithm versions, runtime constants and optional
//! capabilities. A profile is either probed from the runtime descriptor or
//! deserialized from a file. There are no built-in defaults.

mod abi;
mod probe;
mod versions;

pub use abi::{AbiProfile, PointerWidth};
pub use versions::{
    OffsetEncoding, StringEncoding, VersionRegistry, CLASS_DEPTH_VERSION,
    SHARED_CACHE_OFFSET_VERSION, STRING_LAYOUT_VERSION,
};

use crate::error::{DecodeError, Result};
use crate::layout::{MAX_COMPRESSED_SHIFT, MAX_LEAF_LOG2, MIN_LEAF_LOG2};
use serde::{Deserialize, Serialize};

/// Optional features of the target build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Value-type fields may be stored inline in their container
    pub flattened_fields: bool,
    /// Classes carry a JIT vtable in front of the RAM class
    pub jit_vtable: bool,
    /// Latin-1 strings are stored compressed
    pub string_compression: bool,
}

/// Runtime-wide constants read from the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConstants {
    /// Bytes per arraylet leaf
    pub arraylet_leaf_size: u64,
    /// Left shift applied when decompressing a reference
    pub compressed_shift: u32,
    /// Head of the hidden instance field list, if the runtime injects any
    #[serde(default)]
    pub hidden_fields: Option<u64>,
}

/// Fully resolved description of one target image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    pub abi: AbiProfile,
    pub versions: VersionRegistry,
    pub constants: RuntimeConstants,
    pub capabilities: Capabilities,
}

impl SessionProfile {
    /// Check internal consistency of a caller-supplied profile
    pub fn validate(&self) -> Result<()> {
        self.abi.validate()?;

        let leaf = self.constants.arraylet_leaf_size;
        let leaf_ok = leaf.is_power_of_two()
            && (MIN_LEAF_LOG2..=MAX_LEAF_LOG2).contains(&leaf.trailing_zeros());
        if !leaf_ok {
            return Err(DecodeError::InvalidProfile(format!(
                "arraylet leaf size {leaf} is not a power of two between 2^{MIN_LEAF_LOG2} and 2^{MAX_LEAF_LOG2}"
            )));
        }

        if self.constants.compressed_shift > MAX_COMPRESSED_SHIFT {
            return Err(DecodeError::InvalidProfile(format!(
                "compressed shift {} exceeds {MAX_COMPRESSED_SHIFT}",
                self.constants.compressed_shift
            )));
        }

        if !self.abi.compressed_references && self.constants.compressed_shift != 0 {
            return Err(DecodeError::InvalidProfile(
                "compressed shift set without compressed references".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_TOML: &str = r#"
[abi]
pointer_width = 64
compressed_references = true
mixed_reference_mode = false
data_address_present = false

[versions]
CLASS_DEPTH_VERSION = 1
STRING_LAYOUT_VERSION = 1
SHARED_CACHE_OFFSET_VERSION = 1

[constants]
arraylet_leaf_size = 65536
compressed_shift = 3

[capabilities]
flattened_fields = true
jit_vtable = false
string_compression = true
"#;

    #[test]
    fn test_profile_from_toml() {
        let profile: SessionProfile = toml::from_str(PROFILE_TOML).unwrap();

        assert_eq!(profile.abi.pointer_width, PointerWidth::Bits64);
        assert_eq!(profile.abi.reference_size(), 4);
        assert_eq!(profile.constants.hidden_fields, None);
        assert_eq!(profile.versions.depth_mask().unwrap(), 0x7FFF);
        assert!(profile.capabilities.flattened_fields);
        profile.validate().unwrap();
    }

    #[test]
    fn test_profile_rejects_bad_pointer_width() {
        let bad = PROFILE_TOML.replace("pointer_width = 64", "pointer_width = 48");
        assert!(toml::from_str::<SessionProfile>(&bad).is_err());
    }

    #[test]
    fn test_profile_requires_every_section() {
        let missing = PROFILE_TOML.replace("[capabilities]", "[other]");
        assert!(toml::from_str::<SessionProfile>(&missing).is_err());
    }

    #[test]
    fn test_validate_leaf_size() {
        let mut profile: SessionProfile = toml::from_str(PROFILE_TOML).unwrap();
        profile.constants.arraylet_leaf_size = 3000;
        assert!(matches!(
            profile.validate(),
            Err(DecodeError::InvalidProfile(_))
        ));

        profile.constants.arraylet_leaf_size = 128;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_validate_shift_without_compression() {
        let mut profile: SessionProfile = toml::from_str(PROFILE_TOML).unwrap();
        profile.abi.compressed_references = false;
        assert!(profile.validate().is_err());

        profile.constants.compressed_shift = 0;
        profile.validate().unwrap();
    }

    #[test]
    fn test_profile_json_roundtrip_keeps_versions() {
        let profile: SessionProfile = toml::from_str(PROFILE_TOML).unwrap();
        let json = serde_json::to_string(&profile).unwrap();
        let back: SessionProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
