//! Algorithm version registry
//!
//! Named integers read from the target that select historical structure
//! shapes. Asking for a name the registry was never given is a caller bug
//! and fails with [`DecodeError::UnknownVersion`].

use crate::error::{DecodeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Width of the depth field packed into `depthAndFlags`
pub const CLASS_DEPTH_VERSION: &str = "CLASS_DEPTH_VERSION";

/// Backing-store shape of `java.lang.String`
pub const STRING_LAYOUT_VERSION: &str = "STRING_LAYOUT_VERSION";

/// Encoding of shared-cache wrapper record offsets
pub const SHARED_CACHE_OFFSET_VERSION: &str = "SHARED_CACHE_OFFSET_VERSION";

/// How a String stores its characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StringEncoding {
    /// `value:[C` plus `count:I`, compression flagged in the count's sign bit
    CharArrayWithCount,
    /// `value:[B` plus `coder:B`
    ByteArrayWithCoder,
}

/// How wrapper records reference their data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OffsetEncoding {
    /// 32-bit offset relative to the record
    Legacy,
    /// `{ layer, offset }` relative to a cache layer's base
    Layered,
}

/// Name to integer table of algorithm versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionRegistry {
    versions: BTreeMap<String, u32>,
}

impl VersionRegistry {
    pub fn empty() -> Self {
        Self {
            versions: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: u32) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: u32) {
        self.versions.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Result<u32> {
        self.versions
            .get(name)
            .copied()
            .ok_or_else(|| DecodeError::UnknownVersion(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.versions.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Mask extracting the class depth from `depthAndFlags`
    pub fn depth_mask(&self) -> Result<u32> {
        match self.get(CLASS_DEPTH_VERSION)? {
            0 => Ok(0xFFFF),
            1 => Ok(0x7FFF),
            _ => Err(DecodeError::Unsupported {
                capability: "class depth encoding",
            }),
        }
    }

    pub fn string_encoding(&self) -> Result<StringEncoding> {
        match self.get(STRING_LAYOUT_VERSION)? {
            0 => Ok(StringEncoding::CharArrayWithCount),
            1 => Ok(StringEncoding::ByteArrayWithCoder),
            _ => Err(DecodeError::Unsupported {
                capability: "string layout",
            }),
        }
    }

    pub fn offset_encoding(&self) -> Result<OffsetEncoding> {
        match self.get(SHARED_CACHE_OFFSET_VERSION)? {
            0 => Ok(OffsetEncoding::Legacy),
            1 => Ok(OffsetEncoding::Layered),
            _ => Err(DecodeError::Unsupported {
                capability: "shared cache offset encoding",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_name_is_configuration_error() {
        let registry = VersionRegistry::empty().with(CLASS_DEPTH_VERSION, 0);
        assert_eq!(
            registry.get("NO_SUCH_VERSION"),
            Err(DecodeError::UnknownVersion("NO_SUCH_VERSION".into()))
        );
        assert!(matches!(
            registry.string_encoding(),
            Err(DecodeError::UnknownVersion(_))
        ));
    }

    #[test]
    fn test_depth_mask_by_version() {
        let v0 = VersionRegistry::empty().with(CLASS_DEPTH_VERSION, 0);
        let v1 = VersionRegistry::empty().with(CLASS_DEPTH_VERSION, 1);
        let v9 = VersionRegistry::empty().with(CLASS_DEPTH_VERSION, 9);

        assert_eq!(v0.depth_mask().unwrap(), 0xFFFF);
        assert_eq!(v1.depth_mask().unwrap(), 0x7FFF);
        assert!(matches!(
            v9.depth_mask(),
            Err(DecodeError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_encodings() {
        let registry = VersionRegistry::empty()
            .with(STRING_LAYOUT_VERSION, 1)
            .with(SHARED_CACHE_OFFSET_VERSION, 0);

        assert_eq!(
            registry.string_encoding().unwrap(),
            StringEncoding::ByteArrayWithCoder
        );
        assert_eq!(registry.offset_encoding().unwrap(), OffsetEncoding::Legacy);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_from_toml_table() {
        let registry: VersionRegistry =
            toml::from_str("CLASS_DEPTH_VERSION = 1\nSTRING_LAYOUT_VERSION = 0\n").unwrap();
        assert_eq!(registry.get(CLASS_DEPTH_VERSION).unwrap(), 1);
        assert_eq!(
            registry.string_encoding().unwrap(),
            StringEncoding::CharArrayWithCount
        );
    }
}
