//! Shared-cache offset encodings
//!
//! Older caches store a signed 32-bit offset from the wrapper record. Layered
//! caches store a `J9ShrOffset { layer, reserved, offset }` relative to the
//! base of one cache layer. Zero means absent in both.

use crate::error::{DecodeError, Result};
use serde::Serialize;

/// A decoded offset slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum SharedCacheOffset {
    None,
    LegacyRelative { offset: i32 },
    LayeredOffset { layer: u8, offset: u64 },
}

impl SharedCacheOffset {
    pub fn legacy(offset: i32) -> Self {
        if offset == 0 {
            Self::None
        } else {
            Self::LegacyRelative { offset }
        }
    }

    pub fn layered(layer: u8, offset: u64) -> Self {
        if offset == 0 {
            Self::None
        } else {
            Self::LayeredOffset { layer, offset }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Turn the offset into an absolute address
    ///
    /// `record` is the address of the wrapper record holding the slot. Layered
    /// offsets need the layer base table; a layer index past its end is corrupt.
    pub fn resolve(&self, record: u64, layer_bases: Option<&[u64]>) -> Result<Option<u64>> {
        match *self {
            Self::None => Ok(None),
            Self::LegacyRelative { offset } => record
                .checked_add_signed(offset as i64)
                .map(Some)
                .ok_or_else(|| {
                    DecodeError::corrupt("shared cache offset", record, "target inside the address space", offset)
                }),
            Self::LayeredOffset { layer, offset } => {
                let Some(bases) = layer_bases else {
                    return Err(DecodeError::Unsupported {
                        capability: "layered offsets without layer bases",
                    });
                };
                let base = bases.get(layer as usize).copied().ok_or_else(|| {
                    DecodeError::corrupt(
                        "shared cache layer",
                        record,
                        format!("layer below {}", bases.len()),
                        layer,
                    )
                })?;
                base.checked_add(offset).map(Some).ok_or_else(|| {
                    DecodeError::corrupt("shared cache offset", record, "target inside the address space", offset)
                })
            }
        }
    }
}

/// Where one field of a wrapper record lives under each encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordField {
    pub record: &'static str,
    pub name: &'static str,
    pub legacy: u64,
    pub layered: u64,
}

const fn field(record: &'static str, name: &'static str, legacy: u64, layered: u64) -> RecordField {
    RecordField {
        record,
        name,
        legacy,
        layered,
    }
}

// -- ROMClassWrapper --
pub const ROM_CLASS_WRAPPER_CLASSPATH: RecordField = field("ROMClassWrapper", "classpath", 0, 0);
pub const ROM_CLASS_WRAPPER_CPE_INDEX: RecordField = field("ROMClassWrapper", "cpeIndex", 4, 16);
pub const ROM_CLASS_WRAPPER_TIMESTAMP: RecordField = field("ROMClassWrapper", "timestamp", 8, 24);
pub const ROM_CLASS_WRAPPER_ROM_CLASS: RecordField = field("ROMClassWrapper", "romClass", 16, 32);

// -- ScopedROMClassWrapper --
pub const SCOPED_WRAPPER_MODULE_CONTEXT: RecordField =
    field("ScopedROMClassWrapper", "modContext", 24, 48);
pub const SCOPED_WRAPPER_PARTITION: RecordField = field("ScopedROMClassWrapper", "partition", 28, 64);

// -- OrphanWrapper --
pub const ORPHAN_WRAPPER_ROM_CLASS: RecordField = field("OrphanWrapper", "romClass", 0, 0);

// -- CompiledMethodWrapper --
pub const COMPILED_METHOD_DATA_LENGTH: RecordField = field("CompiledMethodWrapper", "dataLength", 0, 0);
pub const COMPILED_METHOD_CODE_LENGTH: RecordField = field("CompiledMethodWrapper", "codeLength", 4, 4);
pub const COMPILED_METHOD_ROM_METHOD: RecordField = field("CompiledMethodWrapper", "romMethod", 8, 8);

// -- ByteDataWrapper --
pub const BYTE_DATA_LENGTH: RecordField = field("ByteDataWrapper", "dataLength", 0, 0);
pub const BYTE_DATA_EXTERNAL_BLOCK: RecordField = field("ByteDataWrapper", "externalBlock", 4, 8);
pub const BYTE_DATA_TOKEN: RecordField = field("ByteDataWrapper", "token", 8, 24);
pub const BYTE_DATA_TYPE: RecordField = field("ByteDataWrapper", "dataType", 12, 40);
pub const BYTE_DATA_PRIVATE_USE: RecordField = field("ByteDataWrapper", "inPrivateUse", 13, 41);
pub const BYTE_DATA_OWNER: RecordField = field("ByteDataWrapper", "privateOwnerID", 14, 42);

// -- AttachedDataWrapper --
pub const ATTACHED_DATA_CACHE_OFFSET: RecordField = field("AttachedDataWrapper", "cacheOffset", 0, 0);
pub const ATTACHED_DATA_LENGTH: RecordField = field("AttachedDataWrapper", "dataLength", 4, 16);
pub const ATTACHED_DATA_TYPE: RecordField = field("AttachedDataWrapper", "type", 8, 20);
pub const ATTACHED_DATA_UPDATE_COUNT: RecordField = field("AttachedDataWrapper", "updateCount", 10, 22);
pub const ATTACHED_DATA_CORRUPT: RecordField = field("AttachedDataWrapper", "corrupt", 12, 24);

// -- CharArrayWrapper --
pub const CHAR_ARRAY_ROM_STRING: RecordField = field("CharArrayWrapper", "romString", 0, 0);
