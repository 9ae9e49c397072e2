//! Typed wrapper record decoders
//!
//! Every offset slot goes through [`SharedCache::resolve`]; the decoders only
//! choose which [`RecordField`] to hand it.

use super::offset::*;
use super::SharedCache;
use crate::error::{DecodeError, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RomClassWrapper {
    pub address: u64,
    pub classpath: Option<u64>,
    pub cpe_index: i16,
    pub timestamp: i64,
    pub rom_class: Option<u64>,
}

/// ROM class wrapper carrying a module context and partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScopedRomClassWrapper {
    pub wrapper: RomClassWrapper,
    pub module_context: Option<u64>,
    pub partition: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrphanWrapper {
    pub address: u64,
    pub rom_class: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompiledMethodWrapper {
    pub address: u64,
    pub data_length: u32,
    pub code_length: u32,
    pub rom_method: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteDataWrapper {
    pub address: u64,
    pub data_length: u32,
    pub external_block: Option<u64>,
    pub token: Option<u64>,
    pub data_type: u8,
    pub in_private_use: bool,
    pub private_owner: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttachedDataWrapper {
    pub address: u64,
    /// ROM method the data is attached to
    pub cache_offset: Option<u64>,
    pub data_length: u32,
    pub data_type: u16,
    pub update_count: u16,
    pub corrupt: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CharArrayWrapper {
    pub address: u64,
    pub rom_string: Option<u64>,
}

/// Wrapper record shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    RomClass,
    ScopedRomClass,
    Orphan,
    CompiledMethod,
    ByteData,
    AttachedData,
    CharArray,
}

impl RecordKind {
    pub const ALL: [RecordKind; 7] = [
        RecordKind::RomClass,
        RecordKind::ScopedRomClass,
        RecordKind::Orphan,
        RecordKind::CompiledMethod,
        RecordKind::ByteData,
        RecordKind::AttachedData,
        RecordKind::CharArray,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RecordKind::RomClass => "rom-class",
            RecordKind::ScopedRomClass => "scoped-rom-class",
            RecordKind::Orphan => "orphan",
            RecordKind::CompiledMethod => "compiled-method",
            RecordKind::ByteData => "byte-data",
            RecordKind::AttachedData => "attached-data",
            RecordKind::CharArray => "char-array",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Any decoded wrapper record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WrapperRecord {
    RomClass(RomClassWrapper),
    ScopedRomClass(ScopedRomClassWrapper),
    Orphan(OrphanWrapper),
    CompiledMethod(CompiledMethodWrapper),
    ByteData(ByteDataWrapper),
    AttachedData(AttachedDataWrapper),
    CharArray(CharArrayWrapper),
}

impl SharedCache<'_> {
    /// Decode the record at `record` as `kind`
    pub fn record(
        &self,
        record: u64,
        kind: RecordKind,
        layer_bases: Option<&[u64]>,
    ) -> Result<WrapperRecord> {
        Ok(match kind {
            RecordKind::RomClass => WrapperRecord::RomClass(self.rom_class_wrapper(record, layer_bases)?),
            RecordKind::ScopedRomClass => {
                WrapperRecord::ScopedRomClass(self.scoped_rom_class_wrapper(record, layer_bases)?)
            }
            RecordKind::Orphan => WrapperRecord::Orphan(self.orphan_wrapper(record, layer_bases)?),
            RecordKind::CompiledMethod => {
                WrapperRecord::CompiledMethod(self.compiled_method_wrapper(record, layer_bases)?)
            }
            RecordKind::ByteData => WrapperRecord::ByteData(self.byte_data_wrapper(record, layer_bases)?),
            RecordKind::AttachedData => {
                WrapperRecord::AttachedData(self.attached_data_wrapper(record, layer_bases)?)
            }
            RecordKind::CharArray => WrapperRecord::CharArray(self.char_array_wrapper(record, layer_bases)?),
        })
    }

    pub fn rom_class_wrapper(&self, record: u64, layer_bases: Option<&[u64]>) -> Result<RomClassWrapper> {
        Ok(RomClassWrapper {
            address: record,
            classpath: self.resolve(record, &ROM_CLASS_WRAPPER_CLASSPATH, layer_bases)?,
            cpe_index: self.read_u16(record, &ROM_CLASS_WRAPPER_CPE_INDEX)? as i16,
            timestamp: self.read_u64(record, &ROM_CLASS_WRAPPER_TIMESTAMP)? as i64,
            rom_class: self.resolve(record, &ROM_CLASS_WRAPPER_ROM_CLASS, layer_bases)?,
        })
    }

    pub fn scoped_rom_class_wrapper(
        &self,
        record: u64,
        layer_bases: Option<&[u64]>,
    ) -> Result<ScopedRomClassWrapper> {
        Ok(ScopedRomClassWrapper {
            wrapper: self.rom_class_wrapper(record, layer_bases)?,
            module_context: self.resolve(record, &SCOPED_WRAPPER_MODULE_CONTEXT, layer_bases)?,
            partition: self.resolve(record, &SCOPED_WRAPPER_PARTITION, layer_bases)?,
        })
    }

    pub fn orphan_wrapper(&self, record: u64, layer_bases: Option<&[u64]>) -> Result<OrphanWrapper> {
        Ok(OrphanWrapper {
            address: record,
            rom_class: self.resolve(record, &ORPHAN_WRAPPER_ROM_CLASS, layer_bases)?,
        })
    }

    pub fn compiled_method_wrapper(
        &self,
        record: u64,
        layer_bases: Option<&[u64]>,
    ) -> Result<CompiledMethodWrapper> {
        Ok(CompiledMethodWrapper {
            address: record,
            data_length: self.read_u32(record, &COMPILED_METHOD_DATA_LENGTH)?,
            code_length: self.read_u32(record, &COMPILED_METHOD_CODE_LENGTH)?,
            rom_method: self.resolve(record, &COMPILED_METHOD_ROM_METHOD, layer_bases)?,
        })
    }

    pub fn byte_data_wrapper(&self, record: u64, layer_bases: Option<&[u64]>) -> Result<ByteDataWrapper> {
        let in_private_use = match self.read_u8(record, &BYTE_DATA_PRIVATE_USE)? {
            0 => false,
            1 => true,
            other => {
                return Err(DecodeError::corrupt(
                    "byte data private use flag",
                    self.field_address(record, &BYTE_DATA_PRIVATE_USE)?,
                    "0 or 1",
                    other,
                ))
            }
        };
        Ok(ByteDataWrapper {
            address: record,
            data_length: self.read_u32(record, &BYTE_DATA_LENGTH)?,
            external_block: self.resolve(record, &BYTE_DATA_EXTERNAL_BLOCK, layer_bases)?,
            token: self.resolve(record, &BYTE_DATA_TOKEN, layer_bases)?,
            data_type: self.read_u8(record, &BYTE_DATA_TYPE)?,
            in_private_use,
            private_owner: self.read_u16(record, &BYTE_DATA_OWNER)?,
        })
    }

    pub fn attached_data_wrapper(
        &self,
        record: u64,
        layer_bases: Option<&[u64]>,
    ) -> Result<AttachedDataWrapper> {
        Ok(AttachedDataWrapper {
            address: record,
            cache_offset: self.resolve(record, &ATTACHED_DATA_CACHE_OFFSET, layer_bases)?,
            data_length: self.read_u32(record, &ATTACHED_DATA_LENGTH)?,
            data_type: self.read_u16(record, &ATTACHED_DATA_TYPE)?,
            update_count: self.read_u16(record, &ATTACHED_DATA_UPDATE_COUNT)?,
            corrupt: self.read_i32(record, &ATTACHED_DATA_CORRUPT)?,
        })
    }

    pub fn char_array_wrapper(&self, record: u64, layer_bases: Option<&[u64]>) -> Result<CharArrayWrapper> {
        Ok(CharArrayWrapper {
            address: record,
            rom_string: self.resolve(record, &CHAR_ARRAY_ROM_STRING, layer_bases)?,
        })
    }
}
