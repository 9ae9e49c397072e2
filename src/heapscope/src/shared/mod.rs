//! Shared class cache metadata
//!
//! Wrapper records in the cache metadata area point at ROM classes, methods
//! and data blocks through offset slots. Which encoding those slots use is a
//! property of the cache version, so it is decided once from the session's
//! algorithm versions rather than per record.

mod items;
mod offset;
mod records;

pub use items::{ItemType, ItemWalker, MetadataItem};
pub use offset::*;
pub use records::{
    AttachedDataWrapper, ByteDataWrapper, CharArrayWrapper, CompiledMethodWrapper, OrphanWrapper,
    RecordKind, RomClassWrapper, ScopedRomClassWrapper, WrapperRecord,
};

use crate::error::{DecodeError, Result};
use crate::layout::*;
use crate::profile::OffsetEncoding;
use crate::session::Session;

/// Shared cache decoding bound to a session
#[derive(Clone, Copy)]
pub struct SharedCache<'s> {
    session: &'s Session,
}

impl<'s> SharedCache<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    pub fn encoding(&self) -> Result<OffsetEncoding> {
        self.session.profile().versions.offset_encoding()
    }

    fn layered(&self) -> Result<bool> {
        Ok(self.encoding()? == OffsetEncoding::Layered)
    }

    /// Address of `field` in `record` under the active encoding
    pub fn field_address(&self, record: u64, field: &RecordField) -> Result<u64> {
        Ok(record + if self.layered()? { field.layered } else { field.legacy })
    }

    /// Decode an offset slot
    ///
    /// Without layer bases only the legacy slot can be meaningful, so it is
    /// read whatever the cache version says.
    pub fn read_offset(
        &self,
        record: u64,
        field: &RecordField,
        layer_bases: Option<&[u64]>,
    ) -> Result<SharedCacheOffset> {
        if layer_bases.is_none() || !self.layered()? {
            let offset = self.session.read_i32(record + field.legacy)?;
            return Ok(SharedCacheOffset::legacy(offset));
        }

        let slot = record + field.layered;
        let layer = self.session.read_u32(slot)?;
        if layer > MAX_CACHE_LAYER {
            return Err(DecodeError::corrupt(
                "shared cache layer",
                slot,
                format!("at most {MAX_CACHE_LAYER}"),
                layer,
            ));
        }
        let offset = self.session.read_u64(slot + 8)?;
        Ok(SharedCacheOffset::layered(layer as u8, offset))
    }

    /// Resolve an offset slot of `record` to an absolute address
    pub fn resolve(
        &self,
        record: u64,
        field: &RecordField,
        layer_bases: Option<&[u64]>,
    ) -> Result<Option<u64>> {
        self.read_offset(record, field, layer_bases)?
            .resolve(record, layer_bases)
    }

    pub(crate) fn read_u8(&self, record: u64, field: &RecordField) -> Result<u8> {
        self.session.read_u8(self.field_address(record, field)?)
    }

    pub(crate) fn read_u16(&self, record: u64, field: &RecordField) -> Result<u16> {
        self.session.read_u16(self.field_address(record, field)?)
    }

    pub(crate) fn read_u32(&self, record: u64, field: &RecordField) -> Result<u32> {
        self.session.read_u32(self.field_address(record, field)?)
    }

    pub(crate) fn read_i32(&self, record: u64, field: &RecordField) -> Result<i32> {
        self.session.read_i32(self.field_address(record, field)?)
    }

    pub(crate) fn read_u64(&self, record: u64, field: &RecordField) -> Result<u64> {
        self.session.read_u64(self.field_address(record, field)?)
    }

    /// Walk the metadata items of `[start, end)` from the high end down
    pub fn items(&self, start: u64, end: u64) -> ItemWalker<'s> {
        ItemWalker::new(self.session, start, end)
    }
}
