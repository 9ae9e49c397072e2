//! Metadata item walk
//!
//! ```text
//! low                                                      high (metadata end)
//!   ... [ ShcItem | data ... | ShcItemHdr ][ ShcItem | data ... | ShcItemHdr ]
//!       ^ item               ^ header    ^ end of the previous (higher) item
//! ```
//!
//! Items are added from the top of the metadata area downward, so the walk
//! starts at the end and steps down by each header's `itemLen`.

use super::records::RecordKind;
use super::{SharedCache, WrapperRecord};
use crate::error::{DecodeError, Result};
use crate::layout::*;
use crate::session::Session;
use serde::Serialize;

/// `ShcItem.dataType` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    RomClass = 1,
    Classpath = 2,
    Orphan = 3,
    CompiledMethod = 4,
    Scope = 5,
    ScopedRomClass = 6,
    ByteData = 7,
    UnindexedByteData = 8,
    CharArray = 9,
    Cachelet = 10,
    AttachedData = 11,
    PrereqCache = 12,
}

impl ItemType {
    pub fn from_raw(raw: u16) -> Option<Self> {
        Some(match raw {
            1 => ItemType::RomClass,
            2 => ItemType::Classpath,
            3 => ItemType::Orphan,
            4 => ItemType::CompiledMethod,
            5 => ItemType::Scope,
            6 => ItemType::ScopedRomClass,
            7 => ItemType::ByteData,
            8 => ItemType::UnindexedByteData,
            9 => ItemType::CharArray,
            10 => ItemType::Cachelet,
            11 => ItemType::AttachedData,
            12 => ItemType::PrereqCache,
            _ => return None,
        })
    }

    /// Wrapper record stored as the item's data, for types that have one
    pub fn record_kind(self) -> Option<RecordKind> {
        match self {
            ItemType::RomClass => Some(RecordKind::RomClass),
            ItemType::Orphan => Some(RecordKind::Orphan),
            ItemType::CompiledMethod => Some(RecordKind::CompiledMethod),
            ItemType::ScopedRomClass => Some(RecordKind::ScopedRomClass),
            ItemType::ByteData | ItemType::UnindexedByteData => Some(RecordKind::ByteData),
            ItemType::CharArray => Some(RecordKind::CharArray),
            ItemType::AttachedData => Some(RecordKind::AttachedData),
            ItemType::Classpath | ItemType::Scope | ItemType::Cachelet | ItemType::PrereqCache => None,
        }
    }
}

/// One metadata item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetadataItem {
    /// Address of the `ShcItem`
    pub address: u64,
    /// Address of the `ShcItemHdr`
    pub header: u64,
    pub item_len: u32,
    pub stale: bool,
    pub data_len: u32,
    pub data_type: ItemType,
    pub jvm_id: u16,
    /// Start of the item data
    pub data: u64,
}

impl SharedCache<'_> {
    /// Decode the wrapper record an item carries
    ///
    /// `None` for item types whose data is not a wrapper record.
    pub fn item_record(
        &self,
        item: &MetadataItem,
        layer_bases: Option<&[u64]>,
    ) -> Result<Option<WrapperRecord>> {
        item.data_type
            .record_kind()
            .map(|kind| self.record(item.data, kind, layer_bases))
            .transpose()
    }
}

/// Iterator over the items of a metadata range, highest first
///
/// Stops after the first error.
pub struct ItemWalker<'s> {
    session: &'s Session,
    start: u64,
    cursor: u64,
    done: bool,
}

impl<'s> ItemWalker<'s> {
    pub(crate) fn new(session: &'s Session, start: u64, end: u64) -> Self {
        Self {
            session,
            start,
            cursor: end,
            done: false,
        }
    }

    fn next_item(&mut self) -> Result<MetadataItem> {
        let session = self.session;
        let end = self.cursor;
        let header = end - SHC_ITEM_HDR_SIZE;
        let raw_len = session.read_u32(header)?;
        let item_len = raw_len & !SHC_ITEM_STALE;

        let min_len = SHC_ITEM_SIZE + SHC_ITEM_HDR_SIZE;
        let address = end.checked_sub(item_len as u64).filter(|&address| address >= self.start);
        let Some(address) = address.filter(|_| item_len as u64 >= min_len) else {
            return Err(DecodeError::corrupt(
                "metadata item length",
                header,
                format!("{min_len}..={}", end - self.start),
                item_len,
            ));
        };

        let data_len = session.read_u32(address)?;
        let raw_type = session.read_u16(address + 4)?;
        let jvm_id = session.read_u16(address + 6)?;
        if data_len as u64 + min_len > item_len as u64 {
            return Err(DecodeError::corrupt(
                "metadata item data length",
                address,
                format!("at most {}", item_len as u64 - min_len),
                data_len,
            ));
        }
        let data_type = ItemType::from_raw(raw_type).ok_or_else(|| {
            DecodeError::corrupt("metadata item type", address + 4, "1..=12", raw_type)
        })?;

        self.cursor = address;
        Ok(MetadataItem {
            address,
            header,
            item_len,
            stale: raw_len & SHC_ITEM_STALE != 0,
            data_len,
            data_type,
            jvm_id,
            data: address + SHC_ITEM_SIZE,
        })
    }
}

impl Iterator for ItemWalker<'_> {
    type Item = Result<MetadataItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor < self.start + SHC_ITEM_HDR_SIZE {
            return None;
        }
        let item = self.next_item();
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}
