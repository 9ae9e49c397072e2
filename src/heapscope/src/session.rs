//! Decoder session
//!
//! A [`Session`] binds one target image to its resolved profile and owns every
//! cache the decoders use. Two sessions never share state, so inspecting two
//! images at once is safe.

use crate::address::{TypedAddress, Width};
use crate::class::{ClassWalker, FieldDescriptor, HiddenField};
use crate::error::{DecodeError, Result};
use crate::flattened::{FlattenedEntry, FlattenedFields};
use crate::memtag::TagChecker;
use crate::object::{HeaderLayout, ObjectModel, StringLayout};
use crate::profile::{PointerWidth, SessionProfile};
use crate::shared::SharedCache;
use crate::source::MemoryView;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::debug;

/// Key of the field descriptor cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct FieldKey {
    pub class: u64,
    pub name: String,
    pub signature: String,
}

/// Decoder context for one target image
pub struct Session {
    view: Arc<dyn MemoryView>,
    profile: SessionProfile,
    header_layout: OnceCell<HeaderLayout>,
    depth_mask: OnceCell<u32>,
    hidden_fields: OnceCell<Arc<Vec<HiddenField>>>,
    /// Resolved lookups; `None` records a field the class chain does not declare
    pub(crate) field_cache: DashMap<FieldKey, Option<FieldDescriptor>>,
    pub(crate) string_layouts: DashMap<u64, StringLayout>,
    pub(crate) flattened_tables: DashMap<u64, Arc<Vec<FlattenedEntry>>>,
}

impl Session {
    /// Bind a view to a profile; the profile is validated once here
    pub fn new(view: Arc<dyn MemoryView>, profile: SessionProfile) -> Result<Self> {
        profile.validate()?;
        debug!(abi = ?profile.abi, capabilities = ?profile.capabilities, "session opened");
        Ok(Self {
            view,
            profile,
            header_layout: OnceCell::new(),
            depth_mask: OnceCell::new(),
            hidden_fields: OnceCell::new(),
            field_cache: DashMap::new(),
            string_layouts: DashMap::new(),
            flattened_tables: DashMap::new(),
        })
    }

    /// Probe the runtime descriptor at `root` and open a session on the result
    pub fn probe(view: Arc<dyn MemoryView>, root: u64) -> Result<Self> {
        let profile = SessionProfile::probe(view.as_ref(), root)?;
        Self::new(view, profile)
    }

    pub fn view(&self) -> &dyn MemoryView {
        self.view.as_ref()
    }

    pub fn profile(&self) -> &SessionProfile {
        &self.profile
    }

    pub fn objects(&self) -> ObjectModel<'_> {
        ObjectModel::new(self)
    }

    pub fn classes(&self) -> ClassWalker<'_> {
        ClassWalker::new(self)
    }

    pub fn shared_cache(&self) -> SharedCache<'_> {
        SharedCache::new(self)
    }

    pub fn tags(&self) -> TagChecker<'_> {
        TagChecker::new(self)
    }

    pub fn flattened(&self) -> FlattenedFields<'_> {
        FlattenedFields::new(self)
    }

    /// Drop every cached descriptor, for callers re-attaching to a new image state
    pub fn reset_caches(&mut self) {
        self.header_layout = OnceCell::new();
        self.depth_mask = OnceCell::new();
        self.hidden_fields = OnceCell::new();
        self.field_cache.clear();
        self.string_layouts.clear();
        self.flattened_tables.clear();
        debug!("session caches reset");
    }

    /// Number of cached field lookups, misses included
    pub fn cached_fields(&self) -> usize {
        self.field_cache.len()
    }

    // -- Session constants --

    pub fn pointer_size(&self) -> u64 {
        self.profile.abi.pointer_size()
    }

    pub fn reference_size(&self) -> u64 {
        self.profile.abi.reference_size()
    }

    pub(crate) fn pointer_width(&self) -> Width {
        match self.profile.abi.pointer_width {
            PointerWidth::Bits32 => Width::W32,
            PointerWidth::Bits64 => Width::W64,
        }
    }

    pub(crate) fn reference_width(&self) -> Width {
        if self.reference_size() == 4 {
            Width::W32
        } else {
            Width::W64
        }
    }

    pub fn header_layout(&self) -> &HeaderLayout {
        self.header_layout
            .get_or_init(|| HeaderLayout::for_abi(&self.profile.abi))
    }

    pub(crate) fn depth_mask(&self) -> Result<u32> {
        self.depth_mask
            .get_or_try_init(|| self.profile.versions.depth_mask())
            .copied()
    }

    pub(crate) fn hidden_fields(&self) -> Result<Arc<Vec<HiddenField>>> {
        self.hidden_fields
            .get_or_try_init(|| crate::class::read_hidden_fields(self).map(Arc::new))
            .cloned()
    }

    // -- Typed reads --

    pub fn at(&self, address: u64, width: Width) -> TypedAddress<'_> {
        TypedAddress::new(self.view.as_ref(), address, width)
    }

    pub(crate) fn read_u8(&self, address: u64) -> Result<u8> {
        Ok(self.at(address, Width::W8).deref()? as u8)
    }

    pub(crate) fn read_u16(&self, address: u64) -> Result<u16> {
        Ok(self.at(address, Width::W16).deref()? as u16)
    }

    pub(crate) fn read_u32(&self, address: u64) -> Result<u32> {
        Ok(self.at(address, Width::W32).deref()? as u32)
    }

    pub(crate) fn read_i32(&self, address: u64) -> Result<i32> {
        Ok(self.at(address, Width::W32).deref_signed()? as i32)
    }

    pub(crate) fn read_u64(&self, address: u64) -> Result<u64> {
        Ok(self.at(address, Width::W64).deref()?)
    }

    pub(crate) fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>> {
        Ok(self.view.read_bytes(address, length)?)
    }

    /// Read a native pointer-sized value
    pub(crate) fn read_ptr(&self, address: u64) -> Result<u64> {
        Ok(self.at(address, self.pointer_width()).deref()?)
    }

    /// Read pointer-sized slot `slot` of the structure at `base`
    pub(crate) fn read_slot(&self, base: u64, slot: u64) -> Result<u64> {
        self.read_ptr(base + slot * self.pointer_size())
    }

    /// Read a heap reference slot and decompress it
    pub(crate) fn read_reference(&self, address: u64) -> Result<u64> {
        let raw = self.at(address, self.reference_width()).deref()?;
        Ok(self.decompress(raw))
    }

    pub(crate) fn decompress(&self, raw: u64) -> u64 {
        if self.profile.abi.compressed_references {
            raw << self.profile.constants.compressed_shift
        } else {
            raw
        }
    }

    /// Follow a self-relative pointer; a zero offset is absent
    pub(crate) fn read_srp(&self, address: u64) -> Result<Option<u64>> {
        let delta = self.at(address, Width::W32).deref_signed()?;
        if delta == 0 {
            return Ok(None);
        }
        address
            .checked_add_signed(delta)
            .map(Some)
            .ok_or_else(|| DecodeError::corrupt("self-relative pointer", address, "in-range target", delta))
    }
}
