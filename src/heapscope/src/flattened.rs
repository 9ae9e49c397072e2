//! Flattened (inline) field resolution
//!
//! A flattened field stores the instance data of its value class directly in
//! the container. The RAM class keeps a cache of `{ class, field shape, offset }`
//! entries for these fields; it is only present on builds with the
//! flattened-fields capability, and every call here fails fast without it.

use crate::class::{ClassFlags, FieldDescriptor};
use crate::error::{DecodeError, Result};
use crate::layout::*;
use crate::session::Session;
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

const MAX_FLATTENED_ENTRIES: u64 = 65_536;

/// One entry of a class's flattened field cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlattenedEntry {
    /// Inline value class
    pub class: u64,
    /// ROM field shape of the flattened field
    pub field_shape: u64,
    pub offset: u64,
}

/// A resolved flattened field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlattenedField {
    pub field: FieldDescriptor,
    pub inline_class: u64,
    /// Offset of the inline data relative to the container's data start, pre-padding removed
    pub offset: u64,
    /// Bytes the inline data occupies in the container
    pub size: u64,
}

#[derive(Clone, Copy)]
pub struct FlattenedFields<'s> {
    session: &'s Session,
}

impl<'s> FlattenedFields<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    pub fn is_supported(&self) -> bool {
        self.session.profile().capabilities.flattened_fields
    }

    fn require(&self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(DecodeError::Unsupported {
                capability: "flattened fields",
            })
        }
    }

    /// Flattened field cache of `class`, read once per session
    pub fn table(&self, class: u64) -> Result<Arc<Vec<FlattenedEntry>>> {
        self.require()?;
        if let Some(hit) = self.session.flattened_tables.get(&class) {
            return Ok(hit.value().clone());
        }

        let table = Arc::new(self.read_table(class)?);
        trace!(class = format_args!("{class:#x}"), entries = table.len(), "read flattened cache");
        Ok(self
            .session
            .flattened_tables
            .entry(class)
            .or_insert(table)
            .value()
            .clone())
    }

    fn read_table(&self, class: u64) -> Result<Vec<FlattenedEntry>> {
        let session = self.session;
        let cache = session.read_slot(class, RAM_FLATTENED_CACHE)?;
        if cache == 0 {
            return Ok(Vec::new());
        }

        let count = session.read_slot(cache, 0)?;
        if count > MAX_FLATTENED_ENTRIES {
            return Err(DecodeError::corrupt(
                "flattened class cache",
                cache,
                format!("at most {MAX_FLATTENED_ENTRIES} entries"),
                count,
            ));
        }

        let pointer = session.pointer_size();
        (0..count)
            .map(|index| {
                let entry = cache + pointer + index * FLATTENED_ENTRY_SLOTS * pointer;
                Ok(FlattenedEntry {
                    class: session.read_slot(entry, 0)?,
                    field_shape: session.read_slot(entry, 1)?,
                    offset: session.read_slot(entry, 2)?,
                })
            })
            .collect()
    }

    /// Resolve the flattened field `name` of `class` or its superclasses
    ///
    /// `None` when no such field exists or the field is stored by reference.
    pub fn resolve(&self, class: u64, name: &str) -> Result<Option<FlattenedField>> {
        self.require()?;
        let Some(field) = self.session.classes().field_by_name(class, name)? else {
            return Ok(None);
        };
        let Some(inline_class) = field.flattened_class else {
            return Ok(None);
        };
        let size = self.inline_size(inline_class)?;
        Ok(Some(FlattenedField {
            offset: field.offset_or_static_address,
            inline_class,
            size,
            field,
        }))
    }

    /// Resolve a dotted path through nested inline classes
    ///
    /// Every segment but the last must be a flattened field. The returned
    /// descriptor carries the offset of the final field relative to the data
    /// start of the outermost container.
    pub fn resolve_path(&self, class: u64, path: &str) -> Result<Option<FieldDescriptor>> {
        self.require()?;
        let classes = self.session.classes();
        let segments: Vec<&str> = path.split('.').collect();
        let Some((last, inner)) = segments.split_last() else {
            return Ok(None);
        };

        let mut container = class;
        let mut offset = 0u64;
        for segment in inner {
            let Some(flattened) = self.resolve(container, segment)? else {
                return Ok(None);
            };
            offset = offset.wrapping_add(flattened.offset);
            container = flattened.inline_class;
        }

        let Some(mut field) = classes.field_by_name(container, last)? else {
            return Ok(None);
        };
        if field.is_static {
            return Ok(Some(field));
        }
        field.offset_or_static_address = offset.wrapping_add(field.offset_or_static_address);
        Ok(Some(field))
    }

    fn inline_size(&self, inline_class: u64) -> Result<u64> {
        let classes = self.session.classes();
        let prepadding = if classes
            .class_flags(inline_class)?
            .contains(ClassFlags::REQUIRES_PREPADDING)
        {
            FLATTENED_PREPADDING
        } else {
            0
        };
        Ok(classes
            .total_instance_size(inline_class)?
            .saturating_sub(prepadding))
    }
}
