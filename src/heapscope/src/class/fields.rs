//! Field layout and the field descriptor cache
//!
//! Instance offsets are only meaningful for the whole class chain: every class
//! starts where its superclass ended, so resolving one field lays out the
//! chain from the root down. Results are cached per
//! `(class, name, signature)` for the life of the session.

use super::rom::{read_field_shape, read_utf8, RomField};
use super::{ClassFlags, ClassWalker};
use crate::error::{DecodeError, Result};
use crate::layout::*;
use crate::session::{FieldKey, Session};
use serde::Serialize;
use tracing::trace;

/// Layout of one field
///
/// `offset_or_static_address` is an offset from the end of the object header
/// for instance fields and an absolute slot address for statics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub signature: String,
    pub offset_or_static_address: u64,
    pub is_static: bool,
    /// Injected by the runtime rather than declared
    pub is_hidden: bool,
    pub is_flattened: bool,
    pub declaring_class: u64,
    pub modifiers: u32,
    /// Inline class of a flattened field
    pub flattened_class: Option<u64>,
}

/// A runtime-injected instance field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HiddenField {
    /// Name of the class the field is injected into
    pub class_name: String,
    pub field: RomField,
    /// Offset the runtime recorded when it laid out the class
    pub recorded_offset: u64,
}

const MAX_HIDDEN_FIELDS: usize = 4096;

/// Walk the hidden field list named by the profile
pub(crate) fn read_hidden_fields(session: &Session) -> Result<Vec<HiddenField>> {
    let Some(head) = session.profile().constants.hidden_fields else {
        return Ok(Vec::new());
    };

    let mut fields = Vec::new();
    let mut record = head;
    while record != 0 {
        if fields.len() == MAX_HIDDEN_FIELDS {
            return Err(DecodeError::corrupt(
                "hidden field list",
                head,
                format!("at most {MAX_HIDDEN_FIELDS} records"),
                "longer list or cycle",
            ));
        }
        let class_name = read_utf8(session, session.read_slot(record, 0)?)?;
        let (field, _) = read_field_shape(session, session.read_slot(record, 1)?)?;
        fields.push(HiddenField {
            class_name,
            field,
            recorded_offset: session.read_slot(record, 2)?,
        });
        record = session.read_slot(record, HIDDEN_FIELD_SLOTS - 1)?;
    }

    trace!(count = fields.len(), "read hidden fields");
    Ok(fields)
}

/// A field waiting for placement
struct Pending {
    field: RomField,
    hidden: bool,
    inline: Option<Inline>,
}

struct Inline {
    class: u64,
    align8: bool,
    prepadding: u64,
    size: u64,
}

impl ClassWalker<'_> {
    /// Every instance field of the chain ending at `class`, superclass fields first
    pub fn instance_fields(&self, class: u64) -> Result<Vec<FieldDescriptor>> {
        let descriptor = self.class(class)?;
        let mut cursor = if self.class_flags(class)?.contains(ClassFlags::REQUIRES_PREPADDING) {
            FLATTENED_PREPADDING
        } else {
            0
        };

        let mut fields = Vec::new();
        for link in self.chain(&descriptor) {
            let (placed, end) = self.layout_class(link, cursor)?;
            fields.extend(placed);
            cursor = end;
        }
        Ok(fields)
    }

    /// Static fields declared by `class` itself, with absolute slot addresses
    pub fn static_fields(&self, class: u64) -> Result<Vec<FieldDescriptor>> {
        let descriptor = self.class(class)?;
        let rom = self.rom_class(&descriptor)?;
        let statics: Vec<RomField> = self
            .rom_fields(&rom)?
            .into_iter()
            .filter(RomField::is_static)
            .collect();
        if statics.is_empty() {
            return Ok(Vec::new());
        }

        let base = self.session.read_slot(class, RAM_STATICS)?;
        if base == 0 {
            return Err(DecodeError::corrupt(
                "static slots",
                class + RAM_STATICS * self.session.pointer_size(),
                format!("storage for {} statics", statics.len()),
                "null",
            ));
        }

        let pointer = self.session.pointer_size();
        let objects = statics.iter().filter(|f| f.is_object()).count() as u64;
        let doubles = statics.iter().filter(|f| f.is_double()).count() as u64;
        let mut object_slot = base;
        let mut double_slot = (base + objects * pointer).next_multiple_of(8);
        let mut single_slot = double_slot + doubles * 8;

        let mut out = Vec::with_capacity(statics.len());
        for field in statics {
            let slot = if field.is_object() {
                object_slot += pointer;
                object_slot - pointer
            } else if field.is_double() {
                double_slot += 8;
                double_slot - 8
            } else {
                single_slot += pointer;
                single_slot - pointer
            };
            out.push(descriptor_for(field, class, slot, true, false, None));
        }
        Ok(out)
    }

    /// Resolve one field by name and signature, searching from `class` up to the root
    ///
    /// Repeated lookups are served from the session cache without reading memory.
    pub fn find_field(
        &self,
        class: u64,
        name: &str,
        signature: &str,
    ) -> Result<Option<FieldDescriptor>> {
        let key = FieldKey {
            class,
            name: name.to_string(),
            signature: signature.to_string(),
        };
        if let Some(hit) = self.session.field_cache.get(&key) {
            return Ok(hit.value().clone());
        }

        trace!(class = format_args!("{class:#x}"), name, signature, "field cache miss");
        for field in self.visible_fields(class)? {
            // Leaf-most declaration wins, including against a racing insert
            self.session
                .field_cache
                .entry(FieldKey {
                    class,
                    name: field.name.clone(),
                    signature: field.signature.clone(),
                })
                .or_insert(Some(field));
        }

        Ok(self
            .session
            .field_cache
            .entry(key)
            .or_insert(None)
            .value()
            .clone())
    }

    /// First field named `name` in `class` or its superclasses, any signature
    pub fn field_by_name(&self, class: u64, name: &str) -> Result<Option<FieldDescriptor>> {
        Ok(self
            .visible_fields(class)?
            .into_iter()
            .find(|field| field.name == name))
    }

    /// Instance and static fields, leaf class first
    fn visible_fields(&self, class: u64) -> Result<Vec<FieldDescriptor>> {
        let descriptor = self.class(class)?;
        let instance = self.instance_fields(class)?;

        let mut out = Vec::with_capacity(instance.len());
        for link in self.chain(&descriptor).into_iter().rev() {
            out.extend(
                instance
                    .iter()
                    .filter(|field| field.declaring_class == link)
                    .cloned(),
            );
            out.extend(self.static_fields(link)?);
        }
        Ok(out)
    }

    /// Place the instance fields declared by `class` starting at `start`
    fn layout_class(&self, class: u64, start: u64) -> Result<(Vec<FieldDescriptor>, u64)> {
        let descriptor = self.class(class)?;
        let rom = self.rom_class(&descriptor)?;
        let reference = self.session.reference_size();

        let mut declared: Vec<Pending> = self
            .rom_fields(&rom)?
            .into_iter()
            .filter(|field| !field.is_static())
            .map(|field| Pending {
                field,
                hidden: false,
                inline: None,
            })
            .collect();
        for hidden in self.session.hidden_fields()?.iter() {
            if hidden.class_name == rom.name && !hidden.field.is_static() {
                declared.push(Pending {
                    field: hidden.field.clone(),
                    hidden: true,
                    inline: None,
                });
            }
        }
        self.mark_flattened(class, &mut declared)?;

        let (mut doubles, mut flattened, mut objects, mut singles) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for pending in declared {
            if pending.inline.is_some() {
                flattened.push(pending);
            } else if pending.field.is_object() {
                objects.push(pending);
            } else if pending.field.is_double() {
                doubles.push(pending);
            } else {
                singles.push(pending);
            }
        }

        let mut placed: Vec<(u64, FieldDescriptor)> = Vec::new();
        let mut cursor = start;
        let place = |pending: Pending, at: u64, offset: u64, placed: &mut Vec<(u64, FieldDescriptor)>| {
            let inline = pending.inline.as_ref().map(|inline| inline.class);
            placed.push((
                at,
                descriptor_for(pending.field, class, offset, false, pending.hidden, inline),
            ));
        };

        let needs_align8 = !doubles.is_empty()
            || flattened.iter().any(|p| p.inline.as_ref().is_some_and(|i| i.align8))
            || (!objects.is_empty() && reference == 8);
        if needs_align8 && cursor % 8 != 0 {
            let backfill = if !singles.is_empty() {
                Some(singles.remove(0))
            } else if reference == 4 && !objects.is_empty() {
                Some(objects.remove(0))
            } else {
                None
            };
            if let Some(pending) = backfill {
                place(pending, cursor, cursor, &mut placed);
            }
            cursor += 4;
        }

        for pending in doubles {
            place(pending, cursor, cursor, &mut placed);
            cursor += 8;
        }

        for pending in flattened {
            let Some(inline) = pending.inline.as_ref() else {
                continue;
            };
            cursor = cursor.next_multiple_of(if inline.align8 { 8 } else { 4 });
            let size = inline.size;
            let offset = cursor.wrapping_sub(inline.prepadding);
            place(pending, cursor, offset, &mut placed);
            cursor += size;
        }

        if !objects.is_empty() {
            cursor = cursor.next_multiple_of(reference);
        }
        for pending in objects {
            place(pending, cursor, cursor, &mut placed);
            cursor += reference;
        }

        for pending in singles {
            place(pending, cursor, cursor, &mut placed);
            cursor += 4;
        }

        placed.sort_by_key(|(at, _)| *at);
        Ok((placed.into_iter().map(|(_, field)| field).collect(), cursor))
    }

    /// Attach inline class details to fields listed in the class's flattened cache
    fn mark_flattened(&self, class: u64, declared: &mut [Pending]) -> Result<()> {
        if !self.session.profile().capabilities.flattened_fields {
            return Ok(());
        }
        let table = self.session.flattened().table(class)?;
        if table.is_empty() {
            return Ok(());
        }

        for pending in declared.iter_mut() {
            let Some(entry) = table.iter().find(|e| e.field_shape == pending.field.address) else {
                continue;
            };
            let flags = self.class_flags(entry.class)?;
            let prepadding = if flags.contains(ClassFlags::REQUIRES_PREPADDING) {
                FLATTENED_PREPADDING
            } else {
                0
            };
            let total = self.total_instance_size(entry.class)?;
            pending.inline = Some(Inline {
                class: entry.class,
                align8: flags.contains(ClassFlags::ALIGN8),
                prepadding,
                size: total.saturating_sub(prepadding),
            });
        }
        Ok(())
    }
}

fn descriptor_for(
    field: RomField,
    class: u64,
    offset: u64,
    is_static: bool,
    is_hidden: bool,
    flattened_class: Option<u64>,
) -> FieldDescriptor {
    FieldDescriptor {
        name: field.name,
        signature: field.signature,
        offset_or_static_address: offset,
        is_static,
        is_hidden,
        is_flattened: flattened_class.is_some(),
        declaring_class: class,
        modifiers: field.modifiers,
        flattened_class,
    }
}
