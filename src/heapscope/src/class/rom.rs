//! ROM class and ROM field shape reads
//!
//! ROM structures use self-relative pointers and byte offsets rather than
//! pointer-sized slots, so their layout does not depend on the pointer width.

use crate::error::{DecodeError, Result};
use crate::layout::*;
use crate::session::Session;
use serde::Serialize;

/// Read-only part of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RomClass {
    pub address: u64,
    pub rom_size: u32,
    pub name: String,
    pub superclass_name: Option<String>,
    pub modifiers: u32,
    pub extra_modifiers: u32,
    pub interface_count: u32,
    pub method_count: u32,
    pub field_count: u32,
    pub fields: Option<u64>,
    pub object_statics: u32,
    pub double_statics: u32,
    pub single_statics: u32,
    pub ram_constant_pool_count: u32,
    pub rom_constant_pool_count: u32,
}

impl RomClass {
    pub fn is_array(&self) -> bool {
        self.extra_modifiers & EXTRA_MODIFIER_ARRAY != 0
    }
}

/// One entry of a ROM class's field table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RomField {
    /// Address of the field shape, the identity used by hidden and flattened tables
    pub address: u64,
    pub name: String,
    pub signature: String,
    pub modifiers: u32,
}

impl RomField {
    pub fn is_static(&self) -> bool {
        self.modifiers & FIELD_STATIC != 0
    }

    pub fn is_object(&self) -> bool {
        self.modifiers & FIELD_OBJECT != 0
    }

    /// Occupies 8 bytes (long or double)
    pub fn is_double(&self) -> bool {
        self.modifiers & FIELD_DOUBLE != 0 && !self.is_object()
    }
}

/// Read a length-prefixed UTF8 record
pub(crate) fn read_utf8(session: &Session, address: u64) -> Result<String> {
    let length = session.read_u16(address)?;
    if length > MAX_UTF8_LEN {
        return Err(DecodeError::corrupt(
            "utf8 length",
            address,
            format!("at most {MAX_UTF8_LEN}"),
            length,
        ));
    }
    let bytes = session.read_bytes(address + 2, length as usize)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Follow an SRP to a UTF8 record; a null SRP is corrupt
fn read_utf8_srp(session: &Session, address: u64, what: &'static str) -> Result<String> {
    match session.read_srp(address)? {
        Some(target) => read_utf8(session, target),
        None => Err(DecodeError::corrupt(what, address, "non-null name", 0)),
    }
}

pub(crate) fn read_rom_class(session: &Session, address: u64) -> Result<RomClass> {
    let u32_at = |offset: u64| session.read_u32(address + offset);

    let superclass_name = session
        .read_srp(address + ROM_SUPERCLASS_NAME)?
        .map(|target| read_utf8(session, target))
        .transpose()?;

    Ok(RomClass {
        address,
        rom_size: u32_at(ROM_SIZE)?,
        name: read_utf8_srp(session, address + ROM_CLASS_NAME, "class name")?,
        superclass_name,
        modifiers: u32_at(ROM_MODIFIERS)?,
        extra_modifiers: u32_at(ROM_EXTRA_MODIFIERS)?,
        interface_count: u32_at(ROM_INTERFACE_COUNT)?,
        method_count: u32_at(ROM_METHOD_COUNT)?,
        field_count: u32_at(ROM_FIELD_COUNT)?,
        fields: session.read_srp(address + ROM_FIELDS)?,
        object_statics: u32_at(ROM_OBJECT_STATICS)?,
        double_statics: u32_at(ROM_DOUBLE_STATICS)?,
        single_statics: u32_at(ROM_SINGLE_STATICS)?,
        ram_constant_pool_count: u32_at(ROM_RAM_CP_COUNT)?,
        rom_constant_pool_count: u32_at(ROM_ROM_CP_COUNT)?,
    })
}

/// Read one field shape, returning it with the address of the next shape
pub(crate) fn read_field_shape(session: &Session, address: u64) -> Result<(RomField, u64)> {
    let name = read_utf8_srp(session, address, "field name")?;
    let signature = read_utf8_srp(session, address + 4, "field signature")?;
    let modifiers = session.read_u32(address + 8)?;

    let mut next = address + FIELD_SHAPE_SIZE;
    if modifiers & FIELD_STATIC != 0 && modifiers & FIELD_HAS_CONSTANT != 0 {
        next += if modifiers & FIELD_DOUBLE != 0 { 8 } else { 4 };
    }
    if modifiers & FIELD_HAS_GENERIC_SIGNATURE != 0 {
        next += 4;
    }
    if modifiers & FIELD_HAS_ANNOTATIONS != 0 {
        let length = session.read_u32(next)? as u64;
        next += 4 + length.next_multiple_of(4);
    }

    Ok((
        RomField {
            address,
            name,
            signature,
            modifiers,
        },
        next,
    ))
}

/// Read every field shape of a ROM class, in declaration order
pub(crate) fn read_rom_fields(session: &Session, rom: &RomClass) -> Result<Vec<RomField>> {
    let Some(mut cursor) = rom.fields else {
        if rom.field_count != 0 {
            return Err(DecodeError::corrupt(
                "rom field table",
                rom.address + ROM_FIELDS,
                format!("table for {} fields", rom.field_count),
                "null",
            ));
        }
        return Ok(Vec::new());
    };

    let end = rom.address + rom.rom_size as u64;
    let mut fields = Vec::with_capacity(rom.field_count.min(1024) as usize);
    for _ in 0..rom.field_count {
        if rom.rom_size != 0 && cursor >= end {
            return Err(DecodeError::corrupt(
                "rom field table",
                cursor,
                format!("shape inside rom class ending at {end:#x}"),
                format!("{cursor:#x}"),
            ));
        }
        let (field, next) = read_field_shape(session, cursor)?;
        fields.push(field);
        cursor = next;
    }
    Ok(fields)
}
