//! Class Metadata Walker
//!
//! Decodes RAM class descriptors: identity, superclass chain, names and
//! signatures, modifiers, array metadata, field layouts and allocated size.

mod fields;
mod modifiers;
mod rom;
mod size;

pub use fields::{FieldDescriptor, HiddenField};
pub use modifiers::{ClassModifiers, FieldModifiers};
pub use rom::{RomClass, RomField};
pub use size::ClassSizeBreakdown;

pub(crate) use fields::read_hidden_fields;

use crate::error::{DecodeError, Result};
use crate::layout::*;
use crate::object::PrimitiveType;
use crate::session::Session;
use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Layout flags stored in the RAM class
    pub struct ClassFlags: u64 {
        const VALUE_TYPE = CLASS_FLAG_VALUE_TYPE;
        const REQUIRES_PREPADDING = CLASS_FLAG_PREPADDING;
        const ALIGN8 = CLASS_FLAG_ALIGN8;
        const FLATTENABLE = CLASS_FLAG_FLATTENABLE;
    }
}

/// Decoded RAM class
///
/// `superclasses[depth - 1]` is the direct superclass; a root class has
/// depth 0 and no superclass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassDescriptor {
    pub address: u64,
    pub rom_class: u64,
    /// Superclass addresses, root first
    pub superclasses: Vec<u64>,
    pub depth_and_flags: u32,
    pub depth: u32,
    /// Address of the vtable header
    pub vtable: u64,
    pub is_array: bool,
}

/// Array class metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArrayClassInfo {
    pub arity: u32,
    pub component_type: u64,
    pub leaf_component_type: u64,
    /// Bytes per element of this array class
    pub element_size: u64,
}

/// Class decoding bound to a session
#[derive(Clone, Copy)]
pub struct ClassWalker<'s> {
    session: &'s Session,
}

impl<'s> ClassWalker<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Decode the RAM class at `address`
    pub fn class(&self, address: u64) -> Result<ClassDescriptor> {
        let session = self.session;
        let eyecatcher = session.read_slot(address, RAM_EYECATCHER)? as u32;
        if eyecatcher != RAM_CLASS_EYECATCHER {
            return Err(DecodeError::corrupt(
                "class eyecatcher",
                address,
                format!("{RAM_CLASS_EYECATCHER:#x}"),
                format!("{eyecatcher:#x}"),
            ));
        }

        let rom_class = session.read_slot(address, RAM_ROM_CLASS)?;
        let superclass_array = session.read_slot(address, RAM_SUPERCLASSES)?;
        let depth_and_flags = session.read_slot(address, RAM_DEPTH_AND_FLAGS)? as u32;
        let depth = depth_and_flags & session.depth_mask()?;

        let pointer = session.pointer_size();
        let superclasses = if depth == 0 {
            Vec::new()
        } else {
            if superclass_array == 0 {
                return Err(DecodeError::corrupt(
                    "superclass array",
                    address + RAM_SUPERCLASSES * pointer,
                    format!("array of {depth} classes"),
                    "null",
                ));
            }
            let bytes = session.read_bytes(superclass_array, (depth as u64 * pointer) as usize)?;
            let endian = session.view().endian();
            bytes
                .chunks_exact(pointer as usize)
                .map(|chunk| endian.read_uint(chunk))
                .collect()
        };

        let extra_modifiers = session.read_u32(rom_class + ROM_EXTRA_MODIFIERS)?;

        Ok(ClassDescriptor {
            address,
            rom_class,
            superclasses,
            depth_and_flags,
            depth,
            vtable: address + RAM_VTABLE_HEADER * pointer,
            is_array: extra_modifiers & EXTRA_MODIFIER_ARRAY != 0,
        })
    }

    /// Direct superclass, `None` for a root class
    pub fn superclass(&self, class: &ClassDescriptor) -> Option<u64> {
        match class.depth {
            0 => None,
            depth => class.superclasses.get(depth as usize - 1).copied(),
        }
    }

    /// Class addresses from the root down to `class` itself
    pub fn chain(&self, class: &ClassDescriptor) -> Vec<u64> {
        let mut chain = class.superclasses.clone();
        chain.push(class.address);
        chain
    }

    pub fn rom_class(&self, class: &ClassDescriptor) -> Result<RomClass> {
        rom::read_rom_class(self.session, class.rom_class)
    }

    pub fn rom_fields(&self, rom: &RomClass) -> Result<Vec<RomField>> {
        rom::read_rom_fields(self.session, rom)
    }

    pub fn name(&self, class: &ClassDescriptor) -> Result<String> {
        Ok(self.rom_class(class)?.name)
    }

    /// Name of the class at `address`
    pub fn class_name(&self, address: u64) -> Result<String> {
        self.name(&self.class(address)?)
    }

    /// Type signature of a class: `I`, `[[J`, `Ljava/lang/String;`
    pub fn signature(&self, class: &ClassDescriptor) -> Result<String> {
        match self.array_info(class)? {
            Some(info) => {
                let leaf = self.class(info.leaf_component_type)?;
                let leaf_name = self.name(&leaf)?;
                let mut signature = "[".repeat(info.arity as usize);
                signature.push_str(&type_signature(&leaf_name));
                Ok(signature)
            }
            None => Ok(type_signature(&self.name(class)?)),
        }
    }

    /// Reflect-style modifiers
    pub fn modifiers(&self, class: &ClassDescriptor) -> Result<ClassModifiers> {
        match self.array_info(class)? {
            Some(info) => {
                let leaf = self.class(info.leaf_component_type)?;
                let leaf_modifiers = self.rom_class(&leaf)?.modifiers;
                Ok(ClassModifiers::reflect_array(leaf_modifiers))
            }
            None => Ok(ClassModifiers::reflect(self.rom_class(class)?.modifiers)),
        }
    }

    /// Arity, component types and element size; `None` for non-array classes
    pub fn array_info(&self, class: &ClassDescriptor) -> Result<Option<ArrayClassInfo>> {
        if !class.is_array {
            return Ok(None);
        }

        let session = self.session;
        let arity_at = class.address + RAM_ARITY * session.pointer_size();
        let arity = session.read_slot(class.address, RAM_ARITY)?;
        if arity == 0 || arity > MAX_ARITY {
            return Err(DecodeError::corrupt(
                "array arity",
                arity_at,
                format!("1..={MAX_ARITY}"),
                arity,
            ));
        }

        let component_type = session.read_slot(class.address, RAM_COMPONENT_TYPE)?;
        let leaf_component_type = session.read_slot(class.address, RAM_LEAF_COMPONENT_TYPE)?;
        if component_type == 0 || leaf_component_type == 0 {
            return Err(DecodeError::corrupt(
                "array component type",
                class.address,
                "non-null component classes",
                "null",
            ));
        }

        let element_size = if arity == 1 {
            let leaf_name = self.class_name(leaf_component_type)?;
            match PrimitiveType::from_class_name(&leaf_name) {
                Some(primitive) => primitive.size(),
                None => session.reference_size(),
            }
        } else {
            session.reference_size()
        };

        Ok(Some(ArrayClassInfo {
            arity: arity as u32,
            component_type,
            leaf_component_type,
            element_size,
        }))
    }

    pub fn class_flags(&self, address: u64) -> Result<ClassFlags> {
        Ok(ClassFlags::from_bits_truncate(
            self.session.read_slot(address, RAM_CLASS_FLAGS)?,
        ))
    }

    /// Instance size in bytes, excluding the object header
    pub fn total_instance_size(&self, address: u64) -> Result<u64> {
        self.session.read_slot(address, RAM_TOTAL_INSTANCE_SIZE)
    }
}

/// Signature of a named type, special-casing primitive class names
fn type_signature(name: &str) -> String {
    if name == "void" {
        return "V".to_string();
    }
    match PrimitiveType::from_class_name(name) {
        Some(primitive) => primitive.code().to_string(),
        None => format!("L{name};"),
    }
}
