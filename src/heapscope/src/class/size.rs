//! Allocated size of a RAM class
//!
//! The size is accumulated from seven fragments in allocation order. Array
//! classes have no method table, instance description, static slots or
//! constant pool; those fragments are `None` for them.

use super::{ClassDescriptor, ClassWalker, RomClass};
use crate::error::{DecodeError, Result};
use crate::layout::*;
use serde::Serialize;

/// Per-fragment sizes in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassSizeBreakdown {
    /// Fixed slots, vtable header and vtable, plus the JIT vtable when present
    pub header_and_vtable: u64,
    pub method_table: Option<u64>,
    pub superclasses: u64,
    pub instance_description: Option<u64>,
    pub interface_table: u64,
    pub statics: Option<u64>,
    pub constant_pool: Option<u64>,
}

impl ClassSizeBreakdown {
    pub fn total(&self) -> u64 {
        [
            Some(self.header_and_vtable),
            self.method_table,
            Some(self.superclasses),
            self.instance_description,
            Some(self.interface_table),
            self.statics,
            self.constant_pool,
        ]
        .into_iter()
        .flatten()
        .sum()
    }
}

const MAX_ITABLE_ENTRIES: u64 = 65_536;

impl ClassWalker<'_> {
    /// Size of every fragment of the class at `address`
    pub fn size_breakdown(&self, address: u64) -> Result<ClassSizeBreakdown> {
        let class = self.class(address)?;
        let rom = self.rom_class(&class)?;

        let mut breakdown = ClassSizeBreakdown {
            header_and_vtable: self.header_and_vtable_size(&class)?,
            method_table: None,
            superclasses: self.superclass_array_size(&class),
            instance_description: None,
            interface_table: self.interface_table_size(&class)?,
            statics: None,
            constant_pool: None,
        };
        if !class.is_array {
            breakdown.method_table = Some(self.method_table_size(&rom));
            breakdown.instance_description = Some(self.instance_description_size(&class)?);
            breakdown.statics = Some(self.statics_size(&rom));
            breakdown.constant_pool = Some(self.constant_pool_size(&rom));
        }
        Ok(breakdown)
    }

    pub fn header_and_vtable_size(&self, class: &ClassDescriptor) -> Result<u64> {
        let pointer = self.session.pointer_size();
        let vtable_size = self.session.read_ptr(class.vtable)?;
        let mut slots = RAM_CLASS_SLOTS + VTABLE_HEADER_SLOTS + vtable_size;
        if self.session.profile().capabilities.jit_vtable {
            slots += VTABLE_HEADER_SLOTS + vtable_size;
        }
        slots
            .checked_mul(pointer)
            .ok_or_else(|| DecodeError::corrupt("vtable size", class.vtable, "addressable size", vtable_size))
    }

    pub fn method_table_size(&self, rom: &RomClass) -> u64 {
        rom.method_count as u64 * RAM_METHOD_SLOTS * self.session.pointer_size()
    }

    /// A root class still has one superclass slot
    pub fn superclass_array_size(&self, class: &ClassDescriptor) -> u64 {
        (class.depth as u64).max(1) * self.session.pointer_size()
    }

    /// Out-of-line reference bitmap, one bit per reference slot of an instance
    pub fn instance_description_size(&self, class: &ClassDescriptor) -> Result<u64> {
        let description = self.session.read_slot(class.address, RAM_INSTANCE_DESCRIPTION)?;
        if description & INSTANCE_DESCRIPTION_INLINE != 0 {
            return Ok(0);
        }
        let pointer = self.session.pointer_size();
        let slots = self.total_instance_size(class.address)? / self.session.reference_size();
        let bits_per_word = pointer * 8;
        Ok(slots.div_ceil(bits_per_word) * pointer)
    }

    pub fn interface_table_size(&self, class: &ClassDescriptor) -> Result<u64> {
        let pointer = self.session.pointer_size();
        let mut entry = self.session.read_slot(class.address, RAM_ITABLE)?;
        let mut total = 0;
        let mut seen = 0;
        while entry != 0 {
            seen += 1;
            if seen > MAX_ITABLE_ENTRIES {
                return Err(DecodeError::corrupt(
                    "interface table",
                    class.address,
                    format!("at most {MAX_ITABLE_ENTRIES} entries"),
                    "longer chain or cycle",
                ));
            }
            let interface = self.class(self.session.read_slot(entry, 0)?)?;
            let methods = self.rom_class(&interface)?.method_count as u64;
            total += (ITABLE_HEADER_SLOTS + methods) * pointer;
            entry = self.session.read_slot(entry, 1)?;
        }
        Ok(total)
    }

    pub fn statics_size(&self, rom: &RomClass) -> u64 {
        let pointer = self.session.pointer_size();
        (rom.object_statics as u64 + rom.single_statics as u64) * pointer
            + rom.double_statics as u64 * 8
    }

    pub fn constant_pool_size(&self, rom: &RomClass) -> u64 {
        rom.ram_constant_pool_count as u64 * RAM_CP_ENTRY_SLOTS * self.session.pointer_size()
    }
}
