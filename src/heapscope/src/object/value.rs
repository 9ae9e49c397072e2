//! Typed field reads

use super::ObjectModel;
use crate::address::Width;
use crate::class::FieldDescriptor;
use crate::error::{DecodeError, Result};
use crate::source::Endian;
use serde::Serialize;

/// Primitive element and field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    /// Parse a one-letter type code (`I`, `J`, ...)
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'Z' => Some(PrimitiveType::Boolean),
            'B' => Some(PrimitiveType::Byte),
            'C' => Some(PrimitiveType::Char),
            'S' => Some(PrimitiveType::Short),
            'I' => Some(PrimitiveType::Int),
            'J' => Some(PrimitiveType::Long),
            'F' => Some(PrimitiveType::Float),
            'D' => Some(PrimitiveType::Double),
            _ => None,
        }
    }

    /// Map a primitive class name (`int`, `boolean`, ...) to its type
    pub fn from_class_name(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(PrimitiveType::Boolean),
            "byte" => Some(PrimitiveType::Byte),
            "char" => Some(PrimitiveType::Char),
            "short" => Some(PrimitiveType::Short),
            "int" => Some(PrimitiveType::Int),
            "long" => Some(PrimitiveType::Long),
            "float" => Some(PrimitiveType::Float),
            "double" => Some(PrimitiveType::Double),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Char => 'C',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Float => 'F',
            PrimitiveType::Double => 'D',
        }
    }

    /// Size of one array element of this type
    pub fn size(self) -> u64 {
        match self {
            PrimitiveType::Boolean | PrimitiveType::Byte => 1,
            PrimitiveType::Char | PrimitiveType::Short => 2,
            PrimitiveType::Int | PrimitiveType::Float => 4,
            PrimitiveType::Long | PrimitiveType::Double => 8,
        }
    }

    pub(crate) fn decode(self, bytes: &[u8], endian: Endian) -> FieldValue {
        let raw = endian.read_uint(bytes);
        match self {
            PrimitiveType::Boolean => FieldValue::Boolean(raw != 0),
            PrimitiveType::Byte => FieldValue::Byte(raw as u8 as i8),
            PrimitiveType::Char => FieldValue::Char(raw as u16),
            PrimitiveType::Short => FieldValue::Short(raw as u16 as i16),
            PrimitiveType::Int => FieldValue::Int(raw as u32 as i32),
            PrimitiveType::Long => FieldValue::Long(raw as i64),
            PrimitiveType::Float => FieldValue::Float(f32::from_bits(raw as u32)),
            PrimitiveType::Double => FieldValue::Double(f64::from_bits(raw)),
        }
    }
}

/// Decoded value of a field or array element
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Object address, 0 for null
    Reference(u64),
    /// Inline value; `base` is where the inline class's field offsets apply
    Flattened { class: u64, base: u64 },
}

impl ObjectModel<'_> {
    /// Read `width` bytes at `object + header + offset`
    fn read_instance(&self, object: u64, offset: u64, width: Width) -> Result<u64> {
        Ok(self
            .session
            .at(self.data_start(object) + offset, width)
            .deref()?)
    }

    pub fn read_int(&self, object: u64, offset: u64) -> Result<i32> {
        Ok(self.read_instance(object, offset, Width::W32)? as u32 as i32)
    }

    pub fn read_long(&self, object: u64, offset: u64) -> Result<i64> {
        Ok(self.read_instance(object, offset, Width::W64)? as i64)
    }

    pub fn read_float(&self, object: u64, offset: u64) -> Result<f32> {
        Ok(f32::from_bits(self.read_instance(object, offset, Width::W32)? as u32))
    }

    pub fn read_double(&self, object: u64, offset: u64) -> Result<f64> {
        Ok(f64::from_bits(self.read_instance(object, offset, Width::W64)?))
    }

    /// Booleans occupy a 4-byte slot; any nonzero value is true
    pub fn read_boolean(&self, object: u64, offset: u64) -> Result<bool> {
        Ok(self.read_instance(object, offset, Width::W32)? != 0)
    }

    pub fn read_char(&self, object: u64, offset: u64) -> Result<u16> {
        Ok(self.read_instance(object, offset, Width::W32)? as u16)
    }

    pub fn read_short(&self, object: u64, offset: u64) -> Result<i16> {
        Ok(self.read_instance(object, offset, Width::W32)? as u16 as i16)
    }

    pub fn read_byte(&self, object: u64, offset: u64) -> Result<i8> {
        Ok(self.read_instance(object, offset, Width::W32)? as u8 as i8)
    }

    /// Read a reference field; `None` for null
    pub fn read_reference(&self, object: u64, offset: u64) -> Result<Option<u64>> {
        let address = self
            .session
            .read_reference(self.data_start(object) + offset)?;
        Ok((address != 0).then_some(address))
    }

    /// Read any field described by `field`, instance or static
    pub fn read_field(&self, object: u64, field: &FieldDescriptor) -> Result<FieldValue> {
        if field.is_static {
            return self.read_static(field);
        }

        if let Some(class) = field.flattened_class {
            return Ok(FieldValue::Flattened {
                class,
                // Offsets of pre-padded inline classes can sit just before the container's data
                base: self
                    .data_start(object)
                    .wrapping_add(field.offset_or_static_address),
            });
        }

        let offset = field.offset_or_static_address;
        match primitive_of(field)? {
            Some(PrimitiveType::Long) => Ok(FieldValue::Long(self.read_long(object, offset)?)),
            Some(PrimitiveType::Double) => {
                Ok(FieldValue::Double(self.read_double(object, offset)?))
            }
            Some(PrimitiveType::Float) => Ok(FieldValue::Float(self.read_float(object, offset)?)),
            Some(other) => {
                let raw = self.read_instance(object, offset, Width::W32)?;
                Ok(narrow_single(other, raw as u32))
            }
            None => Ok(FieldValue::Reference(
                self.read_reference(object, offset)?.unwrap_or(0),
            )),
        }
    }

    /// Read a static field at its absolute slot address
    pub fn read_static(&self, field: &FieldDescriptor) -> Result<FieldValue> {
        let address = field.offset_or_static_address;
        match primitive_of(field)? {
            Some(PrimitiveType::Long) => Ok(FieldValue::Long(self.session.read_u64(address)? as i64)),
            Some(PrimitiveType::Double) => Ok(FieldValue::Double(f64::from_bits(
                self.session.read_u64(address)?,
            ))),
            Some(other) => Ok(narrow_single(other, self.session.read_u32(address)?)),
            // Static reference slots are pointer-wide and never compressed
            None => Ok(FieldValue::Reference(self.session.read_ptr(address)?)),
        }
    }

    /// Decode every instance field of `object`, superclass fields first
    pub fn field_values(&self, object: u64) -> Result<Vec<(FieldDescriptor, FieldValue)>> {
        let class = self.class_of(object)?;
        let fields = self.session.classes().instance_fields(class)?;
        fields
            .into_iter()
            .map(|field| {
                let value = self.read_field(object, &field)?;
                Ok((field, value))
            })
            .collect()
    }
}

fn primitive_of(field: &FieldDescriptor) -> Result<Option<PrimitiveType>> {
    let mut chars = field.signature.chars();
    match (chars.next(), chars.next()) {
        (Some('L' | '[' | 'Q'), _) => Ok(None),
        (Some(code), None) => PrimitiveType::from_code(code).map(Some).ok_or_else(|| {
            DecodeError::corrupt(
                "field signature",
                field.declaring_class,
                "primitive code or reference",
                &field.signature,
            )
        }),
        _ => Err(DecodeError::corrupt(
            "field signature",
            field.declaring_class,
            "primitive code or reference",
            &field.signature,
        )),
    }
}

fn narrow_single(kind: PrimitiveType, raw: u32) -> FieldValue {
    match kind {
        PrimitiveType::Boolean => FieldValue::Boolean(raw != 0),
        PrimitiveType::Byte => FieldValue::Byte(raw as u8 as i8),
        PrimitiveType::Char => FieldValue::Char(raw as u16),
        PrimitiveType::Short => FieldValue::Short(raw as u16 as i16),
        PrimitiveType::Float => FieldValue::Float(f32::from_bits(raw)),
        _ => FieldValue::Int(raw as i32),
    }
}
