//! Command handlers
//!
//! Each handler decodes through a [`heapscope::Session`] and prints either a
//! human-readable report or, with `--json`, the library's serialized types.

pub mod class;
pub mod configure;
pub mod object;
pub mod profile;
pub mod read;
pub mod shrc;
pub mod tags;

use anyhow::{Context, Result};
use heapscope::FieldValue;
use serde::Serialize;

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

/// One-line rendering of a decoded value
pub fn format_value(value: &FieldValue) -> String {
    match *value {
        FieldValue::Boolean(v) => v.to_string(),
        FieldValue::Byte(v) => v.to_string(),
        FieldValue::Char(v) => match char::from_u32(v as u32) {
            Some(c) if !c.is_control() => format!("'{}' ({:#06x})", c, v),
            _ => format!("{:#06x}", v),
        },
        FieldValue::Short(v) => v.to_string(),
        FieldValue::Int(v) => v.to_string(),
        FieldValue::Long(v) => v.to_string(),
        FieldValue::Float(v) => v.to_string(),
        FieldValue::Double(v) => v.to_string(),
        FieldValue::Reference(0) => "null".to_string(),
        FieldValue::Reference(address) => format!("{:#x}", address),
        FieldValue::Flattened { class, base } => {
            format!("inline {:#x} at {:#x}", class, base)
        }
    }
}
