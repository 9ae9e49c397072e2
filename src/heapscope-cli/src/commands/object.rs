//! Object, string and array command handlers

use super::format_value;
use anyhow::{bail, Context, Result};
use heapscope::{FieldValue, ObjectHeader, PrimitiveType, Session};
use serde::Serialize;

/// Elements shown when no --length is given
const DEFAULT_ARRAY_WINDOW: u64 = 64;

#[derive(Serialize)]
struct FieldEntry {
    name: String,
    signature: String,
    offset: u64,
    value: FieldValue,
}

#[derive(Serialize)]
struct ObjectReport {
    header: ObjectHeader,
    class_name: String,
    fields: Vec<FieldEntry>,
}

/// Handle the Object command
pub fn handle(session: &Session, address: u64, json: bool) -> Result<()> {
    let objects = session.objects();
    let header = objects
        .header(address)
        .with_context(|| format!("Failed to decode object at {:#x}", address))?;
    let class_name = session.classes().class_name(header.class)?;

    let fields = if header.array.is_some() {
        Vec::new()
    } else {
        objects
            .field_values(address)?
            .into_iter()
            .map(|(field, value)| FieldEntry {
                name: field.name,
                signature: field.signature,
                offset: field.offset_or_static_address,
                value,
            })
            .collect()
    };

    let report = ObjectReport {
        header,
        class_name,
        fields,
    };
    if json {
        return super::print_json(&report);
    }

    let header = &report.header;
    println!("Object {:#x}: {}", header.address, report.class_name);
    println!("  Class:   {:#x}", header.class);
    println!("  Flags:   {:#04x}", header.flags);
    if let Some(monitor) = header.monitor {
        println!("  Monitor: {:#x}", monitor);
    }
    if let Some(array) = &header.array {
        println!("  Array:   {} elements, {:?}", array.size, array.layout);
        return Ok(());
    }

    println!();
    println!("Fields ({}):", report.fields.len());
    for field in &report.fields {
        println!(
            "  +{:<5} {:<24} {} = {}",
            field.offset,
            field.name,
            field.signature,
            format_value(&field.value)
        );
    }
    Ok(())
}

/// Handle the String command
pub fn handle_string(session: &Session, address: u64, json: bool) -> Result<()> {
    let text = session
        .objects()
        .read_string(address)
        .with_context(|| format!("Failed to decode string at {:#x}", address))?;

    if json {
        return super::print_json(&text);
    }
    println!("{:?}", text);
    Ok(())
}

#[derive(Serialize)]
#[serde(untagged)]
enum Elements {
    Primitive(Vec<FieldValue>),
    Reference(Vec<u64>),
}

#[derive(Serialize)]
struct ArrayReport {
    address: u64,
    size: u64,
    start: u64,
    elements: Elements,
}

/// Handle the Array command
///
/// One-dimensional arrays of a primitive leaf type decode to values; all
/// other arrays decode to element references.
pub fn handle_array(
    session: &Session,
    address: u64,
    start: u64,
    length: Option<u64>,
    json: bool,
) -> Result<()> {
    let objects = session.objects();
    let classes = session.classes();

    let class = classes.class(objects.class_of(address)?)?;
    let Some(info) = classes.array_info(&class)? else {
        bail!("Object at {:#x} is not an array", address);
    };

    let size = objects.array_size(address)?;
    let length = window(size, start, length)?;

    let primitive = if info.arity == 1 {
        PrimitiveType::from_class_name(&classes.class_name(info.leaf_component_type)?)
    } else {
        None
    };
    let elements = match primitive {
        Some(element) => {
            Elements::Primitive(objects.read_primitive_array(address, start, length, element)?)
        }
        None => Elements::Reference(objects.read_reference_array(address, start, length)?),
    };

    let report = ArrayReport {
        address,
        size,
        start,
        elements,
    };
    if json {
        return super::print_json(&report);
    }

    println!(
        "Array {:#x}: {} ({} elements)",
        address,
        classes.signature(&class)?,
        size
    );
    match &report.elements {
        Elements::Primitive(values) => {
            for (i, value) in values.iter().enumerate() {
                println!("  [{}] {}", start + i as u64, format_value(value));
            }
        }
        Elements::Reference(references) => {
            for (i, &reference) in references.iter().enumerate() {
                println!(
                    "  [{}] {}",
                    start + i as u64,
                    format_value(&FieldValue::Reference(reference))
                );
            }
        }
    }
    Ok(())
}

/// Number of elements to read from `start`
fn window(size: u64, start: u64, length: Option<u64>) -> Result<u64> {
    if start > size {
        bail!("Start index {} is past the end of a {}-element array", start, size);
    }
    Ok(length.unwrap_or_else(|| (size - start).min(DEFAULT_ARRAY_WINDOW)))
}
