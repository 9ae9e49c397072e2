//! Class and field command handlers

use anyhow::{Context, Result};
use heapscope::class::{ArrayClassInfo, FieldModifiers};
use heapscope::{ClassDescriptor, ClassSizeBreakdown, FieldDescriptor, Session};
use serde::Serialize;

#[derive(Serialize)]
struct ClassReport {
    #[serde(flatten)]
    descriptor: ClassDescriptor,
    name: String,
    signature: String,
    modifiers: Vec<&'static str>,
    superclass_names: Vec<String>,
    instance_size: u64,
    flags: Vec<&'static str>,
    array: Option<ArrayClassInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_fields: Option<Vec<FieldDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    static_fields: Option<Vec<FieldDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<ClassSizeBreakdown>,
}

/// Handle the Class command
pub fn handle(session: &Session, address: u64, fields: bool, size: bool, json: bool) -> Result<()> {
    let classes = session.classes();
    let descriptor = classes
        .class(address)
        .with_context(|| format!("Failed to decode class at {:#x}", address))?;

    let superclass_names = descriptor
        .superclasses
        .iter()
        .map(|&superclass| classes.class_name(superclass))
        .collect::<heapscope::Result<Vec<_>>>()?;

    let (instance_fields, static_fields) = if fields {
        (
            Some(classes.instance_fields(address)?),
            Some(classes.static_fields(address)?),
        )
    } else {
        (None, None)
    };

    let report = ClassReport {
        name: classes.name(&descriptor)?,
        signature: classes.signature(&descriptor)?,
        modifiers: classes.modifiers(&descriptor)?.keywords(),
        superclass_names,
        instance_size: classes.total_instance_size(address)?,
        flags: classes
            .class_flags(address)?
            .iter_names()
            .map(|(name, _)| name)
            .collect(),
        array: classes.array_info(&descriptor)?,
        instance_fields,
        static_fields,
        size: size.then(|| classes.size_breakdown(address)).transpose()?,
        descriptor,
    };

    if json {
        return super::print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &ClassReport) {
    println!("Class {:#x}: {}", report.descriptor.address, report.name);
    println!("  Signature:     {}", report.signature);
    println!("  Modifiers:     {}", report.modifiers.join(" "));
    println!("  ROM class:     {:#x}", report.descriptor.rom_class);
    println!("  Instance size: {} bytes", report.instance_size);
    if !report.flags.is_empty() {
        println!("  Flags:         {}", report.flags.join(" | "));
    }

    println!("  Depth:         {}", report.descriptor.depth);
    for (address, name) in report.descriptor.superclasses.iter().zip(&report.superclass_names) {
        println!("    {:#x} {}", address, name);
    }

    if let Some(array) = &report.array {
        println!(
            "  Array:         arity {}, component {:#x}, leaf {:#x}, {} bytes per element",
            array.arity, array.component_type, array.leaf_component_type, array.element_size
        );
    }

    if let Some(fields) = &report.instance_fields {
        println!();
        println!("Instance fields ({}):", fields.len());
        for field in fields {
            println!("  {}", describe_field(field));
        }
    }
    if let Some(fields) = &report.static_fields {
        println!();
        println!("Static fields ({}):", fields.len());
        for field in fields {
            println!("  {}", describe_field(field));
        }
    }

    if let Some(size) = &report.size {
        println!();
        println!("Allocated size:");
        print_fragment("Header and vtable", Some(size.header_and_vtable));
        print_fragment("Method table", size.method_table);
        print_fragment("Superclasses", Some(size.superclasses));
        print_fragment("Instance description", size.instance_description);
        print_fragment("Interface table", Some(size.interface_table));
        print_fragment("Statics", size.statics);
        print_fragment("Constant pool", size.constant_pool);
        println!("  {:<22}{:>8}", "Total", size.total());
    }
}

fn print_fragment(label: &str, bytes: Option<u64>) {
    match bytes {
        Some(bytes) => println!("  {:<22}{:>8}", label, bytes),
        None => println!("  {:<22}{:>8}", label, "-"),
    }
}

/// One-line field summary: offset, modifiers, signature, name, markers
pub fn describe_field(field: &FieldDescriptor) -> String {
    let location = if field.is_static {
        format!("{:#x}", field.offset_or_static_address)
    } else {
        format!("+{:<5}", field.offset_or_static_address)
    };

    let mut parts = vec![location];
    let keywords = FieldModifiers::reflect(field.modifiers).keywords();
    if !keywords.is_empty() {
        parts.push(keywords.join(" "));
    }
    parts.push(field.signature.clone());
    parts.push(field.name.clone());
    if field.is_hidden {
        parts.push("[hidden]".to_string());
    }
    if let Some(inline) = field.flattened_class {
        parts.push(format!("[flattened {:#x}]", inline));
    }
    parts.join(" ")
}

/// Handle the Field command
///
/// A dotted name is resolved through flattened fields; otherwise the field is
/// looked up by name and, when given, signature.
pub fn handle_field(
    session: &Session,
    class: u64,
    name: &str,
    signature: Option<&str>,
    json: bool,
) -> Result<()> {
    let classes = session.classes();
    let found = match signature {
        _ if name.contains('.') => session.flattened().resolve_path(class, name)?,
        Some(signature) => classes.find_field(class, name, signature)?,
        None => classes.field_by_name(class, name)?,
    };

    if json {
        return super::print_json(&found);
    }

    match found {
        Some(field) => {
            let declaring = classes.class_name(field.declaring_class)?;
            println!("{}", describe_field(&field));
            println!("  Declared by {:#x} {}", field.declaring_class, declaring);
        }
        None => println!("No field '{}' in class {:#x}", name, class),
    }
    Ok(())
}
