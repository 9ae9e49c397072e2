//! Shared class cache command handlers

use anyhow::{bail, Context, Result};
use heapscope::shared::{MetadataItem, RecordKind};
use heapscope::{Session, WrapperRecord};
use serde::Serialize;
use tracing::debug;

/// Parse a record kind name such as `rom-class`
pub fn parse_kind(name: &str) -> Result<RecordKind> {
    match RecordKind::from_name(name) {
        Some(kind) => Ok(kind),
        None => {
            let known: Vec<&str> = RecordKind::ALL.iter().map(|kind| kind.name()).collect();
            bail!("Unknown record kind '{}' (expected one of: {})", name, known.join(", "))
        }
    }
}

/// Layer base addresses, `None` when the cache is not layered
fn layer_bases(layers: &[u64]) -> Option<&[u64]> {
    (!layers.is_empty()).then_some(layers)
}

/// Handle the Shrc Record command
pub fn handle_record(
    session: &Session,
    address: u64,
    kind: &str,
    layers: &[u64],
    json: bool,
) -> Result<()> {
    let kind = parse_kind(kind)?;
    let record = session
        .shared_cache()
        .record(address, kind, layer_bases(layers))
        .with_context(|| format!("Failed to decode {} record at {:#x}", kind.name(), address))?;

    if json {
        return super::print_json(&record);
    }
    println!("{} record at {:#x}:", kind.name(), address);
    for line in describe_record(&record) {
        println!("  {}", line);
    }
    Ok(())
}

/// Field lines for a decoded record
fn describe_record(record: &WrapperRecord) -> Vec<String> {
    let location = |label: &str, target: Option<u64>| match target {
        Some(address) => format!("{:<14}{:#x}", label, address),
        None => format!("{:<14}none", label),
    };

    match record {
        WrapperRecord::RomClass(r) => vec![
            location("ROM class:", r.rom_class),
            location("Classpath:", r.classpath),
            format!("{:<14}{}", "Entry index:", r.cpe_index),
            format!("{:<14}{}", "Timestamp:", r.timestamp),
        ],
        WrapperRecord::ScopedRomClass(r) => vec![
            location("ROM class:", r.wrapper.rom_class),
            location("Classpath:", r.wrapper.classpath),
            location("Module:", r.module_context),
            location("Partition:", r.partition),
        ],
        WrapperRecord::Orphan(r) => vec![location("ROM class:", r.rom_class)],
        WrapperRecord::CompiledMethod(r) => vec![
            location("Method:", r.rom_method),
            format!("{:<14}{} bytes", "Data:", r.data_length),
            format!("{:<14}{} bytes", "Code:", r.code_length),
        ],
        WrapperRecord::ByteData(r) => vec![
            format!("{:<14}{}", "Type:", r.data_type),
            format!("{:<14}{} bytes", "Length:", r.data_length),
            location("Token:", r.token),
            location("External:", r.external_block),
            format!(
                "{:<14}{}",
                "Private:",
                if r.in_private_use {
                    format!("owner {}", r.private_owner)
                } else {
                    "no".to_string()
                }
            ),
        ],
        WrapperRecord::AttachedData(r) => vec![
            location("Method:", r.cache_offset),
            format!("{:<14}{}", "Type:", r.data_type),
            format!("{:<14}{} bytes", "Length:", r.data_length),
            format!("{:<14}{}", "Updates:", r.update_count),
            format!("{:<14}{}", "Corrupt:", r.corrupt),
        ],
        WrapperRecord::CharArray(r) => vec![location("String:", r.rom_string)],
    }
}

#[derive(Serialize)]
struct ItemEntry {
    #[serde(flatten)]
    item: MetadataItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<WrapperRecord>,
}

/// Handle the Shrc Items command
///
/// Walks `[start, end)` from the top down. A malformed item ends the walk
/// with an error after the items decoded so far are printed.
pub fn handle_items(
    session: &Session,
    start: u64,
    end: u64,
    records: bool,
    skip_stale: bool,
    layers: &[u64],
    json: bool,
) -> Result<()> {
    let cache = session.shared_cache();
    let mut entries = Vec::new();
    let mut failure = None;

    for item in cache.items(start, end) {
        let item = match item {
            Ok(item) => item,
            Err(err) => {
                failure = Some(err);
                break;
            }
        };
        if skip_stale && item.stale {
            continue;
        }
        let record = if records {
            cache.item_record(&item, layer_bases(layers))?
        } else {
            None
        };
        entries.push(ItemEntry { item, record });
    }
    debug!(count = entries.len(), "walked metadata items");

    if json {
        super::print_json(&entries)?;
    } else {
        println!("Metadata items in {:#x}..{:#x}:", start, end);
        for entry in &entries {
            let item = &entry.item;
            println!(
                "  {:#x}  {:<20} {:>8} bytes  jvm {}{}",
                item.address,
                format!("{:?}", item.data_type),
                item.data_len,
                item.jvm_id,
                if item.stale { "  [stale]" } else { "" }
            );
            if let Some(record) = &entry.record {
                for line in describe_record(record) {
                    println!("      {}", line);
                }
            }
        }
        println!("{} items", entries.len());
    }

    match failure {
        Some(err) => Err(err).context("Metadata walk stopped at a malformed item"),
        None => Ok(()),
    }
}
