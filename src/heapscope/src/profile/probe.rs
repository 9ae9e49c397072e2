//! Profile probing from the runtime descriptor

use super::{AbiProfile, Capabilities, PointerWidth, RuntimeConstants, SessionProfile, VersionRegistry};
use crate::address::{TypedAddress, Width};
use crate::error::{DecodeError, Result};
use crate::layout::*;
use crate::source::MemoryView;
use tracing::debug;

impl SessionProfile {
    /// Resolve a profile by reading the runtime descriptor at `root`
    ///
    /// Every ABI flag and version is read exactly once here; decoders never
    /// probe memory again to choose a structure shape.
    pub fn probe(view: &dyn MemoryView, root: u64) -> Result<SessionProfile> {
        let base = TypedAddress::new(view, root, Width::W32);

        let eyecatcher = base.deref()? as u32;
        if eyecatcher != DESCRIPTOR_EYECATCHER {
            return Err(DecodeError::corrupt(
                "runtime descriptor eyecatcher",
                root,
                format!("{DESCRIPTOR_EYECATCHER:#x}"),
                format!("{eyecatcher:#x}"),
            ));
        }

        let pointer_size = base.add(DESCRIPTOR_POINTER_SIZE).deref()?;
        let pointer_width = match pointer_size {
            4 => PointerWidth::Bits32,
            8 => PointerWidth::Bits64,
            other => {
                return Err(DecodeError::corrupt(
                    "runtime descriptor pointer size",
                    root + DESCRIPTOR_POINTER_SIZE,
                    "4 or 8",
                    other,
                ))
            }
        };

        let build = base.add(DESCRIPTOR_BUILD_FLAGS).deref()? as u32;
        let runtime = base.add(DESCRIPTOR_RUNTIME_FLAGS).deref()? as u32;
        let mixed = build & BUILD_MIXED_REFS != 0;
        let compressed = if mixed {
            runtime & RUNTIME_COMPRESSED_REFS != 0
        } else {
            build & BUILD_COMPRESSED_REFS != 0
        };

        if compressed && pointer_width == PointerWidth::Bits32 {
            return Err(DecodeError::corrupt(
                "runtime descriptor build flags",
                root + DESCRIPTOR_BUILD_FLAGS,
                "no compressed references on a 32-bit build",
                format!("{build:#x}"),
            ));
        }

        let leaf_log2 = base.add(DESCRIPTOR_LEAF_LOG2).deref()? as u32;
        if !(MIN_LEAF_LOG2..=MAX_LEAF_LOG2).contains(&leaf_log2) {
            return Err(DecodeError::corrupt(
                "arraylet leaf size",
                root + DESCRIPTOR_LEAF_LOG2,
                format!("log2 in {MIN_LEAF_LOG2}..={MAX_LEAF_LOG2}"),
                leaf_log2,
            ));
        }

        let shift = base.add(DESCRIPTOR_COMPRESSED_SHIFT).deref()? as u32;
        if shift > MAX_COMPRESSED_SHIFT {
            return Err(DecodeError::corrupt(
                "compressed reference shift",
                root + DESCRIPTOR_COMPRESSED_SHIFT,
                format!("at most {MAX_COMPRESSED_SHIFT}"),
                shift,
            ));
        }

        let hidden = base
            .add(DESCRIPTOR_HIDDEN_FIELDS)
            .cast(Width::W64)
            .deref()?;

        let versions = read_versions(base)?;

        let profile = SessionProfile {
            abi: AbiProfile {
                pointer_width,
                compressed_references: compressed,
                mixed_reference_mode: mixed,
                data_address_present: build & BUILD_DATA_ADDRESS != 0,
            },
            versions,
            constants: RuntimeConstants {
                arraylet_leaf_size: 1u64 << leaf_log2,
                // The shift is meaningless when references are not compressed
                compressed_shift: if compressed { shift } else { 0 },
                hidden_fields: (hidden != 0).then_some(hidden),
            },
            capabilities: Capabilities {
                flattened_fields: build & BUILD_FLATTENED_FIELDS != 0,
                jit_vtable: build & BUILD_JIT_VTABLE != 0,
                string_compression: runtime & RUNTIME_STRING_COMPRESSION != 0,
            },
        };

        debug!(
            root = format_args!("{root:#x}"),
            abi = ?profile.abi,
            versions = profile.versions.len(),
            "probed session profile"
        );

        Ok(profile)
    }
}

fn read_versions(base: TypedAddress<'_>) -> Result<VersionRegistry> {
    let count_at = base.add(DESCRIPTOR_VERSION_COUNT);
    let count = count_at.deref()? as u32;
    if count > MAX_VERSION_ENTRIES {
        return Err(DecodeError::corrupt(
            "algorithm version count",
            count_at.address(),
            format!("at most {MAX_VERSION_ENTRIES}"),
            count,
        ));
    }

    let mut registry = VersionRegistry::empty();
    for index in 0..count as u64 {
        let entry = base.add(DESCRIPTOR_VERSION_ENTRIES + index * VERSION_ENTRY_SIZE);
        let raw = entry.read_bytes(VERSION_NAME_LEN)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let name = &raw[..end];
        if name.is_empty() || !name.is_ascii() {
            return Err(DecodeError::corrupt(
                "algorithm version name",
                entry.address(),
                "non-empty ASCII",
                format!("{name:02x?}"),
            ));
        }
        let value = entry.add(VERSION_NAME_LEN as u64).deref()? as u32;
        let name = String::from_utf8_lossy(name);
        debug!(name = %name, value, "algorithm version");
        registry.insert(&name, value);
    }

    Ok(registry)
}
