//! Runtime Structure Layout Constants
//!
//! Offsets, eyecatchers and flag bits of the runtime structures the decoders
//! read. Pointer-sized structures are given as slot indices; multiply by the
//! session pointer size to get a byte offset.

// -- Runtime Descriptor --
//
// struct RuntimeDescriptor {
//   u32 eyecatcher;         // +0x00
//   u32 pointerSize;        // +0x04
//   u32 buildFlags;         // +0x08
//   u32 runtimeFlags;       // +0x0C
//   u32 arrayletLeafLog2;   // +0x10
//   u32 compressedShift;    // +0x14
//   u64 hiddenFields;       // +0x18
//   u32 versionCount;       // +0x20
//   u32 reserved;           // +0x24
//   VersionEntry entries[]; // +0x28
// };

pub const DESCRIPTOR_EYECATCHER: u32 = 0x4A39_4444;
pub const DESCRIPTOR_POINTER_SIZE: u64 = 0x04;
pub const DESCRIPTOR_BUILD_FLAGS: u64 = 0x08;
pub const DESCRIPTOR_RUNTIME_FLAGS: u64 = 0x0C;
pub const DESCRIPTOR_LEAF_LOG2: u64 = 0x10;
pub const DESCRIPTOR_COMPRESSED_SHIFT: u64 = 0x14;
pub const DESCRIPTOR_HIDDEN_FIELDS: u64 = 0x18;
pub const DESCRIPTOR_VERSION_COUNT: u64 = 0x20;
pub const DESCRIPTOR_VERSION_ENTRIES: u64 = 0x28;

/// Size of one `{ name[32], value, reserved }` version entry
pub const VERSION_ENTRY_SIZE: u64 = 40;
pub const VERSION_NAME_LEN: usize = 32;
pub const MAX_VERSION_ENTRIES: u32 = 256;

pub const BUILD_COMPRESSED_REFS: u32 = 0x01;
pub const BUILD_MIXED_REFS: u32 = 0x02;
pub const BUILD_DATA_ADDRESS: u32 = 0x04;
pub const BUILD_FLATTENED_FIELDS: u32 = 0x08;
pub const BUILD_JIT_VTABLE: u32 = 0x10;

pub const RUNTIME_COMPRESSED_REFS: u32 = 0x01;
pub const RUNTIME_STRING_COMPRESSION: u32 = 0x02;

pub const MIN_LEAF_LOG2: u32 = 8;
pub const MAX_LEAF_LOG2: u32 = 30;
pub const MAX_COMPRESSED_SHIFT: u32 = 4;

// -- Object Header --
// Class slot then monitor slot, each one reference wide.

/// Low bits of the class slot that carry object flags
pub const CLASS_SLOT_FLAG_MASK: u64 = 0xFF;

// -- RAM Class (pointer-sized slots) --

pub const RAM_CLASS_EYECATCHER: u32 = 0x9966_9966;
pub const RAM_EYECATCHER: u64 = 0;
pub const RAM_ROM_CLASS: u64 = 1;
pub const RAM_SUPERCLASSES: u64 = 2;
pub const RAM_DEPTH_AND_FLAGS: u64 = 3;
pub const RAM_CLASS_LOADER: u64 = 4;
pub const RAM_CLASS_OBJECT: u64 = 5;
pub const RAM_INIT_STATUS: u64 = 6;
pub const RAM_STATICS: u64 = 7;
pub const RAM_ARRAY_CLASS: u64 = 8;
pub const RAM_TOTAL_INSTANCE_SIZE: u64 = 9;
pub const RAM_INSTANCE_DESCRIPTION: u64 = 10;
pub const RAM_ITABLE: u64 = 11;
pub const RAM_FLATTENED_CACHE: u64 = 12;
pub const RAM_CLASS_FLAGS: u64 = 13;
pub const RAM_COMPONENT_TYPE: u64 = 14;
pub const RAM_ARITY: u64 = 15;
pub const RAM_LEAF_COMPONENT_TYPE: u64 = 16;
/// Vtable header `{ size, initialVirtualMethod }` follows the fixed slots
pub const RAM_VTABLE_HEADER: u64 = 17;
pub const RAM_CLASS_SLOTS: u64 = 17;
pub const VTABLE_HEADER_SLOTS: u64 = 2;

pub const CLASS_FLAG_VALUE_TYPE: u64 = 0x01;
pub const CLASS_FLAG_PREPADDING: u64 = 0x02;
pub const CLASS_FLAG_ALIGN8: u64 = 0x04;
pub const CLASS_FLAG_FLATTENABLE: u64 = 0x08;

/// Pre-padding carried by inline classes that need it
pub const FLATTENED_PREPADDING: u64 = 4;

/// Slots per RAM method `{ bytecodes, constantPool, methodRunAddress, extra }`
pub const RAM_METHOD_SLOTS: u64 = 4;

/// Slots per RAM constant pool entry
pub const RAM_CP_ENTRY_SLOTS: u64 = 2;

/// Slots per iTable entry before the method slots
pub const ITABLE_HEADER_SLOTS: u64 = 2;

/// Slots per flattened class cache entry `{ class, field, offset }`
pub const FLATTENED_ENTRY_SLOTS: u64 = 3;

/// Slots per hidden field record `{ className, shape, offset, offsetReturn, next }`
pub const HIDDEN_FIELD_SLOTS: u64 = 5;

/// Low bit of the instance description: the bitmap is stored inline in the slot
pub const INSTANCE_DESCRIPTION_INLINE: u64 = 0x1;

/// Upper bound on array arity before it is treated as damage
pub const MAX_ARITY: u64 = 255;

// -- ROM Class (byte offsets) --

pub const ROM_SIZE: u64 = 0;
pub const ROM_SINGLE_STATICS: u64 = 4;
pub const ROM_CLASS_NAME: u64 = 8;
pub const ROM_SUPERCLASS_NAME: u64 = 12;
pub const ROM_MODIFIERS: u64 = 16;
pub const ROM_EXTRA_MODIFIERS: u64 = 20;
pub const ROM_INTERFACE_COUNT: u64 = 24;
pub const ROM_INTERFACES: u64 = 28;
pub const ROM_METHOD_COUNT: u64 = 32;
pub const ROM_METHODS: u64 = 36;
pub const ROM_FIELD_COUNT: u64 = 40;
pub const ROM_FIELDS: u64 = 44;
pub const ROM_OBJECT_STATICS: u64 = 48;
pub const ROM_DOUBLE_STATICS: u64 = 52;
pub const ROM_RAM_CP_COUNT: u64 = 56;
pub const ROM_ROM_CP_COUNT: u64 = 60;
pub const ROM_CLASS_HEADER_SIZE: u64 = 64;

pub const EXTRA_MODIFIER_ARRAY: u32 = 0x0001_0000;

// -- ROM Field Shape --
//
// struct RomFieldShape {
//   SRP name;        // +0
//   SRP signature;   // +4
//   u32 modifiers;   // +8
//   optional constant, generic signature, annotations
// };

pub const FIELD_SHAPE_SIZE: u64 = 12;
pub const FIELD_STATIC: u32 = 0x0000_0008;
pub const FIELD_OBJECT: u32 = 0x0002_0000;
pub const FIELD_DOUBLE: u32 = 0x0004_0000;
pub const FIELD_HAS_CONSTANT: u32 = 0x0040_0000;
pub const FIELD_HAS_ANNOTATIONS: u32 = 0x2000_0000;
pub const FIELD_HAS_GENERIC_SIGNATURE: u32 = 0x4000_0000;

/// Limit applied to name and signature records read from the image
pub const MAX_UTF8_LEN: u16 = 0x7FFF;

// -- Memory Tags --
//
// struct J9MemTag {
//   u32 eyecatcher;
//   u32 sumCheck;
//   uintptr allocSize;
//   uintptr callSite;
//   uintptr memoryPoolSegment;
//   (u32 padding on 32-bit)
// };

pub const TAG_ALLOC_HEADER: u32 = 0xB123_4567;
pub const TAG_ALLOC_FOOTER: u32 = 0xB765_4321;
pub const TAG_FREED_HEADER: u32 = 0xBADB_AD67;
pub const TAG_FREED_FOOTER: u32 = 0xBADB_AD21;
pub const TAG_PADDING_BYTE: u8 = 0xDD;
pub const TAG_ROUNDING: u64 = 8;
pub const TAG_SIZE_64: u64 = 32;
pub const TAG_SIZE_32: u64 = 24;

// -- Shared Cache --

/// `J9ShrOffset { u32 layer; u32 reserved; u64 offset; }`
pub const SHR_OFFSET_SIZE: u64 = 16;
pub const MAX_CACHE_LAYER: u32 = 255;

/// `ShcItem { u32 dataLen; u16 dataType; u16 jvmID; }`
pub const SHC_ITEM_SIZE: u64 = 8;
/// `ShcItemHdr { u32 itemLen; }`, low bit marks a stale item
pub const SHC_ITEM_HDR_SIZE: u64 = 4;
pub const SHC_ITEM_STALE: u32 = 0x1;
