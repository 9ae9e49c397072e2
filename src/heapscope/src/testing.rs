//! Synthetic runtime images for tests
//!
//! [`ImageBuilder`] lays classes, objects, arrays and tagged blocks into one
//! contiguous buffer starting at a chosen base address, writing each structure
//! with the same layout constants the decoders read.

use crate::layout::*;
use crate::memtag::BlockState;
use crate::object::PrimitiveType;
use crate::profile::{
    AbiProfile, Capabilities, PointerWidth, RuntimeConstants, SessionProfile, VersionRegistry,
    CLASS_DEPTH_VERSION, SHARED_CACHE_OFFSET_VERSION, STRING_LAYOUT_VERSION,
};
use crate::source::{BufferView, Endian, MemoryView};
use std::collections::HashMap;
use std::sync::Arc;

/// Profile with every algorithm version at 1, no capabilities and 256-byte leaves
pub(crate) fn profile(width: PointerWidth, compressed: bool, data_address: bool) -> SessionProfile {
    SessionProfile {
        abi: AbiProfile {
            pointer_width: width,
            compressed_references: compressed,
            mixed_reference_mode: false,
            data_address_present: data_address,
        },
        versions: VersionRegistry::empty()
            .with(CLASS_DEPTH_VERSION, 1)
            .with(STRING_LAYOUT_VERSION, 1)
            .with(SHARED_CACHE_OFFSET_VERSION, 1),
        constants: RuntimeConstants {
            arraylet_leaf_size: 256,
            compressed_shift: 0,
            hidden_fields: None,
        },
        capabilities: Capabilities {
            flattened_fields: false,
            jit_vtable: false,
            string_compression: false,
        },
    }
}

fn primitive_name(primitive: PrimitiveType) -> &'static str {
    match primitive {
        PrimitiveType::Boolean => "boolean",
        PrimitiveType::Byte => "byte",
        PrimitiveType::Char => "char",
        PrimitiveType::Short => "short",
        PrimitiveType::Int => "int",
        PrimitiveType::Long => "long",
        PrimitiveType::Float => "float",
        PrimitiveType::Double => "double",
    }
}

/// Modifier bits implied by a signature
fn signature_modifiers(signature: &str) -> u32 {
    match signature.chars().next() {
        Some('L' | '[' | 'Q') => FIELD_OBJECT,
        Some('J' | 'D') => FIELD_DOUBLE,
        _ => 0,
    }
}

/// One ROM field shape to lay out
#[derive(Debug, Clone)]
pub(crate) struct RomFieldSpec {
    name: String,
    signature: String,
    modifiers: u32,
    annotations: Option<u32>,
}

impl RomFieldSpec {
    pub fn new(name: &str, signature: &str, modifiers: u32) -> Self {
        Self {
            name: name.to_string(),
            signature: signature.to_string(),
            modifiers,
            annotations: None,
        }
    }

    /// Attach an annotation blob of `length` bytes
    pub fn annotations(mut self, length: u32) -> Self {
        self.modifiers |= FIELD_HAS_ANNOTATIONS;
        self.annotations = Some(length);
        self
    }

    fn shape_size(&self) -> u64 {
        let mut size = FIELD_SHAPE_SIZE;
        if self.modifiers & FIELD_STATIC != 0 && self.modifiers & FIELD_HAS_CONSTANT != 0 {
            size += if self.modifiers & FIELD_DOUBLE != 0 { 8 } else { 4 };
        }
        if self.modifiers & FIELD_HAS_GENERIC_SIGNATURE != 0 {
            size += 4;
        }
        if let Some(length) = self.annotations {
            size += 4 + (length as u64).next_multiple_of(4);
        }
        size
    }
}

/// A RAM class to lay out
#[derive(Debug, Clone)]
pub(crate) struct ClassSpec {
    name: String,
    fields: Vec<RomFieldSpec>,
    flattened: Vec<(String, u64)>,
    superclass: Option<u64>,
    statics: Option<u64>,
    instance_size: u64,
    instance_description: u64,
    modifiers: u32,
    methods: u32,
    vtable: u64,
    constant_pool: u32,
    interfaces: Vec<u64>,
    flags: u64,
    array: Option<(u64, u64, u64)>,
}

impl ClassSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            flattened: Vec::new(),
            superclass: None,
            statics: None,
            instance_size: 0,
            instance_description: INSTANCE_DESCRIPTION_INLINE,
            modifiers: 0,
            methods: 0,
            vtable: 0,
            constant_pool: 0,
            interfaces: Vec::new(),
            flags: 0,
            array: None,
        }
    }

    pub fn array(name: &str, arity: u64, component: u64, leaf: u64) -> Self {
        let mut spec = Self::new(name);
        spec.array = Some((arity, component, leaf));
        spec
    }

    /// Declare a field; object and double-width bits follow from the signature
    pub fn field(mut self, name: &str, signature: &str, modifiers: u32) -> Self {
        self.fields.push(RomFieldSpec::new(
            name,
            signature,
            modifiers | signature_modifiers(signature),
        ));
        self
    }

    /// Declare a field stored inline as an instance of `inline_class`
    pub fn flattened_field(mut self, name: &str, signature: &str, inline_class: u64) -> Self {
        self.flattened.push((name.to_string(), inline_class));
        self.field(name, signature, FIELD_OBJECT)
    }

    pub fn superclass(mut self, class: u64) -> Self {
        self.superclass = Some(class);
        self
    }

    /// Allocate `size` bytes of static slot storage
    pub fn statics(mut self, size: u64) -> Self {
        self.statics = Some(size);
        self
    }

    pub fn instance_size(mut self, size: u64) -> Self {
        self.instance_size = size;
        self
    }

    pub fn instance_description(mut self, description: u64) -> Self {
        self.instance_description = description;
        self
    }

    pub fn modifiers(mut self, modifiers: u32) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn methods(mut self, count: u32) -> Self {
        self.methods = count;
        self
    }

    pub fn vtable(mut self, size: u64) -> Self {
        self.vtable = size;
        self
    }

    pub fn constant_pool(mut self, count: u32) -> Self {
        self.constant_pool = count;
        self
    }

    pub fn interfaces(mut self, interfaces: &[u64]) -> Self {
        self.interfaces = interfaces.to_vec();
        self
    }

    pub fn flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }
}

/// ROM class header values besides the name and fields
#[derive(Default)]
struct RomExtras<'a> {
    superclass_name: Option<&'a str>,
    array: bool,
    methods: u32,
    constant_pool: u32,
}

/// Builds a little image of runtime structures
pub(crate) struct ImageBuilder {
    base: u64,
    data: Vec<u8>,
    pointer_size: u64,
    reference_size: u64,
    endian: Endian,
    chains: HashMap<u64, Vec<u64>>,
    names: HashMap<u64, String>,
}

impl ImageBuilder {
    pub fn new(base: u64, pointer_size: u64, endian: Endian) -> Self {
        Self {
            base,
            data: Vec::new(),
            pointer_size,
            reference_size: pointer_size,
            endian,
            chains: HashMap::new(),
            names: HashMap::new(),
        }
    }

    pub fn set_reference_size(&mut self, size: u64) {
        self.reference_size = size;
    }

    /// Reserve `length` zeroed bytes aligned to `align`
    pub fn alloc(&mut self, length: u64, align: u64) -> u64 {
        let address = (self.base + self.data.len() as u64).next_multiple_of(align.max(1));
        let end = (address + length - self.base) as usize;
        self.data.resize(end, 0);
        address
    }

    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) {
        let start = (address - self.base) as usize;
        let end = start + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(bytes);
    }

    fn write_uint(&mut self, address: u64, value: u64, width: u64) {
        let bytes = self.endian.encode_uint(value, width as usize);
        self.write_bytes(address, &bytes);
    }

    fn read_uint(&self, address: u64, width: u64) -> u64 {
        let start = (address - self.base) as usize;
        self.endian.read_uint(&self.data[start..start + width as usize])
    }

    pub fn write_u16(&mut self, address: u64, value: u16) {
        self.write_uint(address, value as u64, 2);
    }

    pub fn write_u32(&mut self, address: u64, value: u32) {
        self.write_uint(address, value as u64, 4);
    }

    pub fn write_u64(&mut self, address: u64, value: u64) {
        self.write_uint(address, value, 8);
    }

    fn write_ptr(&mut self, address: u64, value: u64) {
        self.write_uint(address, value, self.pointer_size);
    }

    fn write_slot(&mut self, base: u64, slot: u64, value: u64) {
        self.write_ptr(base + slot * self.pointer_size, value);
    }

    fn write_srp(&mut self, address: u64, target: u64) {
        let delta = target as i64 - address as i64;
        self.write_u32(address, delta as i32 as u32);
    }

    /// Lay out a length-prefixed UTF8 record
    pub fn utf8(&mut self, text: &str) -> u64 {
        let address = self.alloc(2 + text.len() as u64, 2);
        self.write_u16(address, text.len() as u16);
        self.write_bytes(address + 2, text.as_bytes());
        address
    }

    fn shape_at(&mut self, address: u64, field: &RomFieldSpec, name: u64, signature: u64) {
        self.write_srp(address, name);
        self.write_srp(address + 4, signature);
        self.write_u32(address + 8, field.modifiers);

        let mut cursor = address + FIELD_SHAPE_SIZE;
        if field.modifiers & FIELD_STATIC != 0 && field.modifiers & FIELD_HAS_CONSTANT != 0 {
            cursor += if field.modifiers & FIELD_DOUBLE != 0 { 8 } else { 4 };
        }
        if field.modifiers & FIELD_HAS_GENERIC_SIGNATURE != 0 {
            self.write_srp(cursor, signature);
            cursor += 4;
        }
        if let Some(length) = field.annotations {
            self.write_u32(cursor, length);
        }
    }

    fn rom_class_with(&mut self, name: &str, fields: &[RomFieldSpec], modifiers: u32, extras: RomExtras<'_>) -> (u64, Vec<u64>) {
        let name_utf8 = self.utf8(name);
        let super_utf8 = extras.superclass_name.map(|name| self.utf8(name));
        let field_names: Vec<(u64, u64)> = fields
            .iter()
            .map(|field| (self.utf8(&field.name), self.utf8(&field.signature)))
            .collect();

        let shapes_size: u64 = fields.iter().map(RomFieldSpec::shape_size).sum();
        let rom = self.alloc(ROM_CLASS_HEADER_SIZE + shapes_size, 8);
        let mut shapes = Vec::with_capacity(fields.len());
        let mut cursor = rom + ROM_CLASS_HEADER_SIZE;
        for (field, (name, signature)) in fields.iter().zip(field_names) {
            self.shape_at(cursor, field, name, signature);
            shapes.push(cursor);
            cursor += field.shape_size();
        }

        let statics = fields.iter().filter(|f| f.modifiers & FIELD_STATIC != 0);
        let object_statics = statics.clone().filter(|f| f.modifiers & FIELD_OBJECT != 0).count();
        let double_statics = statics
            .clone()
            .filter(|f| f.modifiers & FIELD_OBJECT == 0 && f.modifiers & FIELD_DOUBLE != 0)
            .count();
        let single_statics = statics.count() - object_statics - double_statics;

        self.write_u32(rom + ROM_SIZE, (cursor - rom) as u32);
        self.write_u32(rom + ROM_SINGLE_STATICS, single_statics as u32);
        self.write_srp(rom + ROM_CLASS_NAME, name_utf8);
        if let Some(super_utf8) = super_utf8 {
            self.write_srp(rom + ROM_SUPERCLASS_NAME, super_utf8);
        }
        self.write_u32(rom + ROM_MODIFIERS, modifiers);
        if extras.array {
            self.write_u32(rom + ROM_EXTRA_MODIFIERS, EXTRA_MODIFIER_ARRAY);
        }
        self.write_u32(rom + ROM_METHOD_COUNT, extras.methods);
        self.write_u32(rom + ROM_FIELD_COUNT, fields.len() as u32);
        if let Some(&first) = shapes.first() {
            self.write_srp(rom + ROM_FIELDS, first);
        }
        self.write_u32(rom + ROM_OBJECT_STATICS, object_statics as u32);
        self.write_u32(rom + ROM_DOUBLE_STATICS, double_statics as u32);
        self.write_u32(rom + ROM_RAM_CP_COUNT, extras.constant_pool);
        (rom, shapes)
    }

    /// Lay out a ROM class, returning its address
    pub fn rom_class(&mut self, name: &str, fields: &[RomFieldSpec], modifiers: u32) -> u64 {
        self.rom_class_with(name, fields, modifiers, RomExtras::default()).0
    }

    /// Lay out a RAM class with its ROM class, superclass array and tables
    pub fn class(&mut self, spec: ClassSpec) -> u64 {
        let superclass_name = spec.superclass.and_then(|s| self.names.get(&s).cloned());
        let extras = RomExtras {
            superclass_name: superclass_name.as_deref(),
            array: spec.array.is_some(),
            methods: spec.methods,
            constant_pool: spec.constant_pool,
        };
        let (rom, shapes) = self.rom_class_with(&spec.name, &spec.fields, spec.modifiers, extras);

        let pointer = self.pointer_size;
        let ram = self.alloc((RAM_CLASS_SLOTS + VTABLE_HEADER_SLOTS + spec.vtable) * pointer, 8);
        self.write_slot(ram, RAM_EYECATCHER, RAM_CLASS_EYECATCHER as u64);
        self.write_slot(ram, RAM_ROM_CLASS, rom);

        let chain = match spec.superclass {
            Some(superclass) => {
                let mut chain = self.chains.get(&superclass).cloned().unwrap_or_default();
                chain.push(superclass);
                chain
            }
            None => Vec::new(),
        };
        if !chain.is_empty() {
            let array = self.alloc(chain.len() as u64 * pointer, 8);
            for (index, &class) in chain.iter().enumerate() {
                self.write_ptr(array + index as u64 * pointer, class);
            }
            self.write_slot(ram, RAM_SUPERCLASSES, array);
        }
        self.write_slot(ram, RAM_DEPTH_AND_FLAGS, chain.len() as u64);

        if let Some(size) = spec.statics {
            let statics = self.alloc(size, 8);
            self.write_slot(ram, RAM_STATICS, statics);
        }
        self.write_slot(ram, RAM_TOTAL_INSTANCE_SIZE, spec.instance_size);
        self.write_slot(ram, RAM_INSTANCE_DESCRIPTION, spec.instance_description);
        self.write_slot(ram, RAM_CLASS_FLAGS, spec.flags);

        let mut next = 0;
        for &interface in spec.interfaces.iter().rev() {
            let entry = self.alloc(ITABLE_HEADER_SLOTS * pointer, 8);
            self.write_slot(entry, 0, interface);
            self.write_slot(entry, 1, next);
            next = entry;
        }
        self.write_slot(ram, RAM_ITABLE, next);

        if !spec.flattened.is_empty() {
            let count = spec.flattened.len() as u64;
            let table = self.alloc(pointer + count * FLATTENED_ENTRY_SLOTS * pointer, 8);
            self.write_slot(table, 0, count);
            for (index, (name, inline_class)) in spec.flattened.iter().enumerate() {
                let shape = spec
                    .fields
                    .iter()
                    .position(|field| &field.name == name)
                    .map(|position| shapes[position])
                    .unwrap_or(0);
                let entry = table + pointer + index as u64 * FLATTENED_ENTRY_SLOTS * pointer;
                self.write_slot(entry, 0, *inline_class);
                self.write_slot(entry, 1, shape);
            }
            self.write_slot(ram, RAM_FLATTENED_CACHE, table);
        }

        if let Some((arity, component, leaf)) = spec.array {
            self.write_slot(ram, RAM_COMPONENT_TYPE, component);
            self.write_slot(ram, RAM_ARITY, arity);
            self.write_slot(ram, RAM_LEAF_COMPONENT_TYPE, leaf);
        }
        self.write_slot(ram, RAM_VTABLE_HEADER, spec.vtable);

        self.chains.insert(ram, chain);
        self.names.insert(ram, spec.name);
        ram
    }

    /// Array class of one primitive, with its primitive leaf class
    pub fn array_class(&mut self, name: &str, element: PrimitiveType) -> u64 {
        let leaf = self.class(ClassSpec::new(primitive_name(element)));
        self.class(ClassSpec::array(name, 1, leaf, leaf))
    }

    /// Plain object with `body_size` bytes after the header
    pub fn object(&mut self, class: u64, body_size: u64) -> u64 {
        let object = self.alloc(2 * self.reference_size + body_size, 8);
        self.write_uint(object, class, self.reference_size);
        object
    }

    /// Contiguous array with its elements given as raw bytes
    pub fn contiguous_array(&mut self, class: u64, size: u32, elements: &[u8]) -> u64 {
        let (size_offset, header) = if self.reference_size == 4 { (4, 8) } else { (8, 16) };
        let array = self.alloc(header + elements.len() as u64, 8);
        self.write_uint(array, class, self.reference_size);
        self.write_u32(array + size_offset, size);
        self.write_bytes(array + header, elements);
        array
    }

    /// Hidden field record injected into the class named `class_name`
    pub fn hidden_field(
        &mut self,
        class_name: &str,
        name: &str,
        signature: &str,
        modifiers: u32,
        recorded_offset: u64,
    ) -> u64 {
        let class_utf8 = self.utf8(class_name);
        let name_utf8 = self.utf8(name);
        let signature_utf8 = self.utf8(signature);
        let field = RomFieldSpec::new(name, signature, modifiers);
        let shape = self.alloc(field.shape_size(), 4);
        self.shape_at(shape, &field, name_utf8, signature_utf8);

        let record = self.alloc(HIDDEN_FIELD_SLOTS * self.pointer_size, 8);
        self.write_slot(record, 0, class_utf8);
        self.write_slot(record, 1, shape);
        self.write_slot(record, 2, recorded_offset);
        record
    }

    fn tag_size(&self) -> u64 {
        if self.pointer_size == 8 {
            TAG_SIZE_64
        } else {
            TAG_SIZE_32
        }
    }

    fn write_tag(&mut self, address: u64, eyecatcher: u32, alloc_size: u64, call_site: u64) {
        let pointer = self.pointer_size;
        let blank = vec![0; self.tag_size() as usize];
        self.write_bytes(address, &blank);
        self.write_u32(address, eyecatcher);
        self.write_ptr(address + 8, alloc_size);
        self.write_ptr(address + 8 + pointer, call_site);

        let folded = if pointer == 8 {
            ((address >> 32) as u32) ^ (address as u32)
        } else {
            address as u32
        };
        let sum = (0..self.tag_size() / 4)
            .map(|word| self.read_uint(address + word * 4, 4) as u32)
            .fold(folded, |sum, word| sum ^ word);
        self.write_u32(address + 4, sum);
    }

    /// Allocation with header tag, padding and footer tag; returns the user pointer
    pub fn tagged_block(&mut self, alloc_size: u64, state: BlockState, call_site: Option<&str>) -> u64 {
        let call_site = match call_site {
            Some(site) => {
                let address = self.alloc(site.len() as u64 + 1, 1);
                self.write_bytes(address, site.as_bytes());
                address
            }
            None => 0,
        };

        let tag = self.tag_size();
        let rounded = alloc_size.next_multiple_of(TAG_ROUNDING);
        let header = self.alloc(tag + rounded + tag, 8);
        let user = header + tag;
        let footer = user + rounded;
        let padding = vec![TAG_PADDING_BYTE; (rounded - alloc_size) as usize];
        self.write_bytes(user + alloc_size, &padding);

        let (head, foot) = match state {
            BlockState::Allocated => (TAG_ALLOC_HEADER, TAG_ALLOC_FOOTER),
            BlockState::Freed => (TAG_FREED_HEADER, TAG_FREED_FOOTER),
        };
        self.write_tag(header, head, alloc_size, call_site);
        self.write_tag(footer, foot, alloc_size, call_site);
        user
    }

    /// Rewrite a block's header with a new size and a matching checksum
    pub fn retag_header(&mut self, user: u64, state: BlockState, alloc_size: u64) {
        let header = user - self.tag_size();
        let call_site = self.read_uint(header + 8 + self.pointer_size, self.pointer_size);
        let eyecatcher = match state {
            BlockState::Allocated => TAG_ALLOC_HEADER,
            BlockState::Freed => TAG_FREED_HEADER,
        };
        self.write_tag(header, eyecatcher, alloc_size, call_site);
    }

    pub fn into_buffer(self) -> Arc<BufferView> {
        Arc::new(BufferView::new(self.data, self.base, self.endian))
    }

    pub fn into_view(self) -> Arc<dyn MemoryView> {
        self.into_buffer()
    }
}

/// Runtime descriptor image for probe tests
pub(crate) struct DescriptorBuilder {
    pointer_size: u32,
    build_flags: u32,
    runtime_flags: u32,
    leaf_log2: u32,
    shift: u32,
    hidden_fields: u64,
    versions: Vec<(String, u32)>,
}

impl DescriptorBuilder {
    pub fn new(pointer_size: u32) -> Self {
        Self {
            pointer_size,
            build_flags: 0,
            runtime_flags: 0,
            leaf_log2: 16,
            shift: 0,
            hidden_fields: 0,
            versions: Vec::new(),
        }
    }

    pub fn build_flags(mut self, flags: u32) -> Self {
        self.build_flags = flags;
        self
    }

    pub fn runtime_flags(mut self, flags: u32) -> Self {
        self.runtime_flags = flags;
        self
    }

    pub fn shift(mut self, shift: u32) -> Self {
        self.shift = shift;
        self
    }

    pub fn version(mut self, name: &str, value: u32) -> Self {
        self.versions.push((name.to_string(), value));
        self
    }

    pub fn hidden_fields(mut self, head: u64) -> Self {
        self.hidden_fields = head;
        self
    }

    pub fn build(self, base: u64, endian: Endian) -> BufferView {
        let mut image = ImageBuilder::new(base, self.pointer_size as u64, endian);
        let size = DESCRIPTOR_VERSION_ENTRIES + self.versions.len() as u64 * VERSION_ENTRY_SIZE;
        let root = image.alloc(size, 8);
        image.write_u32(root, DESCRIPTOR_EYECATCHER);
        image.write_u32(root + DESCRIPTOR_POINTER_SIZE, self.pointer_size);
        image.write_u32(root + DESCRIPTOR_BUILD_FLAGS, self.build_flags);
        image.write_u32(root + DESCRIPTOR_RUNTIME_FLAGS, self.runtime_flags);
        image.write_u32(root + DESCRIPTOR_LEAF_LOG2, self.leaf_log2);
        image.write_u32(root + DESCRIPTOR_COMPRESSED_SHIFT, self.shift);
        image.write_u64(root + DESCRIPTOR_HIDDEN_FIELDS, self.hidden_fields);
        image.write_u32(root + DESCRIPTOR_VERSION_COUNT, self.versions.len() as u32);
        for (index, (name, value)) in self.versions.iter().enumerate() {
            let entry = root + DESCRIPTOR_VERSION_ENTRIES + index as u64 * VERSION_ENTRY_SIZE;
            image.write_bytes(entry, name.as_bytes());
            image.write_u32(entry + VERSION_NAME_LEN as u64, *value);
        }
        BufferView::new(image.data, base, endian)
    }
}
