//! Class and field modifier flags
//!
//! Raw modifier words mix the access flags a reflective caller expects with
//! internal marker bits. The `reflect` constructors mask a raw word down to
//! the allow-list for its kind.

use bitflags::bitflags;

/// Modifiers visible on an ordinary class
pub const CLASS_REFLECT_MASK: u32 = 0x761F;

/// Modifiers visible on a field
pub const FIELD_REFLECT_MASK: u32 = 0x50DF;

/// Visibility bits an array class inherits from its leaf component
pub const VISIBILITY_MASK: u32 = 0x0007;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Access and property flags of a class
    pub struct ClassModifiers: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        /// Same bit as `ACC_SUPER`, never reflected
        const SYNCHRONIZED = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

impl ClassModifiers {
    /// Reflect-style modifiers of an ordinary class
    #[must_use]
    pub fn reflect(raw: u32) -> Self {
        Self::from_bits_truncate(raw & CLASS_REFLECT_MASK)
    }

    /// Reflect-style modifiers of an array class whose leaf component has `leaf_raw`
    #[must_use]
    pub fn reflect_array(leaf_raw: u32) -> Self {
        Self::from_bits_truncate(leaf_raw & VISIBILITY_MASK) | Self::FINAL | Self::ABSTRACT
    }

    /// Lower-case keyword list, in declaration order
    pub fn keywords(&self) -> Vec<&'static str> {
        self.iter_names()
            .map(|(name, _)| keyword(name))
            .collect()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Access and property flags of a field
    pub struct FieldModifiers: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

impl FieldModifiers {
    #[must_use]
    pub fn reflect(raw: u32) -> Self {
        Self::from_bits_truncate(raw & FIELD_REFLECT_MASK)
    }

    pub fn keywords(&self) -> Vec<&'static str> {
        self.iter_names()
            .map(|(name, _)| keyword(name))
            .collect()
    }
}

fn keyword(flag: &str) -> &'static str {
    match flag {
        "PUBLIC" => "public",
        "PRIVATE" => "private",
        "PROTECTED" => "protected",
        "STATIC" => "static",
        "FINAL" => "final",
        "SYNCHRONIZED" => "synchronized",
        "VOLATILE" => "volatile",
        "TRANSIENT" => "transient",
        "INTERFACE" => "interface",
        "ABSTRACT" => "abstract",
        "SYNTHETIC" => "synthetic",
        "ANNOTATION" => "annotation",
        "ENUM" => "enum",
        _ => "?",
    }
}
