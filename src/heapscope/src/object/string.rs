//! String decoding
//!
//! Two backing stores exist: a `char[]` with a `count` whose sign bit marks an
//! uncompressed string, and a `byte[]` with a `coder` byte. Which one applies
//! is resolved per String class and cached in the session.

use super::{ObjectModel, PrimitiveType};
use crate::error::{DecodeError, Result};
use crate::profile::StringEncoding;
use serde::Serialize;
use tracing::debug;

/// Field offsets of one String class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StringLayout {
    pub encoding: StringEncoding,
    pub value_offset: u64,
    /// Offset of `count` or `coder`, depending on the encoding
    pub length_offset: u64,
}

const CODER_LATIN1: i8 = 0;
const CODER_UTF16: i8 = 1;

impl ObjectModel<'_> {
    /// Field layout of the String class at `class`, cached per class
    pub fn string_layout(&self, class: u64) -> Result<StringLayout> {
        if let Some(layout) = self.session.string_layouts.get(&class) {
            return Ok(*layout);
        }

        let encoding = self.session.profile().versions.string_encoding()?;
        let (value_sig, length_name, length_sig) = match encoding {
            StringEncoding::CharArrayWithCount => ("[C", "count", "I"),
            StringEncoding::ByteArrayWithCoder => ("[B", "coder", "B"),
        };

        let classes = self.session.classes();
        let value = classes.find_field(class, "value", value_sig)?;
        let length = classes.find_field(class, length_name, length_sig)?;
        let (Some(value), Some(length)) = (value, length) else {
            return Err(DecodeError::corrupt(
                "string class",
                class,
                format!("value:{value_sig} and {length_name}:{length_sig} fields"),
                "missing field",
            ));
        };

        let layout = StringLayout {
            encoding,
            value_offset: value.offset_or_static_address,
            length_offset: length.offset_or_static_address,
        };
        debug!(class = format_args!("{class:#x}"), ?layout, "resolved string layout");
        Ok(*self.session.string_layouts.entry(class).or_insert(layout))
    }

    /// Decode the String object at `string`
    pub fn read_string(&self, string: u64) -> Result<String> {
        let class = self.class_of(string)?;
        let layout = self.string_layout(class)?;
        let value = self
            .read_reference(string, layout.value_offset)?
            .ok_or_else(|| {
                DecodeError::corrupt("string value", string, "non-null backing array", 0)
            })?;

        match layout.encoding {
            StringEncoding::CharArrayWithCount => {
                let count = self.read_int(string, layout.length_offset)?;
                self.decode_counted(string, value, count)
            }
            StringEncoding::ByteArrayWithCoder => {
                let coder = self.read_byte(string, layout.length_offset)?;
                self.decode_coded(string, value, coder)
            }
        }
    }

    /// Decode a String-typed reference field; `None` for null
    pub fn read_string_field(&self, object: u64, offset: u64) -> Result<Option<String>> {
        self.read_reference(object, offset)?
            .map(|string| self.read_string(string))
            .transpose()
    }

    fn decode_counted(&self, string: u64, value: u64, count: i32) -> Result<String> {
        let compression = self.session.profile().capabilities.string_compression;

        if count < 0 {
            if !compression {
                return Err(DecodeError::corrupt(
                    "string count",
                    string,
                    "count >= 0 when string compression is disabled",
                    count,
                ));
            }
            let length = (count as u32 & 0x7FFF_FFFF) as u64;
            return self.decode_utf16(value, length);
        }

        let length = count as u64;
        if compression {
            // Latin-1 bytes packed two per char element
            let chars = length.div_ceil(2);
            let mut bytes = self.read_elements(value, 0, chars, PrimitiveType::Char.size())?;
            bytes.truncate(length as usize);
            Ok(latin1(&bytes))
        } else {
            self.decode_utf16(value, length)
        }
    }

    fn decode_coded(&self, string: u64, value: u64, coder: i8) -> Result<String> {
        let size = self.array_size(value)?;
        match coder {
            CODER_LATIN1 => {
                let bytes = self.read_elements(value, 0, size, 1)?;
                Ok(latin1(&bytes))
            }
            CODER_UTF16 => {
                let bytes = self.read_elements(value, 0, size & !1, 1)?;
                let units = self.session.view().endian().read_u16_slice(&bytes);
                Ok(String::from_utf16_lossy(&units))
            }
            other => Err(DecodeError::corrupt("string coder", string, "0 or 1", other)),
        }
    }

    fn decode_utf16(&self, value: u64, length: u64) -> Result<String> {
        let bytes = self.read_elements(value, 0, length, PrimitiveType::Char.size())?;
        let units = self.session.view().endian().read_u16_slice(&bytes);
        Ok(String::from_utf16_lossy(&units))
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
