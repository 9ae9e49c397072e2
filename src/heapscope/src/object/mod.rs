//! Object Model Decoder
//!
//! Header sizes, array element addressing and field reads for heap objects.
//!
//! Every field offset is relative to the end of the object header, so a read
//! lands at `object + header_size + offset`.

mod array;
mod header;
mod string;
mod value;

pub use array::ArrayInfo;
pub use header::{ArrayLayout, HeaderLayout, HeaderShape};
pub use string::StringLayout;
pub use value::{FieldValue, PrimitiveType};

use crate::error::{DecodeError, Result};
use crate::layout::CLASS_SLOT_FLAG_MASK;
use crate::session::Session;
use serde::Serialize;

/// Decoded header of one heap object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectHeader {
    pub address: u64,
    pub class: u64,
    /// Low-order flag bits packed into the class slot
    pub flags: u8,
    /// Monitor slot, absent for arrays
    pub monitor: Option<u64>,
    pub array: Option<ArrayInfo>,
}

/// Object decoding bound to a session
#[derive(Clone, Copy)]
pub struct ObjectModel<'s> {
    session: &'s Session,
}

impl<'s> ObjectModel<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Class address stored in the object's class slot
    pub fn class_of(&self, object: u64) -> Result<u64> {
        let slot = self
            .session
            .at(object, self.session.reference_width())
            .deref()?;
        let class = slot & !CLASS_SLOT_FLAG_MASK;
        if class == 0 {
            return Err(DecodeError::corrupt(
                "object class slot",
                object,
                "non-null class",
                format!("{slot:#x}"),
            ));
        }
        Ok(class)
    }

    pub fn header(&self, object: u64) -> Result<ObjectHeader> {
        let slot = self
            .session
            .at(object, self.session.reference_width())
            .deref()?;
        let class = self.class_of(object)?;
        let descriptor = self.session.classes().class(class)?;

        let (monitor, array) = if descriptor.is_array {
            (None, Some(self.array_info(object)?))
        } else {
            let monitor = self
                .session
                .at(
                    object + self.session.reference_size(),
                    self.session.reference_width(),
                )
                .deref()?;
            (Some(monitor), None)
        };

        Ok(ObjectHeader {
            address: object,
            class,
            flags: (slot & CLASS_SLOT_FLAG_MASK) as u8,
            monitor,
            array,
        })
    }

    /// Size of a non-indexable object header
    pub fn header_size(&self) -> u64 {
        self.session.header_layout().object_header_size
    }

    /// Address of the first field byte of `object`
    pub fn data_start(&self, object: u64) -> u64 {
        object + self.header_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::PointerWidth;
    use crate::source::Endian;
    use crate::testing::{profile, ClassSpec, ImageBuilder};

    #[test]
    fn test_header_of_plain_object() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        image.set_reference_size(4);
        let class = image.class(ClassSpec::new("app/Point").instance_size(8));
        let object = image.object(class, 8);
        image.write_u32(object, (class | 0x3) as u32);
        image.write_u32(object + 4, 0x77);

        let session = Session::new(image.into_view(), profile(PointerWidth::Bits64, true, false)).unwrap();
        let header = session.objects().header(object).unwrap();
        assert_eq!(header.class, class);
        assert_eq!(header.flags, 0x3);
        assert_eq!(header.monitor, Some(0x77));
        assert_eq!(header.array, None);
        assert_eq!(session.objects().data_start(object), object + 8);
    }

    #[test]
    fn test_null_class_slot_is_corrupt() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let object = image.alloc(16, 8);

        let session = Session::new(image.into_view(), profile(PointerWidth::Bits64, false, false)).unwrap();
        assert!(matches!(
            session.objects().class_of(object),
            Err(DecodeError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_header_of_array_has_no_monitor() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array_class = image.array_class("[I", PrimitiveType::Int);
        let array = image.contiguous_array(array_class, 4, &[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0]);

        let session = Session::new(image.into_view(), profile(PointerWidth::Bits64, false, false)).unwrap();
        let header = session.objects().header(array).unwrap();
        assert_eq!(header.monitor, None);
        let info = header.array.unwrap();
        assert_eq!(info.size, 4);
        assert_eq!(info.layout, ArrayLayout::InlineContiguous);
    }
}
