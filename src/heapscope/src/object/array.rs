//! Array size, element addressing and bulk element reads
//!
//! A discontiguous array (an arraylet) keeps its elements in fixed-size leaves.
//! The header is followed by the arrayoid, one reference slot per leaf.

use super::{ArrayLayout, FieldValue, ObjectModel, PrimitiveType};
use crate::error::{DecodeError, Result};
use serde::Serialize;

/// Element count and storage kind of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArrayInfo {
    pub size: u64,
    pub layout: ArrayLayout,
}

impl ObjectModel<'_> {
    /// Read the element count, trying the contiguous slot before the discontiguous one
    pub fn array_info(&self, array: u64) -> Result<ArrayInfo> {
        let layout = self.session.header_layout();

        let contiguous_at = array + layout.contiguous_size_offset;
        let contiguous = self.session.read_u32(contiguous_at)?;
        if contiguous != 0 {
            return Ok(ArrayInfo {
                size: checked_size(contiguous, contiguous_at)?,
                layout: ArrayLayout::InlineContiguous,
            });
        }

        let discontiguous_at = array + layout.discontiguous_size_offset;
        let discontiguous = self.session.read_u32(discontiguous_at)?;
        Ok(ArrayInfo {
            size: checked_size(discontiguous, discontiguous_at)?,
            layout: ArrayLayout::Discontiguous,
        })
    }

    pub fn array_size(&self, array: u64) -> Result<u64> {
        Ok(self.array_info(array)?.size)
    }

    /// Address of element `index`, following the arrayoid for discontiguous arrays
    pub fn element_address(&self, array: u64, index: u64, element_size: u64) -> Result<u64> {
        self.check_element_size(element_size)?;
        let info = self.array_info(array)?;
        if index >= info.size {
            return Err(DecodeError::OutOfBounds {
                address: array,
                start: index,
                length: 1,
                size: info.size,
            });
        }

        match info.layout {
            ArrayLayout::InlineContiguous => {
                Ok(self.contiguous_data(array)? + index * element_size)
            }
            ArrayLayout::Discontiguous => {
                let per_leaf = self.elements_per_leaf(element_size);
                let leaf = self.leaf_address(array, index / per_leaf)?;
                Ok(leaf + (index % per_leaf) * element_size)
            }
        }
    }

    /// Copy `length` elements starting at `start` as raw bytes
    ///
    /// The range is checked against the array size before any element is read.
    pub fn read_elements(
        &self,
        array: u64,
        start: u64,
        length: u64,
        element_size: u64,
    ) -> Result<Vec<u8>> {
        self.check_element_size(element_size)?;
        let info = self.array_info(array)?;
        let in_bounds = start
            .checked_add(length)
            .map(|end| end <= info.size)
            .unwrap_or(false);
        if !in_bounds {
            return Err(DecodeError::OutOfBounds {
                address: array,
                start,
                length,
                size: info.size,
            });
        }
        if length == 0 {
            return Ok(Vec::new());
        }

        match info.layout {
            ArrayLayout::InlineContiguous => {
                let data = self.contiguous_data(array)?;
                self.session
                    .read_bytes(data + start * element_size, (length * element_size) as usize)
            }
            ArrayLayout::Discontiguous => {
                // The size slot is untrusted, so memory grows one leaf at a time
                let per_leaf = self.elements_per_leaf(element_size);
                let mut out = Vec::new();
                let end = start + length;
                let mut index = start;
                while index < end {
                    let within = index % per_leaf;
                    let count = (per_leaf - within).min(end - index);
                    let leaf = self.leaf_address(array, index / per_leaf)?;
                    let bytes = self
                        .session
                        .read_bytes(leaf + within * element_size, (count * element_size) as usize)?;
                    out.extend_from_slice(&bytes);
                    index += count;
                }
                Ok(out)
            }
        }
    }

    /// Decode a range of a primitive array
    pub fn read_primitive_array(
        &self,
        array: u64,
        start: u64,
        length: u64,
        element: PrimitiveType,
    ) -> Result<Vec<FieldValue>> {
        let size = element.size();
        let bytes = self.read_elements(array, start, length, size)?;
        let endian = self.session.view().endian();
        Ok(bytes
            .chunks_exact(size as usize)
            .map(|chunk| element.decode(chunk, endian))
            .collect())
    }

    /// Decode a range of a reference array into object addresses (0 = null)
    pub fn read_reference_array(&self, array: u64, start: u64, length: u64) -> Result<Vec<u64>> {
        let size = self.session.reference_size();
        let bytes = self.read_elements(array, start, length, size)?;
        let endian = self.session.view().endian();
        Ok(bytes
            .chunks_exact(size as usize)
            .map(|chunk| self.session.decompress(endian.read_uint(chunk)))
            .collect())
    }

    fn contiguous_data(&self, array: u64) -> Result<u64> {
        let layout = self.session.header_layout();
        match layout.contiguous_data_address_offset {
            Some(offset) => self.session.read_ptr(array + offset),
            None => Ok(array + layout.contiguous_header_size),
        }
    }

    fn elements_per_leaf(&self, element_size: u64) -> u64 {
        self.session.profile().constants.arraylet_leaf_size / element_size
    }

    fn leaf_address(&self, array: u64, leaf: u64) -> Result<u64> {
        let arrayoid = array + self.session.header_layout().discontiguous_header_size;
        let slot = arrayoid + leaf * self.session.reference_size();
        let address = self.session.read_reference(slot)?;
        if address == 0 {
            return Err(DecodeError::corrupt("arraylet leaf", slot, "non-null leaf", 0));
        }
        Ok(address)
    }

    fn check_element_size(&self, element_size: u64) -> Result<()> {
        if element_size == 0 || element_size > self.session.profile().constants.arraylet_leaf_size {
            return Err(DecodeError::Unsupported {
                capability: "element size outside one arraylet leaf",
            });
        }
        Ok(())
    }
}

fn checked_size(raw: u32, address: u64) -> Result<u64> {
    if raw & 0x8000_0000 != 0 {
        return Err(DecodeError::corrupt(
            "array size",
            address,
            "sign bit clear",
            format!("{raw:#x}"),
        ));
    }
    Ok(raw as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::PointerWidth;
    use crate::session::Session;
    use crate::source::{BufferView, Endian};
    use crate::testing::{profile, ImageBuilder};
    use std::sync::Arc;

    fn session(image: ImageBuilder, compressed: bool, data_address: bool) -> (Session, Arc<BufferView>) {
        let buffer = image.into_buffer();
        let session = Session::new(
            buffer.clone(),
            profile(PointerWidth::Bits64, compressed, data_address),
        )
        .unwrap();
        (session, buffer)
    }

    #[test]
    fn test_discontiguous_size_fallback() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(16, 8);
        image.write_u32(array + 4, 0);
        image.write_u32(array + 8, 42);

        let (session, _) = session(image, true, false);
        let info = session.objects().array_info(array).unwrap();
        assert_eq!(info.size, 42);
        assert_eq!(info.layout, ArrayLayout::Discontiguous);
    }

    #[test]
    fn test_contiguous_size_read_first() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(16, 8);
        image.write_u32(array + 8, 7);
        image.write_u32(array + 12, 99);

        let (session, buffer) = session(image, false, false);
        assert_eq!(session.objects().array_size(array).unwrap(), 7);
        assert_eq!(buffer.read_count(), 1);
    }

    #[test]
    fn test_sign_bit_size_is_corrupt() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(16, 8);
        image.write_u32(array + 4, 0x8000_0001);

        let (session, _) = session(image, true, false);
        let err = session.objects().array_size(array).unwrap_err();
        assert!(matches!(err, DecodeError::Corrupt { what: "array size", .. }));

        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(16, 8);
        image.write_u32(array + 8, 0xFFFF_FFFF);
        let (session, _) = self::session(image, true, false);
        assert!(session.objects().array_size(array).is_err());
    }

    #[test]
    fn test_bounds_checked_before_element_reads() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(8 + 16, 8);
        image.write_u32(array + 4, 4);

        let (session, buffer) = session(image, true, false);
        let err = session.objects().read_elements(array, 2, 3, 4).unwrap_err();
        assert_eq!(
            err,
            DecodeError::OutOfBounds {
                address: array,
                start: 2,
                length: 3,
                size: 4
            }
        );
        // Only the size slot was read
        assert_eq!(buffer.read_count(), 1);

        assert!(session.objects().read_elements(array, u64::MAX, 2, 4).is_err());
        assert!(session.objects().element_address(array, 4, 4).is_err());
    }

    #[test]
    fn test_contiguous_elements() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(8 + 8, 8);
        image.write_u32(array + 4, 4);
        image.write_bytes(array + 8, &[1, 0, 2, 0, 3, 0, 4, 0]);

        let (session, _) = session(image, true, false);
        let objects = session.objects();
        assert_eq!(objects.element_address(array, 3, 2).unwrap(), array + 8 + 6);
        assert_eq!(objects.read_elements(array, 1, 2, 2).unwrap(), vec![2, 0, 3, 0]);
        assert_eq!(
            objects
                .read_primitive_array(array, 0, 4, PrimitiveType::Short)
                .unwrap(),
            vec![
                FieldValue::Short(1),
                FieldValue::Short(2),
                FieldValue::Short(3),
                FieldValue::Short(4)
            ]
        );
        assert!(objects.read_elements(array, 4, 0, 2).unwrap().is_empty());
    }

    #[test]
    fn test_data_address_indirection() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(16, 8);
        let data = image.alloc(8, 8);
        image.write_u32(array + 4, 2);
        image.write_u64(array + 8, data);
        image.write_bytes(data, &[9, 0, 0, 0, 8, 0, 0, 0]);

        let (session, _) = session(image, true, true);
        let objects = session.objects();
        assert_eq!(objects.element_address(array, 1, 4).unwrap(), data + 4);
        assert_eq!(
            objects.read_primitive_array(array, 0, 2, PrimitiveType::Int).unwrap(),
            vec![FieldValue::Int(9), FieldValue::Int(8)]
        );
    }

    #[test]
    fn test_arraylet_element_addressing() {
        // 256-byte leaves hold 64 ints each; 100 ints span two leaves
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let leaf0 = image.alloc(256, 8);
        let leaf1 = image.alloc(256, 8);
        let array = image.alloc(16 + 8, 8);
        image.write_u32(array + 8, 100);
        image.write_u32(array + 16, leaf0 as u32);
        image.write_u32(array + 20, leaf1 as u32);
        for i in 0..64u64 {
            image.write_u32(leaf0 + i * 4, i as u32);
        }
        for i in 0..36u64 {
            image.write_u32(leaf1 + i * 4, (64 + i) as u32);
        }

        let (session, _) = session(image, true, false);
        let objects = session.objects();
        assert_eq!(objects.element_address(array, 0, 4).unwrap(), leaf0);
        assert_eq!(objects.element_address(array, 63, 4).unwrap(), leaf0 + 252);
        assert_eq!(objects.element_address(array, 64, 4).unwrap(), leaf1);
        assert_eq!(objects.element_address(array, 99, 4).unwrap(), leaf1 + 35 * 4);

        let values = objects
            .read_primitive_array(array, 60, 8, PrimitiveType::Int)
            .unwrap();
        let expected: Vec<FieldValue> = (60..68).map(FieldValue::Int).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_implausible_arraylet_size_fails_without_reading() {
        // Size just below the sign bit, arrayoid slots all null
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(16 + 8, 8);
        image.write_u32(array + 4, 0);
        image.write_u32(array + 8, 0x7FFF_FFFF);

        let (session, _) = session(image, true, false);
        let err = session
            .objects()
            .read_elements(array, 0, 0x7FFF_FFFF, 8)
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Corrupt { what: "arraylet leaf", .. } | DecodeError::Fault(_)
        ));
    }

    #[test]
    fn test_implausible_arraylet_size_with_unmapped_leaf() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(16 + 8, 8);
        image.write_u32(array + 8, 0x7FFF_FFFF);
        image.write_u32(array + 16, 0x00F0_0000);

        let (session, _) = session(image, true, false);
        assert!(matches!(
            session.objects().read_elements(array, 0, 0x7FFF_FFFF, 8),
            Err(DecodeError::Fault(_))
        ));
    }

    #[test]
    fn test_unmapped_second_leaf_faults() {
        // 64 ints per leaf; the second leaf points outside the image
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let leaf0 = image.alloc(256, 8);
        let array = image.alloc(16 + 8, 8);
        image.write_u32(array + 8, 100);
        image.write_u32(array + 16, leaf0 as u32);
        image.write_u32(array + 20, 0x00F0_0000);

        let (session, _) = session(image, true, false);
        let objects = session.objects();
        assert_eq!(objects.read_elements(array, 0, 64, 4).unwrap().len(), 256);
        assert!(matches!(
            objects.read_elements(array, 60, 8, 4),
            Err(DecodeError::Fault(_))
        ));
        assert!(matches!(
            objects.read_primitive_array(array, 0, 100, PrimitiveType::Int),
            Err(DecodeError::Fault(_))
        ));
    }

    #[test]
    fn test_null_leaf_is_corrupt() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(16 + 4, 8);
        image.write_u32(array + 8, 3);

        let (session, _) = session(image, true, false);
        assert!(matches!(
            session.objects().element_address(array, 0, 4),
            Err(DecodeError::Corrupt { what: "arraylet leaf", .. })
        ));
    }

    #[test]
    fn test_reference_array() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(16 + 16, 8);
        image.write_u32(array + 8, 2);
        image.write_u64(array + 16, 0x12340);
        image.write_u64(array + 24, 0);

        let (session, _) = session(image, false, false);
        assert_eq!(
            session.objects().read_reference_array(array, 0, 2).unwrap(),
            vec![0x12340, 0]
        );
    }

    #[test]
    fn test_zero_element_size_rejected() {
        let mut image = ImageBuilder::new(0x10000, 8, Endian::Little);
        let array = image.alloc(16, 8);
        image.write_u32(array + 4, 1);
        let (session, _) = session(image, true, false);
        assert!(matches!(
            session.objects().element_address(array, 0, 0),
            Err(DecodeError::Unsupported { .. })
        ));
    }
}
