//! Object and array header shapes

use crate::profile::AbiProfile;
use serde::Serialize;

/// The four indexable header variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeaderShape {
    /// 4-byte reference slots
    Narrow,
    NarrowWithDataAddress,
    /// 8-byte reference slots
    Wide,
    WideWithDataAddress,
}

/// How an array's elements are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArrayLayout {
    InlineContiguous,
    /// Elements live in fixed-size leaves reached through the arrayoid
    Discontiguous,
}

/// Resolved header geometry for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeaderLayout {
    pub shape: HeaderShape,
    /// Class slot plus monitor slot of a non-indexable object
    pub object_header_size: u64,
    pub contiguous_size_offset: u64,
    pub contiguous_header_size: u64,
    pub discontiguous_size_offset: u64,
    pub discontiguous_header_size: u64,
    pub contiguous_data_address_offset: Option<u64>,
    pub discontiguous_data_address_offset: Option<u64>,
}

impl HeaderLayout {
    /// Select the header shape from the effective reference width
    pub fn for_abi(abi: &AbiProfile) -> Self {
        let reference = abi.reference_size();
        let pointer = abi.pointer_size();
        let shape = match (reference == 4, abi.data_address_present) {
            (true, false) => HeaderShape::Narrow,
            (true, true) => HeaderShape::NarrowWithDataAddress,
            (false, false) => HeaderShape::Wide,
            (false, true) => HeaderShape::WideWithDataAddress,
        };

        let (contiguous_size_offset, discontiguous_size_offset, contiguous, discontiguous) =
            match shape {
                HeaderShape::Narrow | HeaderShape::NarrowWithDataAddress => (4, 8, 8, 16),
                HeaderShape::Wide | HeaderShape::WideWithDataAddress => (8, 12, 16, 16),
            };

        let (contiguous_header_size, discontiguous_header_size, data_address) = match shape {
            HeaderShape::Narrow | HeaderShape::Wide => (contiguous, discontiguous, None),
            HeaderShape::NarrowWithDataAddress => (
                contiguous + pointer,
                discontiguous + pointer,
                Some((contiguous, discontiguous)),
            ),
            HeaderShape::WideWithDataAddress => (24, 24, Some((16, 16))),
        };

        Self {
            shape,
            object_header_size: 2 * reference,
            contiguous_size_offset,
            contiguous_header_size,
            discontiguous_size_offset,
            discontiguous_header_size,
            contiguous_data_address_offset: data_address.map(|(c, _)| c),
            discontiguous_data_address_offset: data_address.map(|(_, d)| d),
        }
    }

    pub fn header_size(&self, layout: ArrayLayout) -> u64 {
        match layout {
            ArrayLayout::InlineContiguous => self.contiguous_header_size,
            ArrayLayout::Discontiguous => self.discontiguous_header_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::PointerWidth;

    fn abi(width: PointerWidth, compressed: bool, mixed: bool, data_address: bool) -> AbiProfile {
        AbiProfile {
            pointer_width: width,
            compressed_references: compressed,
            mixed_reference_mode: mixed,
            data_address_present: data_address,
        }
    }

    #[test]
    fn test_narrow_shapes() {
        let narrow = HeaderLayout::for_abi(&abi(PointerWidth::Bits64, true, false, false));
        assert_eq!(narrow.shape, HeaderShape::Narrow);
        assert_eq!(narrow.object_header_size, 8);
        assert_eq!(narrow.contiguous_header_size, 8);
        assert_eq!(narrow.discontiguous_header_size, 16);
        assert_eq!(narrow.contiguous_data_address_offset, None);

        let with_data = HeaderLayout::for_abi(&abi(PointerWidth::Bits64, true, false, true));
        assert_eq!(with_data.shape, HeaderShape::NarrowWithDataAddress);
        assert_eq!(with_data.contiguous_header_size, 16);
        assert_eq!(with_data.discontiguous_header_size, 24);
        assert_eq!(with_data.contiguous_data_address_offset, Some(8));
        assert_eq!(with_data.discontiguous_data_address_offset, Some(16));
    }

    #[test]
    fn test_narrow_32bit_data_address() {
        let layout = HeaderLayout::for_abi(&abi(PointerWidth::Bits32, false, false, true));
        assert_eq!(layout.shape, HeaderShape::NarrowWithDataAddress);
        assert_eq!(layout.contiguous_header_size, 12);
        assert_eq!(layout.discontiguous_header_size, 20);
    }

    #[test]
    fn test_wide_shapes() {
        let wide = HeaderLayout::for_abi(&abi(PointerWidth::Bits64, false, false, false));
        assert_eq!(wide.shape, HeaderShape::Wide);
        assert_eq!(wide.object_header_size, 16);
        assert_eq!(wide.contiguous_size_offset, 8);
        assert_eq!(wide.discontiguous_size_offset, 12);
        assert_eq!(wide.header_size(ArrayLayout::InlineContiguous), 16);

        let with_data = HeaderLayout::for_abi(&abi(PointerWidth::Bits64, false, false, true));
        assert_eq!(with_data.shape, HeaderShape::WideWithDataAddress);
        assert_eq!(with_data.header_size(ArrayLayout::Discontiguous), 24);
        assert_eq!(with_data.contiguous_data_address_offset, Some(16));
    }

    #[test]
    fn test_mixed_mode_follows_effective_width() {
        let compressed = HeaderLayout::for_abi(&abi(PointerWidth::Bits64, true, true, false));
        let full = HeaderLayout::for_abi(&abi(PointerWidth::Bits64, false, true, false));
        assert_eq!(compressed.shape, HeaderShape::Narrow);
        assert_eq!(full.shape, HeaderShape::Wide);
    }
}
