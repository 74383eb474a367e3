//! Data element header decoding for the supported encodings.
use crate::meta::VrMode;
use crate::source::{ByteSource, Result};
use byteordered::Endianness;
use dicom_core::{Length, Tag, VR};

/// The group number shared by items and delimiters.
pub(crate) const ITEM_GROUP: u16 = 0xFFFE;

/// Item (FFFE,E000)
pub(crate) const ITEM: Tag = Tag(ITEM_GROUP, 0xE000);

/// Item Delimitation Item (FFFE,E00D)
pub(crate) const ITEM_DELIMITER: Tag = Tag(ITEM_GROUP, 0xE00D);

/// Sequence Delimitation Item (FFFE,E0DD)
pub(crate) const SEQUENCE_DELIMITER: Tag = Tag(ITEM_GROUP, 0xE0DD);

/// The decoded header of a single data element.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ElementHeader {
    /// The attribute tag
    pub tag: Tag,
    /// The value representation,
    /// only available in explicit VR encodings
    /// and never for items or delimiters
    pub vr: Option<VR>,
    /// The value length, possibly undefined
    pub length: Length,
    /// The number of bytes taken by the header itself
    pub header_length: usize,
}

impl ElementHeader {
    /// Whether this header is for an item or a delimiter.
    #[inline]
    pub fn is_item_or_delimiter(&self) -> bool {
        self.tag.group() == ITEM_GROUP
    }
}

/// Read the next data element header from the source.
pub fn read_header(
    source: &mut ByteSource<'_>,
    endianness: Endianness,
    vr_mode: VrMode,
) -> Result<ElementHeader> {
    let group = source.read_u16(endianness)?;
    let element = source.read_u16(endianness)?;
    let tag = Tag(group, element);

    if vr_mode == VrMode::Implicit || group == ITEM_GROUP {
        // item delimiters do not have VR or reserved field
        let len = source.read_u32(endianness)?;
        return Ok(ElementHeader {
            tag,
            vr: None,
            length: Length(len),
            header_length: 8,
        });
    }

    let vr_code = source.read_exact(2)?;
    let vr = VR::from_binary([vr_code[0], vr_code[1]]).unwrap_or(VR::UN);

    if has_short_length(vr) {
        let len = source.read_u16(endianness)?;
        Ok(ElementHeader {
            tag,
            vr: Some(vr),
            length: Length(u32::from(len)),
            header_length: 8,
        })
    } else {
        // 2 reserved bytes, then a 32-bit length
        source.skip(2)?;
        let len = source.read_u32(endianness)?;
        Ok(ElementHeader {
            tag,
            vr: Some(vr),
            length: Length(len),
            header_length: 12,
        })
    }
}

/// Whether the value length of an element with this VR
/// is encoded in 16 bits in explicit VR transfer syntaxes (PS3.5 7.1.2).
fn has_short_length(vr: VR) -> bool {
    matches!(
        vr,
        VR::AE
            | VR::AS
            | VR::AT
            | VR::CS
            | VR::DA
            | VR::DS
            | VR::DT
            | VR::FL
            | VR::FD
            | VR::IS
            | VR::LO
            | VR::LT
            | VR::PN
            | VR::SH
            | VR::SL
            | VR::SS
            | VR::ST
            | VR::TM
            | VR::UI
            | VR::UL
            | VR::US
    )
}

#[cfg(test)]
mod tests {
    use super::{read_header, ITEM, ITEM_DELIMITER, SEQUENCE_DELIMITER};
    use crate::meta::VrMode;
    use crate::source::ByteSource;
    use byteordered::Endianness;
    use dicom_core::{Length, Tag, VR};

    #[rustfmt::skip]
    const EXPLICIT_LE: &[u8] = &[
        0x28, 0x00, 0x10, 0x00,     // (0028,0010) Rows
            b'U', b'S',             // VR: US
            0x02, 0x00,             // Length: 2
                0x00, 0x02,
        0xE0, 0x7F, 0x10, 0x00,     // (7FE0,0010) Pixel Data
            b'O', b'W',             // VR: OW
            0x00, 0x00,             // Reserved
            0x00, 0x00, 0x08, 0x00, // Length: 0x80000
        0xFE, 0xFF, 0x00, 0xE0,     // (FFFE,E000) Item
            0xFF, 0xFF, 0xFF, 0xFF, // Length: undefined
        0x09, 0x00, 0x10, 0x00,     // (0009,0010) private creator
            b'?', b'?',             // unknown VR
            0x00, 0x00,             // Reserved
            0x04, 0x00, 0x00, 0x00, // Length: 4
    ];

    #[test]
    fn decode_explicit_vr_little_endian_headers() {
        let mut source = ByteSource::new(EXPLICIT_LE);

        let header = read_header(&mut source, Endianness::Little, VrMode::Explicit).unwrap();
        assert_eq!(header.tag, Tag(0x0028, 0x0010));
        assert_eq!(header.vr, Some(VR::US));
        assert_eq!(header.length, Length(2));
        assert_eq!(header.header_length, 8);
        source.skip(2).unwrap();

        let header = read_header(&mut source, Endianness::Little, VrMode::Explicit).unwrap();
        assert_eq!(header.tag, Tag(0x7FE0, 0x0010));
        assert_eq!(header.vr, Some(VR::OW));
        assert_eq!(header.length, Length(0x0008_0000));
        assert_eq!(header.header_length, 12);

        let header = read_header(&mut source, Endianness::Little, VrMode::Explicit).unwrap();
        assert!(header.is_item_or_delimiter());
        assert_eq!(header.vr, None);
        assert!(header.length.is_undefined());
        assert_eq!(header.header_length, 8);

        let header = read_header(&mut source, Endianness::Little, VrMode::Explicit).unwrap();
        assert_eq!(header.tag, Tag(0x0009, 0x0010));
        assert_eq!(header.vr, Some(VR::UN));
        assert_eq!(header.length, Length(4));

        assert!(source.is_empty());
    }

    #[test]
    fn decode_implicit_vr_little_endian_header() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0x28, 0x00, 0x00, 0x01, // (0028,0100) Bits Allocated
            0x02, 0x00, 0x00, 0x00, // Length: 2
        ];
        let mut source = ByteSource::new(raw);
        let header = read_header(&mut source, Endianness::Little, VrMode::Implicit).unwrap();
        assert_eq!(header.tag, Tag(0x0028, 0x0100));
        assert_eq!(header.vr, None);
        assert_eq!(header.length, Length(2));
        assert_eq!(header.header_length, 8);
    }

    #[test]
    fn decode_item_and_delimiters() {
        #[rustfmt::skip]
        let raw: &[u8] = &[
            0xFE, 0xFF, 0x00, 0xE0,     // (FFFE,E000) Item
                0x04, 0x00, 0x00, 0x00, // Length: 4
            0xFE, 0xFF, 0x0D, 0xE0,     // (FFFE,E00D) Item Delimitation Item
                0x00, 0x00, 0x00, 0x00,
            0xFE, 0xFF, 0xDD, 0xE0,     // (FFFE,E0DD) Sequence Delimitation Item
                0x00, 0x00, 0x00, 0x00,
        ];
        let mut source = ByteSource::new(raw);
        for expected in &[ITEM, ITEM_DELIMITER, SEQUENCE_DELIMITER] {
            let header = read_header(&mut source, Endianness::Little, VrMode::Explicit).unwrap();
            assert_eq!(header.tag, *expected);
            assert!(header.is_item_or_delimiter());
            assert_eq!(header.vr, None);
        }
        assert_eq!(ITEM, Tag(0xFFFE, 0xE000));
        assert_eq!(ITEM_DELIMITER, Tag(0xFFFE, 0xE00D));
        assert_eq!(SEQUENCE_DELIMITER, Tag(0xFFFE, 0xE0DD));
    }

    #[test]
    fn truncated_header_fails() {
        let mut source = ByteSource::new(&EXPLICIT_LE[..6]);
        assert!(read_header(&mut source, Endianness::Little, VrMode::Explicit).is_err());
    }
}
