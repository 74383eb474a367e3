//! Scanning of the main data set for the image attributes of the report.
//!
//! The scanner does not decode the data set in full.
//! It walks the top level data elements,
//! decodes the few attributes listed in [`REQUIRED_ATTRIBUTES`]
//! and skips everything else by value length.
use crate::header::{read_header, ElementHeader, ITEM, ITEM_DELIMITER, SEQUENCE_DELIMITER};
use crate::meta::{EncodingMode, VrMode};
use crate::report::ImageDescriptor;
use crate::source::{self, ByteSource};
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::convert::TryFrom;
use std::io::Read;
use tracing::{debug, trace, warn};

/// The maximum depth of nested sequences
/// accepted when skipping undefined length values.
pub const MAX_NESTING_DEPTH: u32 = 64;

#[derive(Debug, Snafu)]
pub enum Error {
    /// The deflated data set could not be decompressed.
    #[snafu(display("Could not inflate deflated data set"))]
    InflateDataSet {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The inflated data set exceeds the configured limit.
    #[snafu(display("Inflated data set exceeds the limit of {} bytes", limit))]
    InflatedTooLarge { limit: u64, backtrace: Backtrace },

    /// The header of a data element could not be read.
    #[snafu(display("Could not read data element header at byte {}", position))]
    ReadHeader {
        position: usize,
        source: source::Error,
    },

    /// The value of a required attribute could not be read.
    #[snafu(display("Could not read value of data element {}", tag))]
    ReadValue { tag: Tag, source: source::Error },

    /// The value of a data element could not be skipped over.
    #[snafu(display("Could not skip value of data element {}", tag))]
    SkipValue { tag: Tag, source: source::Error },

    /// A data element has an undefined length,
    /// which is not supported in this context.
    #[snafu(display("Undefined value length in data element {} is not supported", tag))]
    UndefinedLength { tag: Tag, backtrace: Backtrace },

    /// A sequence of undefined length contained something other than an item.
    #[snafu(display("Unexpected data element {} in sequence", tag))]
    UnexpectedSequenceContent { tag: Tag, backtrace: Backtrace },

    /// Sequences are nested deeper than supported.
    #[snafu(display("Sequences nested more than {} levels deep", MAX_NESTING_DEPTH))]
    NestingTooDeep { backtrace: Backtrace },

    /// The value of a required attribute has an unexpected length.
    #[snafu(display("Invalid value length {} for {} {}", length, alias, tag))]
    InvalidAttributeLength {
        tag: Tag,
        alias: &'static str,
        length: u32,
        backtrace: Backtrace,
    },

    /// The value of a required attribute does not fit in 16 bits.
    #[snafu(display("Value {} of {} {} is out of range", value, alias, tag))]
    AttributeOutOfRange {
        tag: Tag,
        alias: &'static str,
        value: u32,
        backtrace: Backtrace,
    },

    /// The data set ended without one of the required attributes.
    #[snafu(display("Missing data element `{}` {}", alias, tag))]
    MissingAttribute {
        tag: Tag,
        alias: &'static str,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An attribute which the scanner needs to find in the data set.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub struct RequiredAttribute {
    /// The attribute tag
    pub tag: Tag,
    /// The attribute keyword
    pub alias: &'static str,
    /// The value representation,
    /// as used when it is not present in the encoded data
    pub vr: VR,
}

/// The attributes composing an [`ImageDescriptor`],
/// in the order of its fields.
pub const REQUIRED_ATTRIBUTES: [RequiredAttribute; 3] = [
    RequiredAttribute {
        tag: tags::ROWS,
        alias: "Rows",
        vr: VR::US,
    },
    RequiredAttribute {
        tag: tags::COLUMNS,
        alias: "Columns",
        vr: VR::US,
    },
    RequiredAttribute {
        tag: tags::BITS_ALLOCATED,
        alias: "BitsAllocated",
        vr: VR::US,
    },
];

/// Options for scanning the main data set.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct ScanOptions {
    /// Whether to skip over sequences and encapsulated values
    /// of undefined length by following their item delimiters,
    /// instead of failing with [`Error::UndefinedLength`].
    pub skip_undefined_length: bool,
    /// The maximum number of bytes a deflated data set may inflate to,
    /// or `None` for no limit.
    pub max_inflated_length: Option<u64>,
}

/// Scan the data set in the source for the image descriptor attributes,
/// using the default options.
pub fn scan(source: &mut ByteSource<'_>, mode: EncodingMode) -> Result<ImageDescriptor> {
    scan_with_options(source, mode, ScanOptions::default())
}

/// Scan the data set in the source for the image descriptor attributes.
///
/// The source must be positioned at the start of the main data set.
/// If the encoding mode declares a deflated data set,
/// the remaining bytes are inflated before scanning.
pub fn scan_with_options(
    source: &mut ByteSource<'_>,
    mode: EncodingMode,
    options: ScanOptions,
) -> Result<ImageDescriptor> {
    if mode.deflated {
        let compressed = source.read_to_end();
        let inflated = inflate(compressed, options.max_inflated_length)?;
        debug!(
            "Inflated data set from {} to {} bytes",
            compressed.len(),
            inflated.len()
        );
        return scan_data_set(&mut ByteSource::new(&inflated), mode, options);
    }

    scan_data_set(source, mode, options)
}

/// Inflate a raw deflate stream,
/// reading at most one byte past the limit to detect overflow.
fn inflate(compressed: &[u8], limit: Option<u64>) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::DeflateDecoder::new(compressed);
    let mut inflated = Vec::new();
    match limit {
        Some(limit) => {
            decoder
                .take(limit.saturating_add(1))
                .read_to_end(&mut inflated)
                .context(InflateDataSetSnafu)?;
            ensure!(
                inflated.len() as u64 <= limit,
                InflatedTooLargeSnafu { limit }
            );
        }
        None => {
            decoder
                .read_to_end(&mut inflated)
                .context(InflateDataSetSnafu)?;
        }
    }
    Ok(inflated)
}

fn scan_data_set(
    source: &mut ByteSource<'_>,
    mode: EncodingMode,
    options: ScanOptions,
) -> Result<ImageDescriptor> {
    let mut values: [Option<u16>; 3] = [None; 3];

    while values.iter().any(Option::is_none) && !source.is_empty() {
        let position = source.position();
        let header = read_header(source, mode.endianness, mode.vr)
            .context(ReadHeaderSnafu { position })?;
        if header.is_item_or_delimiter() {
            warn!("Unexpected {} at the top level of the data set", header.tag);
        }

        let required = REQUIRED_ATTRIBUTES
            .iter()
            .position(|attribute| attribute.tag == header.tag);
        if let Some(index) = required {
            let value = read_attribute(source, &REQUIRED_ATTRIBUTES[index], &header, mode)?;
            if let Some(previous) = values[index] {
                warn!(
                    "{} declared more than once ({} and {}), keeping the first",
                    REQUIRED_ATTRIBUTES[index].alias, previous, value
                );
            } else {
                debug!("{} = {}", REQUIRED_ATTRIBUTES[index].alias, value);
                values[index] = Some(value);
            }
            continue;
        }

        if header.length.is_undefined() {
            ensure!(
                options.skip_undefined_length,
                UndefinedLengthSnafu { tag: header.tag }
            );
        }
        skip_element(source, &header, mode.endianness, mode.vr, 0)?;
    }

    let [rows, columns, bits_allocated] = values;
    Ok(ImageDescriptor {
        rows: require(rows, &REQUIRED_ATTRIBUTES[0])?,
        columns: require(columns, &REQUIRED_ATTRIBUTES[1])?,
        bits_allocated: require(bits_allocated, &REQUIRED_ATTRIBUTES[2])?,
    })
}

fn require(value: Option<u16>, attribute: &RequiredAttribute) -> Result<u16> {
    value.context(MissingAttributeSnafu {
        tag: attribute.tag,
        alias: attribute.alias,
    })
}

/// Read and decode the value of a required attribute
/// as an unsigned integer.
fn read_attribute(
    source: &mut ByteSource<'_>,
    attribute: &RequiredAttribute,
    header: &ElementHeader,
    mode: EncodingMode,
) -> Result<u16> {
    let tag = header.tag;
    let len = header
        .length
        .get()
        .context(UndefinedLengthSnafu { tag })?;
    let vr = header.vr.unwrap_or(attribute.vr);
    if vr != attribute.vr {
        warn!(
            "{} {} encoded with VR {}, expected {}",
            attribute.alias,
            tag,
            vr,
            attribute.vr
        );
    }

    let bytes = source
        .read_exact(len as usize)
        .context(ReadValueSnafu { tag })?;

    match (bytes.len(), mode.endianness) {
        (2, Endianness::Little) => Ok(LittleEndian::read_u16(bytes)),
        (2, Endianness::Big) => Ok(BigEndian::read_u16(bytes)),
        (4, endianness) => {
            let value = match endianness {
                Endianness::Little => LittleEndian::read_u32(bytes),
                Endianness::Big => BigEndian::read_u32(bytes),
            };
            u16::try_from(value).ok().context(AttributeOutOfRangeSnafu {
                tag,
                alias: attribute.alias,
                value,
            })
        }
        _ => InvalidAttributeLengthSnafu {
            tag,
            alias: attribute.alias,
            length: len,
        }
        .fail(),
    }
}

/// Skip over the value of the element whose header was just read.
fn skip_element(
    source: &mut ByteSource<'_>,
    header: &ElementHeader,
    endianness: Endianness,
    vr_mode: VrMode,
    depth: u32,
) -> Result<()> {
    let tag = header.tag;
    match header.length.get() {
        Some(len) => {
            trace!("Skipping {} ({} bytes)", tag, len);
            source.skip(len as usize).context(SkipValueSnafu { tag })
        }
        None => {
            // the contents of UN of undefined length
            // are always in Implicit VR Little Endian (PS3.5 6.2.2)
            let (endianness, vr_mode) = if header.vr == Some(VR::UN) {
                (Endianness::Little, VrMode::Implicit)
            } else {
                (endianness, vr_mode)
            };
            trace!("Skipping {} of undefined length", tag);
            skip_undefined_sequence(source, endianness, vr_mode, depth + 1)
        }
    }
}

/// Skip the items of a sequence or encapsulated value of undefined length,
/// up to and including its sequence delimiter.
fn skip_undefined_sequence(
    source: &mut ByteSource<'_>,
    endianness: Endianness,
    vr_mode: VrMode,
    depth: u32,
) -> Result<()> {
    ensure!(depth <= MAX_NESTING_DEPTH, NestingTooDeepSnafu);

    loop {
        let position = source.position();
        let header =
            read_header(source, endianness, vr_mode).context(ReadHeaderSnafu { position })?;
        match header.tag {
            SEQUENCE_DELIMITER => return Ok(()),
            ITEM => {
                if let Some(len) = header.length.get() {
                    source
                        .skip(len as usize)
                        .context(SkipValueSnafu { tag: header.tag })?;
                } else {
                    skip_undefined_item(source, endianness, vr_mode, depth)?;
                }
            }
            tag => return UnexpectedSequenceContentSnafu { tag }.fail(),
        }
    }
}

/// Skip the data elements of an item of undefined length,
/// up to and including its item delimiter.
fn skip_undefined_item(
    source: &mut ByteSource<'_>,
    endianness: Endianness,
    vr_mode: VrMode,
    depth: u32,
) -> Result<()> {
    loop {
        let position = source.position();
        let header =
            read_header(source, endianness, vr_mode).context(ReadHeaderSnafu { position })?;
        if header.tag == ITEM_DELIMITER {
            return Ok(());
        }
        skip_element(source, &header, endianness, vr_mode, depth)?;
    }
}
