//! Reading of the DICOM file preamble and file meta information group.
//!
//! The file meta group is always encoded in Explicit VR Little Endian.
//! Of its contents, only the transfer syntax UID is retained,
//! which determines the encoding of the rest of the file.
use crate::header::read_header;
use crate::source::{self, ByteSource};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use byteordered::Endianness;
use dicom_core::{Length, Tag};
use dicom_dictionary_std::{tags, uids};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use tracing::{debug, trace, warn};

/// The magic code following the file preamble.
pub const DICM_MAGIC_CODE: [u8; 4] = [b'D', b'I', b'C', b'M'];

/// The length of the file preamble, in bytes.
pub const PREAMBLE_LENGTH: usize = 128;

/// The file meta group number.
const META_GROUP: u16 = 0x0002;

#[derive(Debug, Snafu)]
pub enum Error {
    /// The parser could not read the preamble and magic code
    /// because the data ended too soon.
    #[snafu(display("Could not read the file preamble and magic code"))]
    ReadMagicCode { source: source::Error },

    /// Invalid DICOM data, detected from checking the `DICM` code.
    #[snafu(display("Invalid DICOM data: magic code `DICM` not found"))]
    NotDicom { backtrace: Backtrace },

    /// The header of the next file meta data element could not be read.
    #[snafu(display("Could not read file meta data element header"))]
    ReadHeader { source: source::Error },

    /// The value of a file meta data element could not be read.
    #[snafu(display("Could not read value of file meta data element {}", tag))]
    ReadValue { tag: Tag, source: source::Error },

    /// The value length of a data element in the file meta group
    /// was unexpected.
    #[snafu(display("Unexpected length {} for data element tagged {}", length, tag))]
    UnexpectedDataValueLength {
        tag: Tag,
        length: Length,
        backtrace: Backtrace,
    },

    /// The value length of a data element is undefined,
    /// but knowing the length is required in the file meta group.
    #[snafu(display("Undefined value length for data element tagged {}", tag))]
    UndefinedValueLength { tag: Tag, backtrace: Backtrace },

    /// A data element does not fit in the declared meta group length.
    #[snafu(display(
        "Data element {} takes {} bytes, but only {} remain in the file meta group",
        tag,
        length,
        remaining
    ))]
    ElementOverrun {
        tag: Tag,
        length: u64,
        remaining: u32,
        backtrace: Backtrace,
    },

    /// A data element outside group 0002
    /// was found within the declared file meta group length.
    #[snafu(display("Unexpected data element {} in file meta group", tag))]
    UnexpectedElement { tag: Tag, backtrace: Backtrace },

    /// The transfer syntax UID is not valid text.
    #[snafu(display("Could not decode text in data element {}", tag))]
    DecodeText {
        tag: Tag,
        source: std::str::Utf8Error,
    },

    /// The file meta group ended without a transfer syntax UID.
    #[snafu(display("Missing data element `TransferSyntax`"))]
    MissingTransferSyntax { backtrace: Backtrace },

    /// The transfer syntax declares a byte order or encoding
    /// which cannot be scanned.
    #[snafu(display("Unsupported transfer syntax {}", uid))]
    UnsupportedTransferSyntax { uid: String, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Whether value representations are present in the encoded data elements.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum VrMode {
    /// Each data element header carries a 2-character VR code
    Explicit,
    /// VRs are not encoded and must be inferred from the tag
    Implicit,
}

/// The encoding of the main data set,
/// as resolved from the transfer syntax.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub struct EncodingMode {
    /// Byte order of binary values and header fields
    pub endianness: Endianness,
    /// Explicit or implicit VR
    pub vr: VrMode,
    /// Whether the data set is compressed with the deflate algorithm
    pub deflated: bool,
}

impl EncodingMode {
    /// Implicit VR Little Endian
    pub const IMPLICIT_VR_LITTLE_ENDIAN: EncodingMode = EncodingMode {
        endianness: Endianness::Little,
        vr: VrMode::Implicit,
        deflated: false,
    };

    /// Explicit VR Little Endian
    pub const EXPLICIT_VR_LITTLE_ENDIAN: EncodingMode = EncodingMode {
        endianness: Endianness::Little,
        vr: VrMode::Explicit,
        deflated: false,
    };

    /// Deflated Explicit VR Little Endian
    pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: EncodingMode = EncodingMode {
        endianness: Endianness::Little,
        vr: VrMode::Explicit,
        deflated: true,
    };

    /// Resolve the data set encoding of the given transfer syntax.
    ///
    /// Implicit VR Little Endian is the only implicit VR transfer syntax.
    /// Explicit VR Big Endian is not supported.
    /// All other transfer syntaxes,
    /// including those with encapsulated pixel data,
    /// encode the data set in Explicit VR Little Endian.
    #[allow(deprecated)]
    pub fn from_transfer_syntax(uid: &str) -> Result<Self> {
        match uid {
            uids::IMPLICIT_VR_LITTLE_ENDIAN => Ok(Self::IMPLICIT_VR_LITTLE_ENDIAN),
            uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => {
                Ok(Self::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN)
            }
            uids::EXPLICIT_VR_BIG_ENDIAN => UnsupportedTransferSyntaxSnafu { uid }.fail(),
            _ => Ok(Self::EXPLICIT_VR_LITTLE_ENDIAN),
        }
    }
}

/// Options for reading the file meta group.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub struct MetaOptions {
    /// Whether the 128-byte preamble and `DICM` code are mandatory.
    ///
    /// When disabled, the parser also accepts data
    /// starting with the magic code
    /// or directly with the file meta group.
    pub require_preamble: bool,
}

impl Default for MetaOptions {
    fn default() -> Self {
        MetaOptions {
            require_preamble: true,
        }
    }
}

/// The outcome of reading the file meta group.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct FileMeta {
    /// Transfer Syntax UID, without trailing padding
    pub transfer_syntax: String,
    /// Encoding of the main data set
    pub encoding: EncodingMode,
    /// File Meta Information Group Length, if present
    pub group_length: Option<u32>,
    /// Number of bytes read from the start of the source,
    /// which is also the position of the main data set
    pub bytes_consumed: usize,
}

/// Read the preamble and file meta group from the source,
/// leaving it positioned at the start of the main data set.
pub fn parse(source: &mut ByteSource<'_>, options: MetaOptions) -> Result<FileMeta> {
    let start = source.position();
    read_preamble(source, options.require_preamble)?;

    let group_length = read_group_length(source)?;
    let mut transfer_syntax: Option<String> = None;

    if let Some(group_length) = group_length {
        let mut remaining = group_length;
        while remaining > 0 {
            let header = read_header(source, Endianness::Little, VrMode::Explicit)
                .context(ReadHeaderSnafu)?;
            let tag = header.tag;
            let len = header
                .length
                .get()
                .context(UndefinedValueLengthSnafu { tag })?;
            let element_length = header.header_length as u64 + u64::from(len);
            ensure!(
                element_length <= u64::from(remaining),
                ElementOverrunSnafu {
                    tag,
                    length: element_length,
                    remaining,
                }
            );
            let value = source
                .read_exact(len as usize)
                .context(ReadValueSnafu { tag })?;
            remaining -= element_length as u32;
            read_element(tag, value, &mut transfer_syntax)?;
        }
    } else {
        warn!("File meta group length is missing, reading until the end of group 0002");
        while next_group(source) == Some(META_GROUP) {
            let header = read_header(source, Endianness::Little, VrMode::Explicit)
                .context(ReadHeaderSnafu)?;
            let tag = header.tag;
            let len = header
                .length
                .get()
                .context(UndefinedValueLengthSnafu { tag })?;
            let value = source
                .read_exact(len as usize)
                .context(ReadValueSnafu { tag })?;
            read_element(tag, value, &mut transfer_syntax)?;
        }
    }

    let transfer_syntax = transfer_syntax
        .filter(|uid| !uid.is_empty())
        .context(MissingTransferSyntaxSnafu)?;
    let encoding = EncodingMode::from_transfer_syntax(&transfer_syntax)?;
    debug!("Transfer syntax: {} ({:?})", transfer_syntax, encoding);

    Ok(FileMeta {
        transfer_syntax,
        encoding,
        group_length,
        bytes_consumed: source.position() - start,
    })
}

fn read_preamble(source: &mut ByteSource<'_>, require_preamble: bool) -> Result<()> {
    if require_preamble {
        source.skip(PREAMBLE_LENGTH).context(ReadMagicCodeSnafu)?;
        let magic = source.read_exact(4).context(ReadMagicCodeSnafu)?;
        ensure!(magic == &DICM_MAGIC_CODE[..], NotDicomSnafu);
        return Ok(());
    }

    let with_preamble = source
        .peek_exact(PREAMBLE_LENGTH + 4)
        .map(|bytes| bytes[PREAMBLE_LENGTH..] == DICM_MAGIC_CODE[..])
        .unwrap_or(false);
    if with_preamble {
        source
            .skip(PREAMBLE_LENGTH + 4)
            .context(ReadMagicCodeSnafu)?;
        return Ok(());
    }

    let starts_with_magic = source
        .peek_exact(4)
        .map(|bytes| bytes == &DICM_MAGIC_CODE[..])
        .unwrap_or(false);
    if starts_with_magic {
        debug!("No file preamble, data starts with magic code");
        source.skip(4).context(ReadMagicCodeSnafu)?;
        return Ok(());
    }

    let group = source.peek_exact(2).context(ReadMagicCodeSnafu)?;
    ensure!(LittleEndian::read_u16(group) == META_GROUP, NotDicomSnafu);
    debug!("No file preamble or magic code, data starts with file meta group");
    Ok(())
}

/// Read the File Meta Information Group Length element,
/// if it is the next element in the source.
fn read_group_length(source: &mut ByteSource<'_>) -> Result<Option<u32>> {
    let next = source.peek_exact(4).context(ReadHeaderSnafu)?;
    let next_tag = Tag(
        LittleEndian::read_u16(&next[0..2]),
        LittleEndian::read_u16(&next[2..4]),
    );
    if next_tag != tags::FILE_META_INFORMATION_GROUP_LENGTH {
        return Ok(None);
    }

    let header =
        read_header(source, Endianness::Little, VrMode::Explicit).context(ReadHeaderSnafu)?;
    ensure!(
        header.length == Length(4),
        UnexpectedDataValueLengthSnafu {
            tag: header.tag,
            length: header.length,
        }
    );
    let value = source
        .read_u32(Endianness::Little)
        .context(ReadValueSnafu { tag: header.tag })?;
    Ok(Some(value))
}

/// The group number of the next data element, if any.
fn next_group(source: &ByteSource<'_>) -> Option<u16> {
    source
        .peek_exact(2)
        .ok()
        .map(LittleEndian::read_u16)
}

fn read_element(tag: Tag, value: &[u8], transfer_syntax: &mut Option<String>) -> Result<()> {
    match tag {
        tags::TRANSFER_SYNTAX_UID => {
            let uid = std::str::from_utf8(value)
                .context(DecodeTextSnafu { tag })?
                .trim_end_matches(|c: char| c == '\0' || c == ' ');
            if let Some(previous) = transfer_syntax {
                warn!(
                    "Transfer syntax declared more than once ({} and {}), keeping the first",
                    previous, uid
                );
            } else {
                *transfer_syntax = Some(uid.to_string());
            }
        }
        Tag(META_GROUP, _) => {
            trace!("Skipping file meta data element {}", tag);
        }
        _ => return UnexpectedElementSnafu { tag }.fail(),
    }
    Ok(())
}
