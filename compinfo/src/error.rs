//! Crate-level error type and its classification.
use crate::{meta, scan};
use dicom_core::Tag;
use snafu::{Backtrace, Snafu};
use std::fmt;
use std::path::PathBuf;

/// An error which may occur while inspecting a DICOM file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The file could not be opened.
    #[snafu(display("Could not open file '{}'", filename.display()))]
    OpenFile {
        filename: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The input data could not be read.
    #[snafu(display("Could not read input data"))]
    ReadInput {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The input is longer than the configured limit.
    #[snafu(display("Input data exceeds the limit of {} bytes", limit))]
    InputTooLarge { limit: u64, backtrace: Backtrace },

    /// The preamble or file meta group could not be read.
    #[snafu(display("Could not read file meta group"))]
    ParseMeta { source: meta::Error },

    /// The main data set could not be scanned
    /// for the required image attributes.
    #[snafu(display("Could not scan data set"))]
    ScanDataSet { source: scan::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The pipeline stage at which an error emerged.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum Stage {
    /// Obtaining the input bytes
    Input,
    /// Reading the preamble and file meta group
    FileMeta,
    /// Scanning the main data set
    DataSet,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::FileMeta => "file-meta",
            Stage::DataSet => "data-set",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stable classification of inspection errors,
/// for callers to decide on how to present them.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// The data does not have the DICOM magic code
    NotDicom,
    /// The file meta group is structurally inconsistent
    MalformedMeta,
    /// The file meta group has no transfer syntax UID
    MissingTransferSyntax,
    /// Undefined length constructs or an unsupported byte order
    UnsupportedEncoding,
    /// The data ended in the middle of a read
    Truncated,
    /// The data set lacks one of the image attributes
    MissingRequiredAttribute {
        /// the tag of the first missing attribute
        tag: Tag,
    },
    /// The data set is structurally inconsistent,
    /// or one of the image attributes has an invalid value
    MalformedDataSet,
    /// The input could not be read
    Io,
    /// The input, or the inflated data set, exceeds the configured size limit
    InputTooLarge,
}

impl ErrorKind {
    /// A stable identifier for this kind of error.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotDicom => "NotDicom",
            ErrorKind::MalformedMeta => "MalformedMeta",
            ErrorKind::MissingTransferSyntax => "MissingTransferSyntax",
            ErrorKind::UnsupportedEncoding => "UnsupportedEncoding",
            ErrorKind::Truncated => "Truncated",
            ErrorKind::MissingRequiredAttribute { .. } => "MissingRequiredAttribute",
            ErrorKind::MalformedDataSet => "MalformedDataSet",
            ErrorKind::Io => "Io",
            ErrorKind::InputTooLarge => "InputTooLarge",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::MissingRequiredAttribute { tag } => {
                write!(f, "{}{}", self.as_str(), tag)
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

impl Error {
    /// The kind of error, independent of where it emerged.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OpenFile { .. } | Error::ReadInput { .. } => ErrorKind::Io,
            Error::InputTooLarge { .. } => ErrorKind::InputTooLarge,
            Error::ParseMeta { source } => match source {
                meta::Error::NotDicom { .. } => ErrorKind::NotDicom,
                meta::Error::ReadMagicCode { .. }
                | meta::Error::ReadHeader { .. }
                | meta::Error::ReadValue { .. } => ErrorKind::Truncated,
                meta::Error::UnexpectedDataValueLength { .. }
                | meta::Error::UndefinedValueLength { .. }
                | meta::Error::ElementOverrun { .. }
                | meta::Error::UnexpectedElement { .. }
                | meta::Error::DecodeText { .. } => ErrorKind::MalformedMeta,
                meta::Error::MissingTransferSyntax { .. } => ErrorKind::MissingTransferSyntax,
                meta::Error::UnsupportedTransferSyntax { .. } => ErrorKind::UnsupportedEncoding,
            },
            Error::ScanDataSet { source } => match source {
                scan::Error::ReadHeader { .. }
                | scan::Error::ReadValue { .. }
                | scan::Error::SkipValue { .. } => ErrorKind::Truncated,
                scan::Error::UndefinedLength { .. } => ErrorKind::UnsupportedEncoding,
                scan::Error::InflatedTooLarge { .. } => ErrorKind::InputTooLarge,
                scan::Error::InflateDataSet { .. }
                | scan::Error::UnexpectedSequenceContent { .. }
                | scan::Error::NestingTooDeep { .. }
                | scan::Error::InvalidAttributeLength { .. }
                | scan::Error::AttributeOutOfRange { .. } => ErrorKind::MalformedDataSet,
                scan::Error::MissingAttribute { tag, .. } => {
                    ErrorKind::MissingRequiredAttribute { tag: *tag }
                }
            },
        }
    }

    /// The pipeline stage which produced the error.
    pub fn stage(&self) -> Stage {
        match self {
            Error::OpenFile { .. } | Error::ReadInput { .. } | Error::InputTooLarge { .. } => {
                Stage::Input
            }
            Error::ParseMeta { .. } => Stage::FileMeta,
            Error::ScanDataSet { .. } => Stage::DataSet,
        }
    }
}
