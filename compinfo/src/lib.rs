//! Inspection of DICOM files for their compression scheme and image geometry.
//!
//! This library reads just enough of a DICOM file
//! to report its transfer syntax,
//! a human readable classification of the compression scheme it implies,
//! and the image attributes _Rows_, _Columns_ and _Bits Allocated_.
//! Pixel data is never decoded.
//!
//! Inspection is a pipeline of independent stages:
//!
//! 1. [`meta`] checks the preamble and reads the file meta group,
//!    resolving the transfer syntax and the encoding of the data set;
//! 2. [`scan`] walks the main data set looking for the image attributes;
//! 3. [`classify`] maps the transfer syntax to a [`CompressionLabel`];
//! 4. [`report`] assembles the final [`CompressionReport`].
//!
//! All stages read from a [`ByteSource`](source::ByteSource),
//! which performs all bounds checking.
//! Failures are reported through [`Error`],
//! which can be classified with [`Error::kind`] and [`Error::stage`].
//!
//! # Example
//!
//! ```no_run
//! use dicom_compinfo::{inspect_file, InspectOptions};
//!
//! let report = inspect_file("path/to/file.dcm")?;
//! println!(
//!     "{}: {}x{}, {} bits",
//!     report.compression_label,
//!     report.columns(),
//!     report.rows(),
//!     report.bits_allocated()
//! );
//!
//! // files without the 128-byte preamble
//! let report = InspectOptions::new()
//!     .require_preamble(false)
//!     .inspect_file("path/to/headless.dcm")?;
//! # Result::<(), dicom_compinfo::Error>::Ok(())
//! ```
use crate::error::{
    InputTooLargeSnafu, OpenFileSnafu, ParseMetaSnafu, ReadInputSnafu, ScanDataSetSnafu,
};
use crate::meta::MetaOptions;
use crate::scan::ScanOptions;
use crate::source::ByteSource;
use snafu::{ensure, ResultExt};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

pub mod classify;
pub mod error;
mod header;
pub mod meta;
pub mod report;
pub mod scan;
pub mod source;

pub use crate::classify::{classify, CompressionLabel};
pub use crate::error::{Error, ErrorKind, Result, Stage};
pub use crate::meta::{EncodingMode, FileMeta, VrMode};
pub use crate::report::{assemble, CompressionReport, ImageDescriptor};

/// Inspect the DICOM file contents in the given bytes,
/// using the default options.
pub fn inspect(data: &[u8]) -> Result<CompressionReport> {
    InspectOptions::new().inspect(data)
}

/// Inspect the DICOM file at the given path,
/// using the default options.
pub fn inspect_file<P>(path: P) -> Result<CompressionReport>
where
    P: AsRef<Path>,
{
    InspectOptions::new().inspect_file(path)
}

/// A builder type for inspecting DICOM data with additional options.
///
/// # Example
///
/// ```
/// # use dicom_compinfo::{ErrorKind, InspectOptions};
/// let options = InspectOptions::new()
///     .require_preamble(true)
///     .max_input_length(Some(1 << 20));
/// // too short to hold the preamble and magic code
/// let err = options.inspect(&[0; 16]).unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::Truncated);
///
/// let err = options.inspect(&[0; 256]).unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::NotDicom);
/// ```
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub struct InspectOptions {
    require_preamble: bool,
    skip_undefined_length: bool,
    max_input_length: Option<u64>,
    max_inflated_length: Option<u64>,
}

impl Default for InspectOptions {
    fn default() -> Self {
        InspectOptions {
            require_preamble: true,
            skip_undefined_length: false,
            max_input_length: None,
            max_inflated_length: None,
        }
    }
}

impl InspectOptions {
    pub fn new() -> Self {
        InspectOptions::default()
    }

    /// Set whether the 128-byte preamble and `DICM` code are required.
    ///
    /// This is the default.
    /// When disabled,
    /// data starting with the magic code or the file meta group
    /// is accepted as well.
    pub fn require_preamble(mut self, require: bool) -> Self {
        self.require_preamble = require;
        self
    }

    /// Set whether to skip over sequences and encapsulated values
    /// of undefined length in the main data set.
    ///
    /// By default these are rejected as an unsupported encoding.
    pub fn skip_undefined_length(mut self, skip: bool) -> Self {
        self.skip_undefined_length = skip;
        self
    }

    /// Set the maximum number of bytes of input to accept.
    ///
    /// There is no limit by default.
    pub fn max_input_length(mut self, limit: Option<u64>) -> Self {
        self.max_input_length = limit;
        self
    }

    /// Set the maximum number of bytes a deflated data set
    /// may inflate to.
    ///
    /// When not set, the maximum input length applies.
    pub fn max_inflated_length(mut self, limit: Option<u64>) -> Self {
        self.max_inflated_length = limit;
        self
    }

    /// Inspect the DICOM file contents in the given bytes.
    pub fn inspect(&self, data: &[u8]) -> Result<CompressionReport> {
        if let Some(limit) = self.max_input_length {
            ensure!(data.len() as u64 <= limit, InputTooLargeSnafu { limit });
        }

        let mut source = ByteSource::new(data);
        let meta = meta::parse(
            &mut source,
            MetaOptions {
                require_preamble: self.require_preamble,
            },
        )
        .context(ParseMetaSnafu)?;

        let image = scan::scan_with_options(
            &mut source,
            meta.encoding,
            ScanOptions {
                skip_undefined_length: self.skip_undefined_length,
                max_inflated_length: self.max_inflated_length.or(self.max_input_length),
            },
        )
        .context(ScanDataSetSnafu)?;

        Ok(assemble(meta.transfer_syntax, image))
    }

    /// Read all data from the given reader and inspect it.
    ///
    /// When a maximum input length is set,
    /// reading stops as soon as the limit is exceeded.
    pub fn inspect_reader<R>(&self, reader: R) -> Result<CompressionReport>
    where
        R: Read,
    {
        let data = self.read_all(reader)?;
        self.inspect(&data)
    }

    /// Inspect the DICOM file at the given path.
    pub fn inspect_file<P>(&self, path: P) -> Result<CompressionReport>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).context(OpenFileSnafu { filename: path })?;
        let data = self.read_all(file)?;
        debug!("Read {} bytes from {}", data.len(), path.display());
        self.inspect(&data)
    }

    fn read_all<R>(&self, mut reader: R) -> Result<Vec<u8>>
    where
        R: Read,
    {
        let mut data = Vec::new();
        match self.max_input_length {
            Some(limit) => {
                reader
                    .take(limit.saturating_add(1))
                    .read_to_end(&mut data)
                    .context(ReadInputSnafu)?;
                ensure!(data.len() as u64 <= limit, InputTooLargeSnafu { limit });
            }
            None => {
                reader.read_to_end(&mut data).context(ReadInputSnafu)?;
            }
        }
        Ok(data)
    }
}
