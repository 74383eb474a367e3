//! Classification of transfer syntaxes by compression scheme.
use dicom_dictionary_std::uids;
use serde::{Serialize, Serializer};
use std::fmt;

/// A human readable category of the compression applied to the pixel data,
/// as implied by the transfer syntax.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum CompressionLabel {
    /// Native pixel data, Implicit VR Little Endian
    ImplicitVrLittleEndian,
    /// Native pixel data, Explicit VR Little Endian
    ExplicitVrLittleEndian,
    /// JPEG Baseline (Process 1)
    JpegBaseline,
    /// JPEG 2000 Image Compression (Lossless Only)
    Jpeg2000Lossless,
    /// JPEG 2000 Image Compression
    Jpeg2000Lossy,
    /// Any other transfer syntax
    Unrecognized,
}

impl CompressionLabel {
    /// All labels, in classification order.
    pub const ALL: [CompressionLabel; 6] = [
        CompressionLabel::ImplicitVrLittleEndian,
        CompressionLabel::ExplicitVrLittleEndian,
        CompressionLabel::JpegBaseline,
        CompressionLabel::Jpeg2000Lossless,
        CompressionLabel::Jpeg2000Lossy,
        CompressionLabel::Unrecognized,
    ];

    /// The label text.
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionLabel::ImplicitVrLittleEndian => "Uncompressed (Implicit VR Little Endian)",
            CompressionLabel::ExplicitVrLittleEndian => "Uncompressed (Explicit VR Little Endian)",
            CompressionLabel::JpegBaseline => "JPEG Baseline",
            CompressionLabel::Jpeg2000Lossless => "JPEG 2000 Lossless",
            CompressionLabel::Jpeg2000Lossy => "JPEG 2000 Lossy",
            CompressionLabel::Unrecognized => "Unrecognized compression scheme",
        }
    }

    /// Whether the pixel data is compressed,
    /// or `None` if the transfer syntax was not recognized.
    pub fn is_compressed(self) -> Option<bool> {
        match self {
            CompressionLabel::ImplicitVrLittleEndian | CompressionLabel::ExplicitVrLittleEndian => {
                Some(false)
            }
            CompressionLabel::JpegBaseline
            | CompressionLabel::Jpeg2000Lossless
            | CompressionLabel::Jpeg2000Lossy => Some(true),
            CompressionLabel::Unrecognized => None,
        }
    }
}

impl fmt::Display for CompressionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CompressionLabel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Classify a transfer syntax UID by compression scheme.
///
/// The UID must match exactly, without trailing padding.
pub fn classify(uid: &str) -> CompressionLabel {
    match uid {
        uids::IMPLICIT_VR_LITTLE_ENDIAN => CompressionLabel::ImplicitVrLittleEndian,
        uids::EXPLICIT_VR_LITTLE_ENDIAN => CompressionLabel::ExplicitVrLittleEndian,
        uids::JPEG_BASELINE8_BIT => CompressionLabel::JpegBaseline,
        uids::JPEG2000_LOSSLESS => CompressionLabel::Jpeg2000Lossless,
        uids::JPEG2000 => CompressionLabel::Jpeg2000Lossy,
        _ => CompressionLabel::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, CompressionLabel};

    #[test]
    fn classify_known_transfer_syntaxes() {
        let table = [
            ("1.2.840.10008.1.2", "Uncompressed (Implicit VR Little Endian)"),
            ("1.2.840.10008.1.2.1", "Uncompressed (Explicit VR Little Endian)"),
            ("1.2.840.10008.1.2.4.50", "JPEG Baseline"),
            ("1.2.840.10008.1.2.4.90", "JPEG 2000 Lossless"),
            ("1.2.840.10008.1.2.4.91", "JPEG 2000 Lossy"),
        ];
        for (uid, label) in table.iter() {
            assert_eq!(classify(uid).as_str(), *label);
            assert_eq!(classify(uid).to_string(), *label);
        }
    }

    #[test]
    fn classify_other_transfer_syntaxes() {
        for uid in &[
            "1.2.840.10008.1.2.2",
            "1.2.840.10008.1.2.1.99",
            "1.2.840.10008.1.2.4.51",
            "1.2.840.10008.1.2.4.80",
            "1.2.840.10008.1.2.5",
            "1.2.3.4",
            "",
        ] {
            assert_eq!(classify(uid), CompressionLabel::Unrecognized);
            assert_eq!(classify(uid).as_str(), "Unrecognized compression scheme");
        }
    }

    #[test]
    fn no_prefix_or_padding_matching() {
        assert_eq!(classify("1.2.840.10008.1.2.4.5"), CompressionLabel::Unrecognized);
        assert_eq!(classify("1.2.840.10008.1.2.4.500"), CompressionLabel::Unrecognized);
        assert_eq!(classify("1.2.840.10008.1.2.1\0"), CompressionLabel::Unrecognized);
    }

    #[test]
    fn compression_flags() {
        assert_eq!(classify("1.2.840.10008.1.2").is_compressed(), Some(false));
        assert_eq!(classify("1.2.840.10008.1.2.4.91").is_compressed(), Some(true));
        assert_eq!(classify("1.2.3").is_compressed(), None);
        assert_eq!(
            CompressionLabel::ALL
                .iter()
                .filter(|label| label.is_compressed() == Some(true))
                .count(),
            3
        );
    }
}
