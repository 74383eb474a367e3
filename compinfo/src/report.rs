//! The compression report and its assembly.
use crate::classify::{classify, CompressionLabel};
use serde::Serialize;

/// The image geometry attributes of a DICOM data set.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    /// Rows (0028,0010)
    pub rows: u16,
    /// Columns (0028,0011)
    pub columns: u16,
    /// Bits Allocated (0028,0100)
    pub bits_allocated: u16,
}

/// The outcome of inspecting a DICOM file.
#[derive(Debug, Clone, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionReport {
    /// Transfer Syntax UID, without trailing padding
    pub transfer_syntax_uid: String,
    /// Compression category of the transfer syntax
    pub compression_label: CompressionLabel,
    #[serde(flatten)]
    pub image: ImageDescriptor,
}

impl CompressionReport {
    pub fn rows(&self) -> u16 {
        self.image.rows
    }

    pub fn columns(&self) -> u16 {
        self.image.columns
    }

    pub fn bits_allocated(&self) -> u16 {
        self.image.bits_allocated
    }
}

/// Combine the transfer syntax and the scanned image attributes
/// into a report.
pub fn assemble(uid: impl Into<String>, image: ImageDescriptor) -> CompressionReport {
    let transfer_syntax_uid = uid.into();
    let compression_label = classify(&transfer_syntax_uid);
    CompressionReport {
        transfer_syntax_uid,
        compression_label,
        image,
    }
}

#[cfg(test)]
mod tests {
    use super::{assemble, ImageDescriptor};
    use crate::classify::CompressionLabel;

    #[test]
    fn assemble_report() {
        let image = ImageDescriptor {
            rows: 480,
            columns: 640,
            bits_allocated: 8,
        };
        let report = assemble("1.2.840.10008.1.2.4.50", image);
        assert_eq!(report.transfer_syntax_uid, "1.2.840.10008.1.2.4.50");
        assert_eq!(report.compression_label, CompressionLabel::JpegBaseline);
        assert_eq!(report.image, image);
        assert_eq!(report.rows(), 480);
        assert_eq!(report.columns(), 640);
        assert_eq!(report.bits_allocated(), 8);
    }

    #[test]
    fn report_to_json() {
        let report = assemble(
            "1.2.840.10008.1.2.1",
            ImageDescriptor {
                rows: 512,
                columns: 256,
                bits_allocated: 16,
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "transferSyntaxUid": "1.2.840.10008.1.2.1",
                "compressionLabel": "Uncompressed (Explicit VR Little Endian)",
                "rows": 512,
                "columns": 256,
                "bitsAllocated": 16,
            })
        );
    }
}
