//! Scan image models.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ValidationError;

/// Imaging modality of an uploaded scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Modality {
    /// Color fundus photograph (first stage)
    FundusPhoto,
    /// Optical coherence tomography (follow-up stage)
    Oct,
}

impl Modality {
    /// Scan type recorded in the patient history for this modality.
    pub fn scan_type(&self) -> &'static str {
        match self {
            Modality::FundusPhoto => super::DEFAULT_SCAN_TYPE,
            Modality::Oct => super::OCT_SCAN_TYPE,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::FundusPhoto => write!(f, "fundus-photo"),
            Modality::Oct => write!(f, "oct"),
        }
    }
}

/// An in-memory scan image selected for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ScanImage {
    /// Original filename as selected by the user
    pub filename: String,
    /// MIME type (always `image/*`)
    pub content_type: String,
    /// Which stage this image belongs to
    pub modality: Modality,
    /// Raw file contents
    pub bytes: Vec<u8>,
}

impl ScanImage {
    /// Create a scan image, rejecting anything that is not an image type.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        modality: Modality,
        bytes: Vec<u8>,
    ) -> Result<Self, ValidationError> {
        let filename = filename.into();
        let content_type = content_type.into();

        if !content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(ValidationError::UnsupportedFileType {
                filename,
                content_type,
            });
        }

        Ok(Self {
            filename,
            content_type,
            modality,
            bytes,
        })
    }

    /// Create a scan image, guessing the content type from the file extension.
    pub fn from_filename(
        filename: impl Into<String>,
        modality: Modality,
        bytes: Vec<u8>,
    ) -> Result<Self, ValidationError> {
        let filename = filename.into();
        let content_type = content_type_for(&filename);
        Self::new(filename, content_type, modality, bytes)
    }

    /// SHA-256 of the image contents, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }

    /// Size of the image in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Bytes are left out so images can be logged.
impl fmt::Debug for ScanImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanImage")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("modality", &self.modality)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Map a filename extension to an image MIME type.
///
/// Unknown extensions map to `application/octet-stream`, which
/// [`ScanImage::new`] rejects.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_non_image() {
        let result = ScanImage::new("notes.pdf", "application/pdf", Modality::Oct, vec![1]);
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn test_from_filename_guesses_type() {
        let image = ScanImage::from_filename("LEFT_EYE.JPG", Modality::FundusPhoto, vec![1, 2])
            .unwrap();
        assert_eq!(image.content_type, "image/jpeg");
        assert_eq!(image.len(), 2);

        assert!(ScanImage::from_filename("scan", Modality::Oct, vec![]).is_err());
    }

    #[test]
    fn test_digest_is_stable() {
        let a = ScanImage::new("a.png", "image/png", Modality::Oct, b"abc".to_vec()).unwrap();
        let b = ScanImage::new("b.png", "image/png", Modality::Oct, b"abc".to_vec()).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(
            a.digest(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_modality_scan_type() {
        assert_eq!(Modality::FundusPhoto.scan_type(), "Eye Scan");
        assert_eq!(Modality::Oct.scan_type(), "OCT Scan");
        assert_eq!(Modality::FundusPhoto.to_string(), "fundus-photo");
    }
}
