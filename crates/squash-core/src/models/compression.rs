use serde::{Deserialize, Serialize};
use std::path::Path;

use super::artifact::ArtifactId;
use crate::error::AppError;

/// Coarse classification of submitted bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeClass {
    Image,
    Pdf,
}

impl MimeClass {
    /// Classify a MIME type. Anything other than `image/*` or `application/pdf`
    /// is unsupported.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();

        if essence == "application/pdf" {
            Some(MimeClass::Pdf)
        } else if essence.starts_with("image/") {
            Some(MimeClass::Image)
        } else {
            None
        }
    }
}

/// Caller supplied byte budget. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    kilobytes: u64,
}

impl TargetSize {
    pub fn from_kb(kilobytes: u64) -> Result<Self, AppError> {
        if kilobytes == 0 {
            return Err(AppError::InvalidInput(
                "Target size must be a positive number of kilobytes".to_string(),
            ));
        }
        if kilobytes.checked_mul(1024).is_none() {
            return Err(AppError::InvalidInput(format!(
                "Target size is too large: {} KB",
                kilobytes
            )));
        }
        Ok(TargetSize { kilobytes })
    }

    pub fn kilobytes(self) -> u64 {
        self.kilobytes
    }

    pub fn bytes(self) -> u64 {
        self.kilobytes * 1024
    }

    pub fn fits(self, len: usize) -> bool {
        (len as u64) <= self.bytes()
    }
}

/// Everything needed to run one compression.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub data: Vec<u8>,
    pub content_type: String,
    pub filename: Option<String>,
    pub target: Option<TargetSize>,
}

impl CompressionRequest {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
            filename: None,
            target: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_target(mut self, target: TargetSize) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the target from a raw kilobyte count, rejecting zero.
    pub fn with_target_kb(self, kilobytes: u64) -> Result<Self, AppError> {
        Ok(self.with_target(TargetSize::from_kb(kilobytes)?))
    }

    pub fn mime_class(&self) -> Option<MimeClass> {
        MimeClass::from_content_type(&self.content_type)
    }

    /// Extension of the original file name, used to name the upload artifact.
    pub fn original_extension(&self) -> Option<&str> {
        self.filename
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
    }
}

/// What the transport layer receives after a successful compression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionResult {
    pub output_artifact_id: ArtifactId,
    pub original_size_bytes: u64,
    pub compressed_size_bytes: u64,
    /// `false` when a target was given but could not be reached; the output is
    /// then the smallest encoding that could be produced.
    pub met_target: bool,
    pub output_mime: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_class_from_content_type() {
        assert_eq!(
            MimeClass::from_content_type("image/jpeg"),
            Some(MimeClass::Image)
        );
        assert_eq!(
            MimeClass::from_content_type("IMAGE/PNG; charset=binary"),
            Some(MimeClass::Image)
        );
        assert_eq!(
            MimeClass::from_content_type("application/pdf"),
            Some(MimeClass::Pdf)
        );
        assert_eq!(MimeClass::from_content_type("text/plain"), None);
        assert_eq!(MimeClass::from_content_type(""), None);
    }

    #[test]
    fn test_target_size_rejects_zero() {
        assert!(TargetSize::from_kb(0).is_err());
        assert!(TargetSize::from_kb(u64::MAX).is_err());

        let target = TargetSize::from_kb(50).unwrap();
        assert_eq!(target.bytes(), 51_200);
        assert!(target.fits(51_200));
        assert!(!target.fits(51_201));
    }

    #[test]
    fn test_request_builder() {
        let request = CompressionRequest::new(vec![1, 2, 3], "image/png")
            .with_filename("holiday.photo.PNG")
            .with_target_kb(20)
            .unwrap();

        assert_eq!(request.mime_class(), Some(MimeClass::Image));
        assert_eq!(request.original_extension(), Some("PNG"));
        assert_eq!(request.target.map(TargetSize::bytes), Some(20_480));

        let err = CompressionRequest::new(vec![], "application/pdf").with_target_kb(0);
        assert!(matches!(err, Err(AppError::InvalidInput(_))));
    }
}
