//! Prediction results returned by the inference services.

use serde::{Deserialize, Serialize};

/// Disease label the OCT service reports for a file it could not process.
pub const ERROR_DISEASE: &str = "Error";

/// Canonical per-image prediction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prediction {
    /// Image the prediction belongs to
    pub filename: String,
    /// Predicted disease label (e.g., "Normal", "Diabetic Retinopathy")
    pub disease: String,
    /// Optional note from the service (per-file error text, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Prediction {
    pub fn new(filename: impl Into<String>, disease: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            disease: disease.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether the service failed on this particular image.
    pub fn is_error(&self) -> bool {
        self.disease == ERROR_DISEASE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_skips_empty_message() {
        let json = serde_json::to_string(&Prediction::new("a.jpg", "Normal")).unwrap();
        assert_eq!(json, r#"{"filename":"a.jpg","disease":"Normal"}"#);
    }

    #[test]
    fn test_is_error() {
        assert!(Prediction::new("a.jpg", "Error").with_message("bad file").is_error());
        assert!(!Prediction::new("a.jpg", "Normal").is_error());
    }
}
