//! Remote inference seam.
//!
//! Pipeline: Scan Images → Multipart Request → Inference Service → Response Normalization

mod normalizer;

pub use normalizer::*;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::models::{Prediction, ScanImage};

/// Shown to the user when the service gives no error text of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to process images. Please try again.";

/// Inference errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    /// Network error, timeout or non-2xx status
    #[error("{0}")]
    RequestFailed(String),

    /// The body could not be mapped onto predictions
    #[error("unexpected response shape: {0}")]
    UnexpectedResponseShape(String),
}

pub type InferenceResult<T> = Result<T, InferenceError>;

/// A set of images submitted for one patient.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub patient_id: String,
    pub images: Vec<ScanImage>,
}

impl InferenceRequest {
    pub fn new(patient_id: impl Into<String>, images: Vec<ScanImage>) -> Self {
        Self {
            patient_id: patient_id.into(),
            images,
        }
    }

    /// Submitted filenames in submission order.
    pub fn filenames(&self) -> Vec<&str> {
        self.images.iter().map(|i| i.filename.as_str()).collect()
    }
}

/// Per-call transport options.
///
/// Nothing is inherited from ambient client defaults: credentials and
/// timeouts apply only when set here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Session cookie forwarded with the request
    pub session_cookie: Option<String>,
    /// Request timeout (transport default when unset)
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A remote classifier that turns scan images into predictions.
pub trait InferenceService {
    /// Endpoint address (for logging).
    fn endpoint(&self) -> &str;

    /// Submit images and return one prediction per image.
    fn predict(
        &self,
        request: &InferenceRequest,
        options: &CallOptions,
    ) -> impl Future<Output = InferenceResult<Vec<Prediction>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Modality;

    #[test]
    fn test_request_filenames() {
        let images = vec![
            ScanImage::from_filename("left.jpg", Modality::FundusPhoto, vec![1]).unwrap(),
            ScanImage::from_filename("right.jpg", Modality::FundusPhoto, vec![2]).unwrap(),
        ];
        let request = InferenceRequest::new("P123", images);
        assert_eq!(request.filenames(), ["left.jpg", "right.jpg"]);
    }

    #[test]
    fn test_call_options_builder() {
        let options = CallOptions::default()
            .with_session_cookie("token=abc")
            .with_timeout(Duration::from_secs(30));
        assert_eq!(options.session_cookie.as_deref(), Some("token=abc"));
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert_eq!(CallOptions::default().timeout, None);
    }
}
