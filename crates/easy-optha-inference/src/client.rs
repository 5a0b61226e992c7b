//! Multipart client for the scan classifiers.

use reqwest::header::COOKIE;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, warn};

use easy_optha_core::inference::{
    CallOptions, InferenceError, InferenceRequest, InferenceResult, InferenceService,
    ResponseNormalizer, GENERIC_FAILURE_MESSAGE,
};
use easy_optha_core::models::Prediction;

use crate::{parse_endpoint, upstream_error, ClientResult};

/// Multipart field carrying the patient identifier.
pub const PATIENT_ID_FIELD: &str = "patient_id";

/// Multipart field repeated once per image.
pub const FILES_FIELD: &str = "files";

/// Sends scan images to one classifier endpoint.
///
/// The fundus and OCT stages each get their own instance; they differ only
/// in address and normalizer.
pub struct RemoteInferenceClient {
    endpoint: String,
    client: Client,
    normalizer: ResponseNormalizer,
}

impl RemoteInferenceClient {
    /// Create a client for `endpoint` (e.g. `http://localhost:5000/predict`).
    pub fn new(endpoint: &str) -> ClientResult<Self> {
        Self::with_client(endpoint, Client::builder().build()?)
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_client(endpoint: &str, client: Client) -> ClientResult<Self> {
        let url = parse_endpoint(endpoint)?;
        Ok(Self {
            endpoint: url.to_string(),
            client,
            normalizer: ResponseNormalizer::new(),
        })
    }

    fn build_form(request: &InferenceRequest) -> InferenceResult<Form> {
        let mut form = Form::new().text(PATIENT_ID_FIELD, request.patient_id.clone());

        for image in &request.images {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.filename.clone())
                .mime_str(&image.content_type)
                .map_err(|e| {
                    InferenceError::RequestFailed(format!(
                        "invalid content type for {}: {}",
                        image.filename, e
                    ))
                })?;
            form = form.part(FILES_FIELD, part);
        }

        Ok(form)
    }
}

impl InferenceService for RemoteInferenceClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn predict(
        &self,
        request: &InferenceRequest,
        options: &CallOptions,
    ) -> InferenceResult<Vec<Prediction>> {
        let form = Self::build_form(request)?;

        let mut builder = self.client.post(&self.endpoint).multipart(form);
        if let Some(cookie) = &options.session_cookie {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(endpoint = %self.endpoint, error = %e, "Inference request not delivered");
            InferenceError::RequestFailed(GENERIC_FAILURE_MESSAGE.to_string())
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            warn!(endpoint = %self.endpoint, error = %e, "Failed to read inference response");
            InferenceError::RequestFailed(GENERIC_FAILURE_MESSAGE.to_string())
        })?;

        debug!(endpoint = %self.endpoint, %status, bytes = body.len(), "Inference response");

        if !status.is_success() {
            let message =
                upstream_error(&body).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
            return Err(InferenceError::RequestFailed(message));
        }

        self.normalizer.normalize_body(&body, &request.filenames())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easy_optha_core::models::{Modality, ScanImage};

    #[test]
    fn test_endpoint_normalized() {
        let client = RemoteInferenceClient::new("http://localhost:5000/predict").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:5000/predict");
    }

    #[test]
    fn test_build_form() {
        let image = ScanImage::from_filename("a.jpg", Modality::FundusPhoto, vec![1, 2]).unwrap();
        let request = InferenceRequest::new("P123", vec![image]);
        assert!(RemoteInferenceClient::build_form(&request).is_ok());
    }
}
