//! Client for the patient history service.

use reqwest::header::COOKIE;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use easy_optha_core::history::{
    validate_append, HistoryError, HistoryQuery, HistoryRecorder, HistoryResult,
};
use easy_optha_core::inference::CallOptions;
use easy_optha_core::models::{require_patient_id, HistoryEntry, HistoryLookup};

use crate::{parse_endpoint, upstream_error, ClientError, ClientResult};

/// Body of `POST /add-scan`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddScanRequest {
    pub patient_id: String,
    pub scan_type: String,
    pub diagnosis: String,
}

/// Body of a `GET /patient-history/:patient_id` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Records and reads patient history over HTTP.
pub struct HttpHistoryClient {
    base_url: Url,
    client: Client,
    options: CallOptions,
}

impl HttpHistoryClient {
    /// Create a client for the service rooted at `base_url`.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::with_client(base_url, Client::builder().build()?)
    }

    pub fn with_client(base_url: &str, client: Client) -> ClientResult<Self> {
        let base_url = parse_endpoint(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidEndpoint {
                url: base_url.to_string(),
                reason: "not a base URL".into(),
            });
        }
        Ok(Self {
            base_url,
            client,
            options: CallOptions::default(),
        })
    }

    /// Options applied to every request.
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Build `<base>/<segments...>` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> HistoryResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HistoryError::StoragePersistence("history URL is not a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn apply_options(&self, mut builder: RequestBuilder) -> RequestBuilder {
        if let Some(cookie) = &self.options.session_cookie {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(timeout) = self.options.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

fn unreachable_service(e: reqwest::Error) -> HistoryError {
    warn!(error = %e, "History service request failed");
    HistoryError::StoragePersistence(e.to_string())
}

impl HistoryRecorder for HttpHistoryClient {
    async fn append_history(
        &self,
        patient_id: &str,
        scan_type: &str,
        diagnosis: &str,
    ) -> HistoryResult<()> {
        validate_append(patient_id, scan_type, diagnosis)?;
        let patient_id = patient_id.trim();

        let body = AddScanRequest {
            patient_id: patient_id.to_string(),
            scan_type: scan_type.to_string(),
            diagnosis: diagnosis.to_string(),
        };
        let url = self.url(&["add-scan"])?;

        let response = self
            .apply_options(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(unreachable_service)?;

        let status = response.status();
        if status.is_success() {
            debug!(%patient_id, %scan_type, "History entry recorded");
            return Ok(());
        }

        let body = response.bytes().await.map_err(unreachable_service)?;
        let message = upstream_error(&body).unwrap_or_else(|| format!("status {}", status));
        Err(HistoryError::StoragePersistence(message))
    }
}

impl HistoryQuery for HttpHistoryClient {
    async fn patient_history(&self, patient_id: &str) -> HistoryResult<HistoryLookup> {
        let patient_id = require_patient_id(patient_id)?;
        let url = self.url(&["patient-history", patient_id])?;

        let response = self
            .apply_options(self.client.get(url))
            .send()
            .await
            .map_err(unreachable_service)?;

        let status = response.status();
        // Older deployments answered 404 for a patient with no history
        if status == StatusCode::NOT_FOUND {
            return Ok(HistoryLookup::Empty);
        }

        let body = response.bytes().await.map_err(unreachable_service)?;
        if !status.is_success() {
            let message = upstream_error(&body).unwrap_or_else(|| format!("status {}", status));
            return Err(HistoryError::StoragePersistence(message));
        }

        let parsed: HistoryResponse = serde_json::from_slice(&body)
            .map_err(|e| HistoryError::StoragePersistence(format!("invalid history body: {}", e)))?;

        Ok(HistoryLookup::from_entries(parsed.history))
    }
}
