//! HTTP clients for the services the upload workflow talks to.
//!
//! - [`RemoteInferenceClient`]: multipart upload to a fundus or OCT classifier
//! - [`HttpHistoryClient`]: the patient history service (`/add-scan`, `/patient-history`)

pub mod client;
pub mod history;

pub use client::*;
pub use history::*;

use thiserror::Error;

/// Client construction errors.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Parse and check an endpoint address.
fn parse_endpoint(url: &str) -> ClientResult<reqwest::Url> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ClientError::InvalidEndpoint {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ClientError::InvalidEndpoint {
            url: url.to_string(),
            reason: format!("unsupported scheme {}", other),
        }),
    }
}

/// Pull the `error` string out of a JSON error body.
fn upstream_error(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("error")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        assert!(parse_endpoint("http://localhost:5000/predict").is_ok());
        assert!(parse_endpoint("https://scans.example.org/predict-oct").is_ok());

        assert!(matches!(
            parse_endpoint("localhost:5000"),
            Err(ClientError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            parse_endpoint("ftp://host/predict"),
            Err(ClientError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_upstream_error() {
        assert_eq!(
            upstream_error(br#"{"error": "Model not loaded"}"#).as_deref(),
            Some("Model not loaded")
        );
        assert_eq!(upstream_error(br#"{"error": ""}"#), None);
        assert_eq!(upstream_error(br#"{"message": "nope"}"#), None);
        assert_eq!(upstream_error(b"Internal Server Error"), None);
    }
}
