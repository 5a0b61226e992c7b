//! Inference response normalizer.
//!
//! Handles the response shapes the classifiers have produced over time:
//! - A bare array of predictions (strings or objects)
//! - An object whose `predictions` member is an array
//! - An object whose `predictions` member is a keyed mapping
//!
//! Object elements carry the label under one of several field names; the
//! first one present wins.

use serde_json::Value;

use super::{InferenceError, InferenceResult};
use crate::models::Prediction;

/// Label fields in priority order.
pub const DEFAULT_DISEASE_FIELDS: [&str; 4] = [
    "disease",
    "pattern_based_mapping",
    "corrected_mapping",
    "original_mapping",
];

const MAX_SHAPE_PREVIEW: usize = 200;

/// Normalizer for inference responses.
pub struct ResponseNormalizer {
    /// Candidate label fields, highest priority first
    disease_fields: Vec<String>,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseNormalizer {
    /// Create a normalizer with the default label fields.
    pub fn new() -> Self {
        Self {
            disease_fields: DEFAULT_DISEASE_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Add a lower-priority label field.
    pub fn add_disease_field(&mut self, field: &str) {
        if !self.disease_fields.iter().any(|f| f == field) {
            self.disease_fields.push(field.to_string());
        }
    }

    /// Normalize a raw response body.
    ///
    /// `submitted` names the uploaded files in submission order; it fills in
    /// filenames the service did not echo back.
    pub fn normalize_body(&self, body: &[u8], submitted: &[&str]) -> InferenceResult<Vec<Prediction>> {
        let value: Value = serde_json::from_slice(body).map_err(|_| {
            InferenceError::UnexpectedResponseShape(format!(
                "response body is not JSON: {}",
                preview(&String::from_utf8_lossy(body))
            ))
        })?;
        self.normalize(&value, submitted)
    }

    /// Normalize a parsed response.
    pub fn normalize(&self, body: &Value, submitted: &[&str]) -> InferenceResult<Vec<Prediction>> {
        let elements: Vec<&Value> = match body {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => match map.get("predictions") {
                Some(Value::Array(items)) => items.iter().collect(),
                Some(Value::Object(keyed)) => keyed.values().collect(),
                _ => return Err(unexpected(body)),
            },
            _ => return Err(unexpected(body)),
        };

        Ok(elements
            .into_iter()
            .enumerate()
            .map(|(index, element)| self.extract(index, element, submitted))
            .collect())
    }

    /// Turn one response element into a prediction.
    fn extract(&self, index: usize, element: &Value, submitted: &[&str]) -> Prediction {
        let field = |name: &str| {
            element
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let filename = field("filename")
            .or_else(|| submitted.get(index).map(|s| s.to_string()))
            .unwrap_or_else(|| format!("image-{}", index + 1));

        Prediction {
            filename,
            disease: self.extract_disease(element),
            message: field("message").or_else(|| field("error")),
        }
    }

    /// Label text for one element.
    pub fn extract_disease(&self, element: &Value) -> String {
        match element {
            Value::String(s) => s.clone(),
            Value::Object(map) => self
                .disease_fields
                .iter()
                .find_map(|f| map.get(f).and_then(Value::as_str).filter(|s| !s.is_empty()))
                .map(str::to_string)
                .unwrap_or_else(|| element.to_string()),
            other => other.to_string(),
        }
    }
}

fn unexpected(body: &Value) -> InferenceError {
    InferenceError::UnexpectedResponseShape(preview(&body.to_string()))
}

fn preview(text: &str) -> String {
    if text.chars().count() <= MAX_SHAPE_PREVIEW {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_SHAPE_PREVIEW).collect();
    format!("{}…", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> ResponseNormalizer {
        ResponseNormalizer::new()
    }

    #[test]
    fn test_array_of_objects() {
        let body = json!([{"filename": "a.jpg", "disease": "Normal"}]);
        let predictions = normalizer().normalize(&body, &["a.jpg"]).unwrap();
        assert_eq!(predictions, vec![Prediction::new("a.jpg", "Normal")]);
    }

    #[test]
    fn test_field_priority() {
        let n = normalizer();
        let both = json!({"original_mapping": "Glaucoma", "corrected_mapping": "Cataract"});
        assert_eq!(n.extract_disease(&both), "Cataract");

        let disease_first = json!({"pattern_based_mapping": "Glaucoma", "disease": "Normal"});
        assert_eq!(n.extract_disease(&disease_first), "Normal");

        let empty_skipped = json!({"disease": "", "original_mapping": "Glaucoma"});
        assert_eq!(n.extract_disease(&empty_skipped), "Glaucoma");
    }

    #[test]
    fn test_unknown_object_is_stringified() {
        let element = json!({"class": "Normal", "confidence": 0.9});
        assert_eq!(
            normalizer().extract_disease(&element),
            r#"{"class":"Normal","confidence":0.9}"#
        );
    }

    #[test]
    fn test_scalars_are_stringified() {
        let n = normalizer();
        assert_eq!(n.extract_disease(&json!(3)), "3");
        assert_eq!(n.extract_disease(&json!(null)), "null");
        assert_eq!(n.extract_disease(&json!("Normal (Confidence: 97.10%)")), "Normal (Confidence: 97.10%)");
    }

    #[test]
    fn test_predictions_member_array() {
        let body = json!({
            "patientId": "P123",
            "predictions": ["Normal", {"pattern_based_mapping": "Glaucoma"}],
            "detailed_results": []
        });
        let predictions = normalizer().normalize(&body, &["a.jpg", "b.jpg"]).unwrap();
        assert_eq!(
            predictions,
            vec![Prediction::new("a.jpg", "Normal"), Prediction::new("b.jpg", "Glaucoma")]
        );
    }

    #[test]
    fn test_keyed_mapping_keeps_document_order() {
        let body: Value = serde_json::from_str(
            r#"{"predictions": {"10": {"disease": "Cataract"}, "2": {"disease": "Normal"}}}"#,
        )
        .unwrap();
        let predictions = normalizer().normalize(&body, &[]).unwrap();
        assert_eq!(predictions[0].disease, "Cataract");
        assert_eq!(predictions[1].disease, "Normal");
        assert_eq!(predictions[1].filename, "image-2");
    }

    #[test]
    fn test_error_field_becomes_message() {
        let body = json!([{"filename": "x.gif", "disease": "Error", "error": "Unsupported file type"}]);
        let predictions = normalizer().normalize(&body, &[]).unwrap();
        assert!(predictions[0].is_error());
        assert_eq!(predictions[0].message.as_deref(), Some("Unsupported file type"));
    }

    #[test]
    fn test_message_preferred_over_error() {
        let body = json!([{"disease": "Normal", "message": "low quality", "error": "ignored"}]);
        let predictions = normalizer().normalize(&body, &["a.png"]).unwrap();
        assert_eq!(predictions[0].message.as_deref(), Some("low quality"));
    }

    #[test]
    fn test_unexpected_shapes() {
        let n = normalizer();
        for body in [
            json!({"error": "boom"}),
            json!({"predictions": "Normal"}),
            json!({"predictions": null}),
            json!("Normal"),
            json!(42),
        ] {
            assert!(matches!(
                n.normalize(&body, &[]),
                Err(InferenceError::UnexpectedResponseShape(_))
            ));
        }
    }

    #[test]
    fn test_normalize_body_rejects_non_json() {
        let result = normalizer().normalize_body(b"<html>502</html>", &[]);
        match result {
            Err(InferenceError::UnexpectedResponseShape(msg)) => assert!(msg.contains("not JSON")),
            other => panic!("expected shape error, got {:?}", other),
        }
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), MAX_SHAPE_PREVIEW + 1);
    }

    #[test]
    fn test_custom_disease_field() {
        let mut n = normalizer();
        n.add_disease_field("label");
        n.add_disease_field("label");
        assert_eq!(n.extract_disease(&json!({"label": "Normal"})), "Normal");
    }
}
