//! Input validation shared by the workflow and the history recorder.

use thiserror::Error;

/// Validation errors. Raised before any network call or storage mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("patient id required")]
    PatientIdRequired,

    #[error("no images selected")]
    NoImagesSelected,

    #[error("no OCT images selected")]
    NoOctImagesSelected,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("unsupported file type for {filename}: {content_type}")]
    UnsupportedFileType {
        filename: String,
        content_type: String,
    },

    #[error("no image at index {index} (selection has {len})")]
    ImageIndexOutOfRange { index: usize, len: usize },
}

/// Trim a patient identifier, failing when nothing is left.
pub fn require_patient_id(patient_id: &str) -> Result<&str, ValidationError> {
    let trimmed = patient_id.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::PatientIdRequired);
    }
    Ok(trimmed)
}

/// Fail with [`ValidationError::MissingField`] when `value` is blank.
pub fn require_field<'a>(name: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(name));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_patient_id() {
        assert_eq!(require_patient_id("  P123 "), Ok("P123"));
        assert_eq!(require_patient_id(""), Err(ValidationError::PatientIdRequired));
        assert_eq!(require_patient_id(" \t"), Err(ValidationError::PatientIdRequired));
    }

    #[test]
    fn test_require_field() {
        assert_eq!(require_field("diagnosis", "Normal"), Ok("Normal"));
        assert_eq!(
            require_field("scan_type", " "),
            Err(ValidationError::MissingField("scan_type"))
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(ValidationError::PatientIdRequired.to_string(), "patient id required");
        assert_eq!(ValidationError::NoImagesSelected.to_string(), "no images selected");
        assert_eq!(
            ValidationError::NoOctImagesSelected.to_string(),
            "no OCT images selected"
        );
    }
}
