//! Easy Optha Core Library
//!
//! Eye-scan upload workflow with conditional OCT follow-up and an
//! append-only patient scan history.
//!
//! # Architecture
//!
//! ```text
//! Patient ID + Fundus Photos
//!           │
//!           ▼
//!   Fundus Inference ──► Response Normalization ──► Diagnosis = result[0]
//!                                                        │
//!                                  ┌─────────────────────┴───────────────┐
//!                                  │ "Diabetic Retinopathy" | "Normal"   │ anything else
//!                                  ▼                                     ▼
//!                          OCT Stage Unlocked                    FpResultReceived
//!                                  │                                (terminal)
//!                                  ▼
//!                          OCT Inference ──► Response Normalization ──► Done
//!                                  │
//!                                  ▼
//!                    Patient History (append-only document)
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite document store for patient history
//! - [`models`]: Domain types (ScanImage, Prediction, HistoryEntry, etc.)
//! - [`inference`]: Inference service seam and response normalization
//! - [`history`]: History recorder/query seams
//! - [`workflow`]: Upload session state and the two-stage controller

pub mod db;
pub mod history;
pub mod inference;
pub mod models;
pub mod workflow;

// Re-export commonly used types
pub use db::{Database, SharedDatabase};
pub use history::{HistoryError, HistoryQuery, HistoryRecorder, NoopRecorder};
pub use inference::{
    CallOptions, InferenceError, InferenceRequest, InferenceService, ResponseNormalizer,
};
pub use models::{
    HistoryEntry, HistoryLookup, Modality, PatientHistory, Prediction, ScanImage, ValidationError,
};
pub use workflow::{
    is_oct_eligible, UploadSession, WorkflowController, WorkflowError, WorkflowState,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum EasyOpthaError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl From<db::DbError> for EasyOpthaError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::Validation(v) => EasyOpthaError::InvalidInput(v.to_string()),
            other => EasyOpthaError::DatabaseError(other.to_string()),
        }
    }
}

impl From<ValidationError> for EasyOpthaError {
    fn from(e: ValidationError) -> Self {
        EasyOpthaError::InvalidInput(e.to_string())
    }
}

impl From<InferenceError> for EasyOpthaError {
    fn from(e: InferenceError) -> Self {
        EasyOpthaError::UnexpectedResponse(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a history database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<EasyOpthaCore>, EasyOpthaError> {
    Ok(Arc::new(EasyOpthaCore {
        db: SharedDatabase::open(&path)?,
    }))
}

/// Create an in-memory history database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<EasyOpthaCore>, EasyOpthaError> {
    Ok(Arc::new(EasyOpthaCore {
        db: SharedDatabase::open_in_memory()?,
    }))
}

/// Whether a fundus diagnosis unlocks the OCT follow-up stage.
#[uniffi::export]
pub fn check_oct_eligibility(diagnosis: String) -> bool {
    is_oct_eligible(&diagnosis)
}

/// Normalize a raw inference response body into predictions.
#[uniffi::export]
pub fn normalize_predictions(
    body_json: String,
    filenames: Vec<String>,
) -> Result<Vec<FfiPrediction>, EasyOpthaError> {
    let submitted: Vec<&str> = filenames.iter().map(String::as_str).collect();
    let predictions = ResponseNormalizer::new().normalize_body(body_json.as_bytes(), &submitted)?;
    Ok(predictions.into_iter().map(|p| p.into()).collect())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe history store for FFI.
#[derive(uniffi::Object)]
pub struct EasyOpthaCore {
    db: SharedDatabase,
}

#[uniffi::export]
impl EasyOpthaCore {
    /// Append a scan to a patient's history. Every call adds an entry.
    pub fn append_history(
        &self,
        patient_id: String,
        scan_type: String,
        diagnosis: String,
    ) -> Result<FfiPatientHistory, EasyOpthaError> {
        let db = self.db.lock()?;
        let history = db.append_history(&patient_id, &scan_type, &diagnosis)?;
        Ok(history.into())
    }

    /// Get a patient's history entries in append order.
    ///
    /// An empty list means no history has been recorded.
    pub fn get_patient_history(
        &self,
        patient_id: String,
    ) -> Result<Vec<FfiHistoryEntry>, EasyOpthaError> {
        let patient_id = models::require_patient_id(&patient_id)?;
        let db = self.db.lock()?;
        let entries = db.list_history_entries(patient_id)?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe prediction.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrediction {
    pub filename: String,
    pub disease: String,
    pub message: Option<String>,
}

impl From<Prediction> for FfiPrediction {
    fn from(p: Prediction) -> Self {
        Self {
            filename: p.filename,
            disease: p.disease,
            message: p.message,
        }
    }
}

/// FFI-safe history entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHistoryEntry {
    pub entry_id: String,
    pub date: String,
    pub scan_type: String,
    pub diagnosis: String,
}

impl From<HistoryEntry> for FfiHistoryEntry {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            entry_id: entry.entry_id,
            date: entry.date,
            scan_type: entry.scan_type,
            diagnosis: entry.diagnosis,
        }
    }
}

/// FFI-safe patient history document.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientHistory {
    pub patient_id: String,
    pub history: Vec<FfiHistoryEntry>,
}

impl From<PatientHistory> for FfiPatientHistory {
    fn from(doc: PatientHistory) -> Self {
        Self {
            patient_id: doc.patient_id,
            history: doc.history.into_iter().map(|e| e.into()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffi_append_and_get() {
        let core = open_database_in_memory().unwrap();

        core.append_history("P123".into(), "Eye Scan".into(), "Normal".into())
            .unwrap();
        let doc = core
            .append_history("P123".into(), "OCT Scan".into(), "Normal".into())
            .unwrap();
        assert_eq!(doc.history.len(), 2);

        let entries = core.get_patient_history("P123".into()).unwrap();
        assert_eq!(entries[1].scan_type, "OCT Scan");
        assert!(core.get_patient_history("P999".into()).unwrap().is_empty());
    }

    #[test]
    fn test_ffi_invalid_input() {
        let core = open_database_in_memory().unwrap();
        let err = core
            .append_history("P1".into(), "Eye Scan".into(), "".into())
            .unwrap_err();
        assert!(matches!(err, EasyOpthaError::InvalidInput(_)));

        assert!(matches!(
            core.get_patient_history(" ".into()),
            Err(EasyOpthaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ffi_normalize_and_eligibility() {
        let predictions = normalize_predictions(
            r#"{"predictions": ["Normal"]}"#.into(),
            vec!["a.jpg".into()],
        )
        .unwrap();
        assert_eq!(predictions[0].filename, "a.jpg");
        assert!(check_oct_eligibility(predictions[0].disease.clone()));

        assert!(matches!(
            normalize_predictions("{}".into(), vec![]),
            Err(EasyOpthaError::UnexpectedResponse(_))
        ));
    }
}
