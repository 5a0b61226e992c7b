//! Patient history recording and lookup seams.

use std::future::Future;

use thiserror::Error;

use crate::db::{DbError, SharedDatabase};
use crate::models::{require_field, require_patient_id, HistoryLookup, ValidationError};

/// History errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to persist history: {0}")]
    StoragePersistence(String),
}

impl From<DbError> for HistoryError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Validation(v) => HistoryError::Validation(v),
            other => HistoryError::StoragePersistence(other.to_string()),
        }
    }
}

pub type HistoryResult<T> = Result<T, HistoryError>;

/// Appends completed diagnoses to a patient's history.
pub trait HistoryRecorder {
    /// Append one entry. Not idempotent: repeated calls add repeated entries.
    fn append_history(
        &self,
        patient_id: &str,
        scan_type: &str,
        diagnosis: &str,
    ) -> impl Future<Output = HistoryResult<()>> + Send;
}

/// Reads a patient's history.
pub trait HistoryQuery {
    fn patient_history(
        &self,
        patient_id: &str,
    ) -> impl Future<Output = HistoryResult<HistoryLookup>> + Send;
}

/// Validate the three required fields of an append.
pub fn validate_append(
    patient_id: &str,
    scan_type: &str,
    diagnosis: &str,
) -> Result<(), ValidationError> {
    require_field("patient_id", patient_id)?;
    require_field("scan_type", scan_type)?;
    require_field("diagnosis", diagnosis)?;
    Ok(())
}

/// Recorder that drops every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl HistoryRecorder for NoopRecorder {
    async fn append_history(
        &self,
        patient_id: &str,
        scan_type: &str,
        diagnosis: &str,
    ) -> HistoryResult<()> {
        validate_append(patient_id, scan_type, diagnosis)?;
        Ok(())
    }
}

impl HistoryRecorder for SharedDatabase {
    async fn append_history(
        &self,
        patient_id: &str,
        scan_type: &str,
        diagnosis: &str,
    ) -> HistoryResult<()> {
        let db = self.lock()?;
        db.append_history(patient_id, scan_type, diagnosis)?;
        Ok(())
    }
}

impl HistoryQuery for SharedDatabase {
    async fn patient_history(&self, patient_id: &str) -> HistoryResult<HistoryLookup> {
        let patient_id = require_patient_id(patient_id)?;
        let db = self.lock()?;
        Ok(db.lookup_history(patient_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shared_database_records() {
        let db = SharedDatabase::open_in_memory().unwrap();

        db.append_history("P123", "Eye Scan", "Normal").await.unwrap();
        db.append_history("P123", "Eye Scan", "Normal").await.unwrap();

        match db.patient_history("P123").await.unwrap() {
            HistoryLookup::Found(entries) => {
                assert_eq!(entries.len(), 2);
                assert!(entries.iter().all(|e| e.diagnosis == "Normal"));
            }
            HistoryLookup::Empty => panic!("expected entries"),
        }
    }

    #[tokio::test]
    async fn test_padded_patient_id_reads_back() {
        let db = SharedDatabase::open_in_memory().unwrap();

        db.append_history(" P1", "Eye Scan", "Normal").await.unwrap();
        db.append_history("P1 ", "OCT Scan", "Normal").await.unwrap();

        assert_eq!(db.patient_history("P1").await.unwrap().entries().len(), 2);
        assert_eq!(db.patient_history("  P1  ").await.unwrap().entries().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_history_is_a_signal() {
        let db = SharedDatabase::open_in_memory().unwrap();
        assert_eq!(db.patient_history("P404").await.unwrap(), HistoryLookup::Empty);
    }

    #[tokio::test]
    async fn test_query_requires_patient_id() {
        let db = SharedDatabase::open_in_memory().unwrap();
        assert_eq!(
            db.patient_history("  ").await.unwrap_err(),
            HistoryError::Validation(ValidationError::PatientIdRequired)
        );
    }

    #[tokio::test]
    async fn test_validation_maps_through() {
        let db = SharedDatabase::open_in_memory().unwrap();
        let err = db.append_history("P1", "", "Normal").await.unwrap_err();
        assert_eq!(
            err,
            HistoryError::Validation(ValidationError::MissingField("scan_type"))
        );
    }

    #[tokio::test]
    async fn test_noop_recorder_still_validates() {
        assert!(NoopRecorder.append_history("P1", "Eye Scan", "Normal").await.is_ok());
        assert!(NoopRecorder.append_history("P1", "Eye Scan", "").await.is_err());
    }
}
