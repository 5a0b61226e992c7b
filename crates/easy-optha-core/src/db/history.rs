//! Patient history database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::{require_field, HistoryEntry, HistoryLookup, PatientHistory};

impl Database {
    /// Append a scan to a patient's history, creating the document if needed.
    ///
    /// The patient ID is stored trimmed, matching how lookups normalize it.
    /// Every call appends; there is no de-duplication. Returns the updated
    /// document.
    pub fn append_history(
        &self,
        patient_id: &str,
        scan_type: &str,
        diagnosis: &str,
    ) -> DbResult<PatientHistory> {
        let patient_id = require_field("patient_id", patient_id)?.trim();
        require_field("scan_type", scan_type)?;
        require_field("diagnosis", diagnosis)?;

        let entry = HistoryEntry::new(scan_type, diagnosis);
        self.append_entry(patient_id, &entry)
    }

    /// Append a prepared entry under an already-trimmed patient ID.
    fn append_entry(&self, patient_id: &str, entry: &HistoryEntry) -> DbResult<PatientHistory> {
        let entry_json = serde_json::to_string(entry)?;

        self.conn.execute(
            r#"
            INSERT INTO patient_history (patient_id, history)
            VALUES (?1, json_array(json(?2)))
            ON CONFLICT(patient_id) DO UPDATE SET
                history = json_insert(history, '$[#]', json(?2)),
                updated_at = datetime('now')
            "#,
            params![patient_id, entry_json],
        )?;

        Ok(PatientHistory {
            patient_id: patient_id.to_string(),
            history: self.list_history_entries(patient_id)?,
        })
    }

    /// Get the history document for a patient.
    pub fn get_patient_history(&self, patient_id: &str) -> DbResult<Option<PatientHistory>> {
        let history_json: Option<String> = self
            .conn
            .query_row(
                "SELECT history FROM patient_history WHERE patient_id = ?",
                [patient_id],
                |row| row.get(0),
            )
            .optional()?;

        history_json
            .map(|json| {
                Ok(PatientHistory {
                    patient_id: patient_id.to_string(),
                    history: serde_json::from_str(&json)?,
                })
            })
            .transpose()
    }

    /// History entries for a patient in append order (empty if none).
    pub fn list_history_entries(&self, patient_id: &str) -> DbResult<Vec<HistoryEntry>> {
        Ok(self
            .get_patient_history(patient_id)?
            .map(|doc| doc.history)
            .unwrap_or_default())
    }

    /// Look up a patient's history, signalling an empty history explicitly.
    pub fn lookup_history(&self, patient_id: &str) -> DbResult<HistoryLookup> {
        Ok(HistoryLookup::from_entries(
            self.list_history_entries(patient_id)?,
        ))
    }

    /// Count patients with at least one stored document.
    pub fn count_patients_with_history(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM patient_history", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
