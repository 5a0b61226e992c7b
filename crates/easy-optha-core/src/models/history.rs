//! Patient scan history models.

use serde::{Deserialize, Serialize};

/// Scan type used when none is specified.
pub const DEFAULT_SCAN_TYPE: &str = "Eye Scan";

/// Scan type recorded for OCT follow-up scans.
pub const OCT_SCAN_TYPE: &str = "OCT Scan";

/// A single entry in a patient's scan history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// Unique entry ID
    pub entry_id: String,
    /// When the scan was recorded (RFC 3339)
    pub date: String,
    /// Scan type (e.g., "Eye Scan", "OCT Scan")
    pub scan_type: String,
    /// Diagnosis text
    pub diagnosis: String,
}

impl HistoryEntry {
    /// Create a new entry dated now.
    pub fn new(scan_type: impl Into<String>, diagnosis: impl Into<String>) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            date: chrono::Utc::now().to_rfc3339(),
            scan_type: scan_type.into(),
            diagnosis: diagnosis.into(),
        }
    }

    /// Create an entry with the default scan type.
    pub fn eye_scan(diagnosis: impl Into<String>) -> Self {
        Self::new(DEFAULT_SCAN_TYPE, diagnosis)
    }
}

/// The history document kept for one patient.
///
/// Entries are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientHistory {
    /// Patient identifier
    pub patient_id: String,
    /// Entries in append order
    pub history: Vec<HistoryEntry>,
}

impl PatientHistory {
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Result of looking up a patient's history.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryLookup {
    /// At least one entry exists
    Found(Vec<HistoryEntry>),
    /// No entries stored for this patient
    Empty,
}

impl HistoryLookup {
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        if entries.is_empty() {
            HistoryLookup::Empty
        } else {
            HistoryLookup::Found(entries)
        }
    }

    /// Entries as a slice (empty for [`HistoryLookup::Empty`]).
    pub fn entries(&self) -> &[HistoryEntry] {
        match self {
            HistoryLookup::Found(entries) => entries,
            HistoryLookup::Empty => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, HistoryLookup::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry() {
        let entry = HistoryEntry::eye_scan("Normal");
        assert_eq!(entry.scan_type, "Eye Scan");
        assert_eq!(entry.diagnosis, "Normal");
        assert_eq!(entry.entry_id.len(), 36); // UUID format
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.date).is_ok());
    }

    #[test]
    fn test_lookup_from_entries() {
        assert!(HistoryLookup::from_entries(vec![]).is_empty());

        let lookup = HistoryLookup::from_entries(vec![HistoryEntry::eye_scan("Normal")]);
        assert!(!lookup.is_empty());
        assert_eq!(lookup.entries().len(), 1);
    }
}
