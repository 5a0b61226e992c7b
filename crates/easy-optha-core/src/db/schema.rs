//! SQLite schema definition.

/// Complete database schema for the scan history store.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Patient History (one document per patient, append-only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patient_history (
    patient_id TEXT PRIMARY KEY,
    history TEXT NOT NULL DEFAULT '[]'            -- JSON array of HistoryEntry
        CHECK (json_valid(history) AND json_type(history) = 'array'),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Entries are never removed or edited: the stored array must be a prefix of the new one
CREATE TRIGGER IF NOT EXISTS patient_history_append_only
BEFORE UPDATE OF history ON patient_history
WHEN json_array_length(new.history) < json_array_length(old.history)
    OR substr(json(new.history), 1, length(json(old.history)) - 1)
        <> substr(json(old.history), 1, length(json(old.history)) - 1)
    OR (json_array_length(old.history) > 0
        AND substr(json(new.history), length(json(old.history)), 1) NOT IN (',', ']'))
BEGIN
    SELECT RAISE(ABORT, 'History entries cannot be removed or modified');
END;

-- Documents are never deleted
CREATE TRIGGER IF NOT EXISTS patient_history_no_delete
BEFORE DELETE ON patient_history
BEGIN
    SELECT RAISE(ABORT, 'History records cannot be deleted');
END;

CREATE INDEX IF NOT EXISTS idx_patient_history_updated ON patient_history(updated_at);
"#;
