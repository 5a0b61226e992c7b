use axum::{
    extract::{rejection::JsonRejection, Path, State as AxumState},
    Json,
};
use easy_optha_core::{
    history::validate_append,
    models::{require_patient_id, HistoryEntry, PatientHistory},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{error::AppError, state::State};

pub const SCAN_ADDED_MESSAGE: &str = "Scan added successfully";

#[derive(Debug, Deserialize)]
pub struct AddScanPayload {
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub scan_type: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddScanResponse {
    pub message: String,
    pub result: PatientHistory,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

pub async fn add_scan_handler(
    AxumState(state): AxumState<State>,
    payload: Result<Json<AddScanPayload>, JsonRejection>,
) -> Result<Json<AddScanResponse>, AppError> {
    let Json(payload) = payload.map_err(|_| AppError::MalformedPayload)?;

    let patient_id = payload.patient_id.unwrap_or_default();
    let scan_type = payload.scan_type.unwrap_or_default();
    let diagnosis = payload.diagnosis.unwrap_or_default();

    validate_append(&patient_id, &scan_type, &diagnosis).map_err(|_| AppError::MissingFields)?;
    let patient_id = patient_id.trim();

    let result = {
        let db = state.db.lock().map_err(AppError::AddScanFailed)?;
        db.append_history(patient_id, &scan_type, &diagnosis)
            .map_err(AppError::AddScanFailed)
    }
    .inspect_err(|e| error!(%patient_id, error = ?e, "Failed to add scan"))?;

    info!(%patient_id, %scan_type, entries = result.history.len(), "Scan added");

    Ok(Json(AddScanResponse {
        message: SCAN_ADDED_MESSAGE.to_string(),
        result,
    }))
}

pub async fn patient_history_handler(
    AxumState(state): AxumState<State>,
    Path(patient_id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let patient_id =
        require_patient_id(&patient_id).map_err(|e| AppError::InvalidPatientId(e.to_string()))?;

    let history = {
        let db = state.db.lock().map_err(AppError::HistoryFetchFailed)?;
        db.list_history_entries(patient_id)
            .map_err(AppError::HistoryFetchFailed)
    }
    .inspect_err(|e| error!(%patient_id, error = ?e, "Failed to fetch patient history"))?;

    Ok(Json(HistoryResponse { history }))
}
