//! Command-line driver for the upload workflow.

use std::path::{Path, PathBuf};

use easy_optha_core::{
    history::HistoryRecorder,
    inference::InferenceService,
    models::{Modality, Prediction, ScanImage, ValidationError},
    workflow::{WorkflowController, WorkflowError, WorkflowState},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// Images to run through the workflow.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub patient_id: String,
    pub fundus: Vec<ScanImage>,
    pub oct: Vec<ScanImage>,
}

/// Outcome printed by `easy-optha-scan`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub patient_id: String,
    pub state: WorkflowState,
    pub fundus_diagnosis: Option<String>,
    pub fundus_results: Vec<Prediction>,
    pub oct_unlocked: bool,
    /// OCT scans were given but the fundus diagnosis did not unlock the stage
    pub oct_skipped: bool,
    pub oct_results: Vec<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_error: Option<String>,
}

/// Read image files for one modality.
pub async fn load_images(paths: &[PathBuf], modality: Modality) -> Result<Vec<ScanImage>, ScanError> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path).await.map_err(|source| ScanError::Io {
            path: path.clone(),
            source,
        })?;
        images.push(ScanImage::from_filename(file_name(path), modality, bytes)?);
    }
    Ok(images)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Run the fundus stage, then the OCT stage when it unlocks.
///
/// History write failures are reported in the result rather than
/// aborting, since the stage itself succeeded.
pub async fn run_scan<I, R>(
    controller: &mut WorkflowController<I, R>,
    plan: ScanPlan,
) -> Result<ScanReport, ScanError>
where
    I: InferenceService,
    R: HistoryRecorder,
{
    let mut history_error = None;

    controller.set_patient_id(plan.patient_id.clone());
    controller.add_fundus_images(plan.fundus)?;
    keep_history_error(controller.submit_fundus().await, &mut history_error)?;

    let fundus_diagnosis = controller.session().fundus_diagnosis().map(str::to_string);
    let fundus_results = controller.results().to_vec();
    let oct_unlocked = controller.is_oct_unlocked();
    let mut oct_skipped = false;
    let mut oct_results = Vec::new();

    if !plan.oct.is_empty() {
        if oct_unlocked {
            controller.add_oct_images(plan.oct)?;
            keep_history_error(controller.submit_oct().await, &mut history_error)?;
            oct_results = controller.results().to_vec();
        } else {
            info!(
                patient_id = %plan.patient_id,
                diagnosis = fundus_diagnosis.as_deref().unwrap_or_default(),
                "OCT stage not unlocked, skipping OCT scans"
            );
            oct_skipped = true;
        }
    }

    Ok(ScanReport {
        patient_id: plan.patient_id,
        state: controller.state(),
        fundus_diagnosis,
        fundus_results,
        oct_unlocked,
        oct_skipped,
        oct_results,
        history_error,
    })
}

fn keep_history_error(
    outcome: Result<WorkflowState, WorkflowError>,
    history_error: &mut Option<String>,
) -> Result<(), ScanError> {
    match outcome {
        Ok(_) => Ok(()),
        Err(WorkflowError::StoragePersistence(message)) => {
            warn!(%message, "Stage completed but history was not saved");
            *history_error = Some(message);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easy_optha_core::history::{HistoryError, HistoryResult, NoopRecorder};
    use easy_optha_core::inference::{CallOptions, InferenceRequest, InferenceResult};

    /// Labels every image with a fixed disease.
    struct FixedLabel(&'static str);

    impl InferenceService for FixedLabel {
        fn endpoint(&self) -> &str {
            "fixed"
        }

        async fn predict(
            &self,
            request: &InferenceRequest,
            _options: &CallOptions,
        ) -> InferenceResult<Vec<Prediction>> {
            Ok(request
                .images
                .iter()
                .map(|i| Prediction::new(i.filename.clone(), self.0))
                .collect())
        }
    }

    struct BrokenStore;

    impl HistoryRecorder for BrokenStore {
        async fn append_history(&self, _: &str, _: &str, _: &str) -> HistoryResult<()> {
            Err(HistoryError::StoragePersistence("database is locked".into()))
        }
    }

    fn plan(oct: usize) -> ScanPlan {
        ScanPlan {
            patient_id: "P123".into(),
            fundus: vec![
                ScanImage::from_filename("eye.jpg", Modality::FundusPhoto, vec![1]).unwrap(),
            ],
            oct: (0..oct)
                .map(|i| {
                    ScanImage::from_filename(format!("oct{}.png", i), Modality::Oct, vec![2])
                        .unwrap()
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_runs_both_stages() {
        let mut controller = WorkflowController::new(FixedLabel("Normal"), FixedLabel("Drusen"));

        let report = run_scan(&mut controller, plan(2)).await.unwrap();

        assert_eq!(report.state, WorkflowState::Done);
        assert_eq!(report.fundus_diagnosis.as_deref(), Some("Normal"));
        assert_eq!(report.fundus_results.len(), 1);
        assert_eq!(report.oct_results.len(), 2);
        assert!(!report.oct_skipped);
    }

    #[tokio::test]
    async fn test_skips_locked_oct() {
        let mut controller =
            WorkflowController::new(FixedLabel("Glaucoma"), FixedLabel("Drusen"));

        let report = run_scan(&mut controller, plan(1)).await.unwrap();

        assert_eq!(report.state, WorkflowState::FpResultReceived);
        assert!(!report.oct_unlocked);
        assert!(report.oct_skipped);
        assert!(report.oct_results.is_empty());
    }

    #[tokio::test]
    async fn test_history_failure_reported() {
        let mut controller = WorkflowController::new(FixedLabel("Normal"), FixedLabel("CNV"))
            .with_recorder(BrokenStore);

        let report = run_scan(&mut controller, plan(1)).await.unwrap();

        assert_eq!(report.state, WorkflowState::Done);
        assert_eq!(report.history_error.as_deref(), Some("database is locked"));
    }

    #[tokio::test]
    async fn test_blank_patient_rejected() {
        let mut controller = WorkflowController::new(FixedLabel("Normal"), FixedLabel("CNV"))
            .with_recorder(NoopRecorder);
        let mut plan = plan(0);
        plan.patient_id = "   ".into();

        let err = run_scan(&mut controller, plan).await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::Workflow(WorkflowError::Validation(ValidationError::PatientIdRequired))
        ));
    }

    #[tokio::test]
    async fn test_load_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("left.JPG");
        tokio::fs::write(&path, b"jpeg").await.unwrap();

        let images = load_images(&[path], Modality::FundusPhoto).await.unwrap();
        assert_eq!(images[0].filename, "left.JPG");
        assert_eq!(images[0].content_type, "image/jpeg");

        let missing = load_images(&[dir.path().join("nope.jpg")], Modality::Oct).await;
        assert!(matches!(missing, Err(ScanError::Io { .. })));

        let text = dir.path().join("notes.txt");
        tokio::fs::write(&text, b"hi").await.unwrap();
        let rejected = load_images(&[text], Modality::FundusPhoto).await;
        assert!(matches!(
            rejected,
            Err(ScanError::Validation(ValidationError::UnsupportedFileType { .. }))
        ));
    }
}
