//! Two-stage upload workflow.
//!
//! Fundus photos are classified first. When the first fundus diagnosis is
//! OCT-eligible the OCT stage unlocks, its images are classified by a
//! separate service, and the OCT results replace the fundus results on
//! display.

mod eligibility;
mod session;
mod state;

pub use eligibility::*;
pub use session::*;
pub use state::*;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::history::{HistoryError, HistoryRecorder, NoopRecorder};
use crate::inference::{CallOptions, InferenceError, InferenceService};
use crate::models::{Modality, Prediction, ScanImage, ValidationError};

/// Banner text when a diagnosis could not be saved to the patient history.
pub const HISTORY_FAILURE_MESSAGE: &str = "Failed to save scan history.";

/// Workflow errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("inference request failed: {0}")]
    InferenceRequestFailed(String),

    #[error("unexpected response shape: {0}")]
    UnexpectedResponseShape(String),

    #[error("failed to persist history: {0}")]
    StoragePersistence(String),

    #[error("cannot {operation} in state {state}")]
    StageUnavailable {
        operation: &'static str,
        state: WorkflowState,
    },

    #[error("a submission is already in progress")]
    SubmissionInProgress,
}

impl From<InferenceError> for WorkflowError {
    fn from(e: InferenceError) -> Self {
        match e {
            InferenceError::RequestFailed(message) => WorkflowError::InferenceRequestFailed(message),
            InferenceError::UnexpectedResponseShape(shape) => {
                WorkflowError::UnexpectedResponseShape(shape)
            }
        }
    }
}

impl From<HistoryError> for WorkflowError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::Validation(v) => WorkflowError::Validation(v),
            HistoryError::StoragePersistence(message) => WorkflowError::StoragePersistence(message),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Drives one upload session through the fundus and OCT stages.
pub struct WorkflowController<I, R = NoopRecorder> {
    fundus: I,
    oct: I,
    recorder: R,
    options: CallOptions,
    session: UploadSession,
}

impl<I: InferenceService> WorkflowController<I> {
    /// Create a controller that does not record history.
    pub fn new(fundus: I, oct: I) -> Self {
        Self {
            fundus,
            oct,
            recorder: NoopRecorder,
            options: CallOptions::default(),
            session: UploadSession::new(),
        }
    }
}

impl<I: InferenceService, R: HistoryRecorder> WorkflowController<I, R> {
    /// Record each completed diagnosis with `recorder`.
    pub fn with_recorder<R2: HistoryRecorder>(self, recorder: R2) -> WorkflowController<I, R2> {
        WorkflowController {
            fundus: self.fundus,
            oct: self.oct,
            recorder,
            options: self.options,
            session: self.session,
        }
    }

    /// Options applied to every remote call.
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    pub fn state(&self) -> WorkflowState {
        self.session.state()
    }

    pub fn results(&self) -> &[Prediction] {
        self.session.results()
    }

    pub fn is_oct_unlocked(&self) -> bool {
        self.session.is_oct_unlocked()
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn set_patient_id(&mut self, patient_id: impl Into<String>) {
        self.session.set_patient_id(patient_id);
    }

    pub fn add_fundus_images(
        &mut self,
        images: impl IntoIterator<Item = ScanImage>,
    ) -> WorkflowResult<usize> {
        self.session.add_images(Modality::FundusPhoto, images)
    }

    pub fn remove_fundus_image(&mut self, index: usize) -> WorkflowResult<ScanImage> {
        self.session.remove_image(Modality::FundusPhoto, index)
    }

    pub fn add_oct_images(
        &mut self,
        images: impl IntoIterator<Item = ScanImage>,
    ) -> WorkflowResult<usize> {
        self.session.add_images(Modality::Oct, images)
    }

    pub fn remove_oct_image(&mut self, index: usize) -> WorkflowResult<ScanImage> {
        self.session.remove_image(Modality::Oct, index)
    }

    pub fn dismiss_error(&mut self) {
        self.session.dismiss_error();
    }

    /// Return an in-flight stage to its pre-submission state.
    pub fn abandon_submission(&mut self) -> bool {
        self.session.abandon_submission()
    }

    /// Start over with an empty session.
    pub fn reset(&mut self) {
        self.session.reset();
    }

    // =========================================================================
    // Stages
    // =========================================================================

    /// Submit the selected fundus photos.
    pub async fn submit_fundus(&mut self) -> WorkflowResult<WorkflowState> {
        self.submit(Modality::FundusPhoto).await
    }

    /// Submit the selected OCT scans. Requires the OCT stage to be unlocked.
    pub async fn submit_oct(&mut self) -> WorkflowResult<WorkflowState> {
        self.submit(Modality::Oct).await
    }

    async fn submit(&mut self, modality: Modality) -> WorkflowResult<WorkflowState> {
        let request = self.session.begin_submission(modality)?;
        let session_id = self.session.session_id().to_string();

        let service = match modality {
            Modality::FundusPhoto => &self.fundus,
            Modality::Oct => &self.oct,
        };

        info!(
            %session_id,
            %modality,
            endpoint = service.endpoint(),
            images = request.images.len(),
            "Submitting scans"
        );
        for image in &request.images {
            debug!(
                %session_id,
                filename = %image.filename,
                digest = %image.digest(),
                bytes = image.len(),
                "Scan image"
            );
        }

        let outcome = service.predict(&request, &self.options).await;

        match &outcome {
            Err(InferenceError::UnexpectedResponseShape(shape)) => {
                error!(%session_id, %modality, %shape, "Unexpected inference response shape");
            }
            Err(InferenceError::RequestFailed(message)) => {
                warn!(%session_id, %modality, %message, "Inference request failed");
            }
            Ok(predictions) => {
                if predictions.len() != request.images.len() {
                    warn!(
                        %session_id,
                        %modality,
                        submitted = request.images.len(),
                        returned = predictions.len(),
                        "Prediction count differs from image count"
                    );
                }
            }
        }

        let state = self.session.complete_submission(outcome)?;

        info!(
            %session_id,
            %modality,
            %state,
            fundus_diagnosis = self.session.fundus_diagnosis().unwrap_or_default(),
            "Stage complete"
        );

        self.record(modality, &request.patient_id).await?;

        Ok(state)
    }

    /// Persist the displayed predictions. State is kept on failure.
    async fn record(&mut self, modality: Modality, patient_id: &str) -> WorkflowResult<()> {
        let diagnoses: Vec<String> = self
            .session
            .results()
            .iter()
            .filter(|p| !p.is_error() && !p.disease.trim().is_empty())
            .map(|p| p.disease.clone())
            .collect();

        for diagnosis in &diagnoses {
            if let Err(e) = self
                .recorder
                .append_history(patient_id, modality.scan_type(), diagnosis)
                .await
            {
                warn!(
                    session_id = %self.session.session_id(),
                    %patient_id,
                    error = %e,
                    "Failed to record history"
                );
                self.session.set_error(HISTORY_FAILURE_MESSAGE);
                return Err(e.into());
            }
        }

        Ok(())
    }
}
