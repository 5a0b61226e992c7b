//! Upload session state.
//!
//! Holds everything the user has entered for one pass through the workflow
//! and performs the synchronous half of every transition. The controller
//! wraps these with the remote calls.

use tracing::debug;

use super::{is_oct_eligible, WorkflowError, WorkflowResult, WorkflowState};
use crate::inference::{InferenceError, InferenceRequest};
use crate::models::{require_patient_id, Modality, Prediction, ScanImage, ValidationError};

/// Banner text for responses that could not be understood.
pub const UNEXPECTED_RESPONSE_MESSAGE: &str =
    "Received an unexpected response format from the server.";

/// State of one user's upload session.
#[derive(Debug, Clone)]
pub struct UploadSession {
    /// Session ID (log correlation only)
    session_id: String,
    state: WorkflowState,
    /// State to return to if the in-flight submission fails or is abandoned
    resume_state: WorkflowState,
    /// Patient ID as typed
    patient_id: String,
    /// Patient ID captured when the fundus stage was submitted
    submitted_patient_id: Option<String>,
    fundus_images: Vec<ScanImage>,
    oct_images: Vec<ScanImage>,
    /// First fundus result's disease
    fundus_diagnosis: Option<String>,
    /// Predictions currently on display
    results: Vec<Prediction>,
    /// Inline error for the patient ID field
    patient_id_error: Option<String>,
    /// Dismissible banner error
    error: Option<String>,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadSession {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            state: WorkflowState::Idle,
            resume_state: WorkflowState::Idle,
            patient_id: String::new(),
            submitted_patient_id: None,
            fundus_images: Vec::new(),
            oct_images: Vec::new(),
            fundus_diagnosis: None,
            results: Vec::new(),
            patient_id_error: None,
            error: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    /// Patient ID the current results belong to.
    pub fn submitted_patient_id(&self) -> Option<&str> {
        self.submitted_patient_id.as_deref()
    }

    pub fn images(&self, modality: Modality) -> &[ScanImage] {
        match modality {
            Modality::FundusPhoto => &self.fundus_images,
            Modality::Oct => &self.oct_images,
        }
    }

    pub fn fundus_diagnosis(&self) -> Option<&str> {
        self.fundus_diagnosis.as_deref()
    }

    pub fn results(&self) -> &[Prediction] {
        &self.results
    }

    pub fn patient_id_error(&self) -> Option<&str> {
        self.patient_id_error.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// In-progress flag; true disables the submit affordance.
    pub fn is_in_progress(&self) -> bool {
        self.state.is_submitting()
    }

    pub fn is_oct_unlocked(&self) -> bool {
        matches!(
            self.state,
            WorkflowState::OctUnlocked | WorkflowState::OctSubmitting
        )
    }

    // =========================================================================
    // Input
    // =========================================================================

    /// Update the patient ID. Clears the inline error once non-blank.
    pub fn set_patient_id(&mut self, patient_id: impl Into<String>) {
        self.patient_id = patient_id.into();
        if !self.patient_id.trim().is_empty() {
            self.patient_id_error = None;
        }
    }

    /// Append images to a modality's selection, keeping earlier picks.
    pub fn add_images(
        &mut self,
        modality: Modality,
        images: impl IntoIterator<Item = ScanImage>,
    ) -> WorkflowResult<usize> {
        self.ensure_selectable(modality, "add images")?;

        let selection = self.selection_mut(modality);
        let before = selection.len();
        selection.extend(images.into_iter().map(|mut image| {
            image.modality = modality;
            image
        }));
        let added = selection.len() - before;

        if modality == Modality::FundusPhoto && !self.fundus_images.is_empty() {
            self.state = WorkflowState::FpSelected;
        }

        Ok(added)
    }

    /// Remove the image at `index`, keeping the others in order.
    pub fn remove_image(&mut self, modality: Modality, index: usize) -> WorkflowResult<ScanImage> {
        self.ensure_selectable(modality, "remove image")?;

        let selection = self.selection_mut(modality);
        if index >= selection.len() {
            return Err(ValidationError::ImageIndexOutOfRange {
                index,
                len: selection.len(),
            }
            .into());
        }
        let removed = selection.remove(index);

        if modality == Modality::FundusPhoto && self.fundus_images.is_empty() {
            self.state = WorkflowState::Idle;
        }

        Ok(removed)
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Back to `Idle` with nothing selected.
    pub fn reset(&mut self) {
        let session_id = std::mem::take(&mut self.session_id);
        *self = Self {
            session_id,
            ..Self::new()
        };
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Validate and enter the submitting state for a stage.
    ///
    /// Returns the request to send. Nothing changes when validation fails,
    /// apart from the recorded error.
    pub fn begin_submission(&mut self, modality: Modality) -> WorkflowResult<InferenceRequest> {
        if self.state.is_submitting() {
            return Err(WorkflowError::SubmissionInProgress);
        }
        self.error = None;

        let (patient_id, images) = match modality {
            Modality::FundusPhoto => {
                if !self.state.accepts_fundus_submission() {
                    return Err(self.unavailable("submit fundus images"));
                }
                let patient_id = match require_patient_id(&self.patient_id) {
                    Ok(id) => id.to_string(),
                    Err(e) => {
                        self.patient_id_error = Some(e.to_string());
                        return Err(e.into());
                    }
                };
                if self.fundus_images.is_empty() {
                    return Err(self.reject(ValidationError::NoImagesSelected));
                }
                (patient_id, self.fundus_images.clone())
            }
            Modality::Oct => {
                if !self.state.accepts_oct_selection() {
                    return Err(self.unavailable("submit OCT images"));
                }
                if self.oct_images.is_empty() {
                    return Err(self.reject(ValidationError::NoOctImagesSelected));
                }
                // Reused from the fundus stage, not re-validated
                let patient_id = self.submitted_patient_id.clone().unwrap_or_default();
                (patient_id, self.oct_images.clone())
            }
        };

        self.patient_id_error = None;
        self.resume_state = self.state;
        self.state = match modality {
            Modality::FundusPhoto => {
                self.submitted_patient_id = Some(patient_id.clone());
                WorkflowState::FpSubmitting
            }
            Modality::Oct => WorkflowState::OctSubmitting,
        };

        Ok(InferenceRequest::new(patient_id, images))
    }

    /// Apply the outcome of the in-flight submission.
    pub fn complete_submission(
        &mut self,
        outcome: Result<Vec<Prediction>, InferenceError>,
    ) -> WorkflowResult<WorkflowState> {
        let modality = match self.state {
            WorkflowState::FpSubmitting => Modality::FundusPhoto,
            WorkflowState::OctSubmitting => Modality::Oct,
            _ => return Err(self.unavailable("complete submission")),
        };

        let predictions = match outcome {
            Ok(predictions) => predictions,
            Err(e) => {
                self.state = self.resume_state;
                self.error = Some(match &e {
                    InferenceError::RequestFailed(message) => message.clone(),
                    InferenceError::UnexpectedResponseShape(_) => {
                        UNEXPECTED_RESPONSE_MESSAGE.to_string()
                    }
                });
                return Err(e.into());
            }
        };

        let next = match modality {
            Modality::FundusPhoto => {
                // Only the first result drives the OCT gate, even for
                // multi-image uploads.
                if predictions.len() > 1 {
                    debug!(
                        session_id = %self.session_id,
                        count = predictions.len(),
                        "Multiple fundus results, using the first as the diagnosis"
                    );
                }
                self.fundus_diagnosis = predictions.first().map(|p| p.disease.clone());

                match self.fundus_diagnosis.as_deref() {
                    Some(diagnosis) if is_oct_eligible(diagnosis) => WorkflowState::OctUnlocked,
                    _ => WorkflowState::FpResultReceived,
                }
            }
            Modality::Oct => WorkflowState::Done,
        };
        self.state = next;
        self.results = predictions;

        Ok(self.state)
    }

    /// Return an in-flight stage to where it was before submission.
    ///
    /// The request itself is not cancelled; its outcome is simply never
    /// applied.
    pub fn abandon_submission(&mut self) -> bool {
        if !self.state.is_submitting() {
            return false;
        }
        self.state = self.resume_state;
        true
    }

    /// Record a banner error (e.g. a history write failure).
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn selection_mut(&mut self, modality: Modality) -> &mut Vec<ScanImage> {
        match modality {
            Modality::FundusPhoto => &mut self.fundus_images,
            Modality::Oct => &mut self.oct_images,
        }
    }

    fn ensure_selectable(&self, modality: Modality, operation: &'static str) -> WorkflowResult<()> {
        let allowed = match modality {
            Modality::FundusPhoto => self.state.accepts_fundus_selection(),
            Modality::Oct => self.state.accepts_oct_selection(),
        };
        if allowed {
            Ok(())
        } else {
            Err(self.unavailable(operation))
        }
    }

    fn unavailable(&self, operation: &'static str) -> WorkflowError {
        WorkflowError::StageUnavailable {
            operation,
            state: self.state,
        }
    }

    fn reject(&mut self, error: ValidationError) -> WorkflowError {
        self.error = Some(error.to_string());
        error.into()
    }
}
