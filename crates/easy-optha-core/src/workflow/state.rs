//! Workflow states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where an upload session is in the two-stage workflow.
///
/// ```text
/// Idle ⇄ FpSelected → FpSubmitting → FpResultReceived        (not eligible: terminal)
///                                   ↘ OctUnlocked → OctSubmitting → Done
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    /// Nothing selected yet
    Idle,
    /// Fundus images selected
    FpSelected,
    /// Fundus request in flight
    FpSubmitting,
    /// Fundus result received, OCT not offered
    FpResultReceived,
    /// Fundus result received, OCT stage available
    OctUnlocked,
    /// OCT request in flight
    OctSubmitting,
    /// OCT result received
    Done,
}

impl WorkflowState {
    /// A request is in flight; submit affordances must be disabled.
    pub fn is_submitting(&self) -> bool {
        matches!(self, WorkflowState::FpSubmitting | WorkflowState::OctSubmitting)
    }

    /// No forward transition remains (only retry or reset).
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::FpResultReceived | WorkflowState::Done)
    }

    /// Fundus images can be added or removed.
    pub fn accepts_fundus_selection(&self) -> bool {
        matches!(self, WorkflowState::Idle | WorkflowState::FpSelected)
    }

    /// OCT images can be added or removed.
    pub fn accepts_oct_selection(&self) -> bool {
        matches!(self, WorkflowState::OctUnlocked)
    }

    /// The fundus stage can be (re)submitted.
    pub fn accepts_fundus_submission(&self) -> bool {
        matches!(
            self,
            WorkflowState::Idle | WorkflowState::FpSelected | WorkflowState::FpResultReceived
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
