//! OCT follow-up gating.

/// Fundus diagnoses that unlock the OCT follow-up scan.
pub const OCT_ELIGIBLE_DIAGNOSES: [&str; 2] = ["Diabetic Retinopathy", "Normal"];

/// Whether a fundus-photo diagnosis qualifies for an OCT follow-up.
///
/// Exact, case-sensitive match against [`OCT_ELIGIBLE_DIAGNOSES`].
pub fn is_oct_eligible(diagnosis: &str) -> bool {
    OCT_ELIGIBLE_DIAGNOSES.contains(&diagnosis)
}
