//! Onboarding step state machine — tracks where the user is in the flow.

use serde::{Deserialize, Serialize};

use crate::session::model::KycSession;

/// The steps of the onboarding flow.
///
/// Progresses linearly: Registration → DocumentUpload → OcrReview →
/// SelfieCapture → LivenessChallenge → FaceMatch → FinalDecision →
/// Dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Registration,
    DocumentUpload,
    OcrReview,
    SelfieCapture,
    LivenessChallenge,
    FaceMatch,
    FinalDecision,
    Dashboard,
}

impl WorkflowStep {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: WorkflowStep) -> bool {
        use WorkflowStep::*;
        matches!(
            (self, target),
            (Registration, DocumentUpload)
                | (DocumentUpload, OcrReview)
                | (OcrReview, SelfieCapture)
                | (SelfieCapture, LivenessChallenge)
                | (LivenessChallenge, FaceMatch)
                | (FaceMatch, FinalDecision)
                | (FinalDecision, Dashboard)
        )
    }

    /// Whether this step is terminal (the flow is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dashboard)
    }

    /// The next step in the linear progression, if any.
    pub fn next(&self) -> Option<WorkflowStep> {
        use WorkflowStep::*;
        match self {
            Registration => Some(DocumentUpload),
            DocumentUpload => Some(OcrReview),
            OcrReview => Some(SelfieCapture),
            SelfieCapture => Some(LivenessChallenge),
            LivenessChallenge => Some(FaceMatch),
            FaceMatch => Some(FinalDecision),
            FinalDecision => Some(Dashboard),
            Dashboard => None,
        }
    }

    /// Derive the furthest safe step from a restored session.
    ///
    /// Session fields fill monotonically forward, so their presence tells
    /// us where to resume. The persisted record cannot distinguish the
    /// three capture-oriented steps, so a session with an OCR result but
    /// no similarity resumes at the review step; re-running review and
    /// capture never invalidates a stored artifact.
    pub fn resume_from(session: &KycSession) -> Self {
        if !session.is_authenticated() {
            return Self::Registration;
        }
        if session.kyc_status.is_some() {
            return Self::Dashboard;
        }
        if session.similarity.is_some() {
            return Self::FinalDecision;
        }
        if session.ocr_result.is_some() {
            return Self::OcrReview;
        }
        Self::DocumentUpload
    }
}

impl Default for WorkflowStep {
    fn default() -> Self {
        Self::Registration
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Registration => "registration",
            Self::DocumentUpload => "document_upload",
            Self::OcrReview => "ocr_review",
            Self::SelfieCapture => "selfie_capture",
            Self::LivenessChallenge => "liveness_challenge",
            Self::FaceMatch => "face_match",
            Self::FinalDecision => "final_decision",
            Self::Dashboard => "dashboard",
        };
        write!(f, "{s}")
    }
}
