//! Status presentation — what the dashboard shows for each KYC status.
//!
//! An exhaustive mapping from the status enum to a presentation
//! descriptor, so a newly added status fails to compile until it is
//! handled here.

use serde::Serialize;

use crate::session::model::KycStatus;

/// Visual tone of the status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Info,
    Success,
    Warning,
    Danger,
}

/// Action the dashboard offers for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusAction {
    RetryKyc,
}

/// Everything the dashboard renders for one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusPresentation {
    pub tone: StatusTone,
    /// Badge text, e.g. "MANUAL REVIEW".
    pub label: String,
    pub message: &'static str,
    pub actions: &'static [StatusAction],
}

const RETRY: &[StatusAction] = &[StatusAction::RetryKyc];
const NO_ACTIONS: &[StatusAction] = &[];

impl KycStatus {
    /// Presentation descriptor for this status.
    pub fn presentation(&self) -> StatusPresentation {
        let (tone, message, actions): (StatusTone, &'static str, &'static [StatusAction]) =
            match self {
                Self::Pending => (
                    StatusTone::Info,
                    "Your verification is currently in progress.",
                    NO_ACTIONS,
                ),
                Self::Verified => (
                    StatusTone::Success,
                    "You are fully verified! You can now access all features.",
                    NO_ACTIONS,
                ),
                Self::ManualReview => (
                    StatusTone::Warning,
                    "Your application has been sent for manual review. This usually \
                     takes 24-48 hours. No action is required, please wait.",
                    NO_ACTIONS,
                ),
                Self::OcrFailed => (
                    StatusTone::Danger,
                    "We could not read your document clearly. Please retry with \
                     sharper, well-lit images.",
                    RETRY,
                ),
                Self::LivenessFailed => (
                    StatusTone::Danger,
                    "The liveness check did not pass. Please retry in good lighting \
                     and follow each instruction.",
                    RETRY,
                ),
                Self::FaceFailed => (
                    StatusTone::Danger,
                    "Your selfie did not match the document photo. Please retry the \
                     process.",
                    RETRY,
                ),
                Self::NameFailed => (
                    StatusTone::Danger,
                    "The name on the document did not match your profile. Please \
                     retry with the correct document.",
                    RETRY,
                ),
                Self::Failed => (
                    StatusTone::Danger,
                    "Verification failed. Please retry the process with clear \
                     documents.",
                    RETRY,
                ),
            };

        StatusPresentation {
            tone,
            label: self.as_wire_str().replace('_', " "),
            message,
            actions,
        }
    }
}
