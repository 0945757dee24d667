//! VerificationGateway — the remote verification service contract.
//!
//! The engine depends only on these logical operations; OCR, liveness and
//! face-match models live behind them and are opaque to the client.

pub mod http;

use async_trait::async_trait;

use crate::capture::{ChallengeAction, Frame};
use crate::error::GatewayError;
use crate::session::model::{KycStatus, OcrResult, Profile, Similarity};
use crate::upload::ImagePayload;

pub use http::HttpGateway;

/// Identity resolved at registration or login.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_id: String,
    /// Profile as the gateway knows it; absent when the service echoes
    /// only the id.
    pub profile: Option<Profile>,
}

/// Boolean verdict from the liveness oracle for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessOutcome {
    pub success: bool,
}

/// Per-signal breakdown accompanying the final decision.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct DecisionMetrics {
    pub ocr_passed: bool,
    pub liveness_passed: bool,
    pub name_score: f64,
    pub face_score: f64,
}

/// Authoritative terminal verdict combining all prior signals.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalDecision {
    pub final_status: KycStatus,
    pub reason: Option<String>,
    pub metrics: Option<DecisionMetrics>,
}

/// Remote verification service. All calls are asynchronous and carry the
/// client-level deadline configured on the implementation.
#[async_trait]
pub trait VerificationGateway: Send + Sync {
    /// Create the user. A duplicate identity surfaces as
    /// [`GatewayError::Conflict`].
    async fn register_user(&self, profile: &Profile) -> Result<UserIdentity, GatewayError>;

    /// Resolve an existing identity by (email, mobile).
    async fn login_user(&self, email: &str, mobile: &str) -> Result<UserIdentity, GatewayError>;

    /// Ship both document sides; returns the OCR extraction.
    async fn upload_document(
        &self,
        user_id: &str,
        front: &ImagePayload,
        back: &ImagePayload,
    ) -> Result<OcrResult, GatewayError>;

    /// Re-fetch the stored OCR extraction.
    async fn fetch_ocr_result(&self, user_id: &str) -> Result<OcrResult, GatewayError>;

    /// Ship the selfie; the gateway acknowledges receipt.
    async fn capture_selfie(&self, user_id: &str, image: &ImagePayload)
    -> Result<(), GatewayError>;

    /// Submit one challenge burst to the liveness oracle.
    async fn submit_liveness_step(
        &self,
        user_id: &str,
        action: ChallengeAction,
        frames: &[Frame],
    ) -> Result<LivenessOutcome, GatewayError>;

    /// Compare the selfie against the document photo.
    async fn run_face_match(&self, user_id: &str) -> Result<Similarity, GatewayError>;

    /// Ask for the terminal verdict.
    async fn run_final_decision(&self, user_id: &str) -> Result<FinalDecision, GatewayError>;

    async fn fetch_profile(&self, user_id: &str) -> Result<Profile, GatewayError>;

    async fn fetch_kyc_status(&self, user_id: &str) -> Result<KycStatus, GatewayError>;
}
