//! WorkflowController — sequences the onboarding steps and threads
//! artifacts through the session.
//!
//! Every operation is guarded by the step it belongs to; a step failure
//! leaves previously collected session fields intact, and the user can
//! always retry the current step. Transitions are strictly sequential: a
//! later step's call is never issued before the prior step's success is
//! observed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::capture::{
    CancelToken, ChallengeAction, ChallengeCaptureEngine, ChallengeOutcome, ChallengeSequence,
    FrameSource,
};
use crate::config::CaptureConfig;
use crate::error::{Error, WorkflowError};
use crate::gateway::VerificationGateway;
use crate::session::model::{KycSession, KycStatus, OcrResult, Profile, SessionUser, Similarity};
use crate::session::store::SessionStore;
use crate::upload::{ImagePayload, UploadManager};

use super::state::WorkflowStep;

/// Controller-level outcome of one liveness attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LivenessProgress {
    /// A burst is already in flight; the request was a no-op.
    Busy,
    /// The oracle rejected the action; the same challenge should be
    /// retried.
    Retry,
    /// The action passed; the contained action is now current.
    NextChallenge(ChallengeAction),
    /// All challenges passed and the face match ran automatically; the
    /// similarity verdict is stored and the flow is at FinalDecision.
    FaceMatched(Similarity),
}

/// Clears the controller busy flag on drop.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The onboarding step state machine.
pub struct WorkflowController {
    store: Arc<SessionStore>,
    gateway: Arc<dyn VerificationGateway>,
    uploads: UploadManager,
    engine: ChallengeCaptureEngine,
    step: RwLock<WorkflowStep>,
    busy: AtomicBool,
}

impl WorkflowController {
    /// Build a controller over an already-loaded session store, resuming
    /// at the furthest step the restored session supports.
    pub async fn new(
        store: Arc<SessionStore>,
        gateway: Arc<dyn VerificationGateway>,
        sequence: ChallengeSequence,
        capture_config: CaptureConfig,
    ) -> Self {
        let session = store.get().await;
        let step = WorkflowStep::resume_from(&session);
        tracing::info!(%step, "Workflow initialized");
        Self {
            uploads: UploadManager::new(Arc::clone(&gateway)),
            engine: ChallengeCaptureEngine::new(Arc::clone(&gateway), sequence, capture_config),
            store,
            gateway,
            step: RwLock::new(step),
            busy: AtomicBool::new(false),
        }
    }

    pub async fn current_step(&self) -> WorkflowStep {
        *self.step.read().await
    }

    /// Snapshot of the session.
    pub async fn session(&self) -> KycSession {
        self.store.get().await
    }

    /// The liveness challenge currently awaiting a successful burst.
    pub fn current_challenge(&self) -> Option<ChallengeAction> {
        self.engine.current_action()
    }

    /// Register the user, falling back to a login when the gateway reports
    /// a duplicate identity. On success the session owns the resolved user
    /// id and the workflow moves to DocumentUpload.
    pub async fn register(&self, profile: Profile) -> Result<WorkflowStep, Error> {
        self.expect_step(WorkflowStep::Registration).await?;
        let _busy = self.try_busy()?;
        profile.validate()?;

        let identity = match self.gateway.register_user(&profile).await {
            Ok(identity) => identity,
            Err(err) if err.is_conflict() => {
                tracing::info!("Registration conflict; resolving identity via login");
                self.gateway
                    .login_user(&profile.email, &profile.mobile)
                    .await
                    .map_err(|login_err| {
                        // Terminal for this input: the user must change it.
                        Error::Workflow(WorkflowError::RegistrationRejected {
                            detail: format!("account exists but login failed: {login_err}"),
                        })
                    })?
            }
            Err(err) => return Err(err.into()),
        };

        let profile = identity.profile.unwrap_or(profile);
        self.store
            .set_user(SessionUser {
                user_id: identity.user_id,
                profile,
            })
            .await?;
        self.advance_to(WorkflowStep::DocumentUpload).await?;
        Ok(WorkflowStep::DocumentUpload)
    }

    /// Upload both document sides. On success the OCR result replaces the
    /// stored one wholesale and the workflow moves to OcrReview; on
    /// failure the session is untouched.
    pub async fn upload_document(
        &self,
        front: Option<&ImagePayload>,
        back: Option<&ImagePayload>,
    ) -> Result<OcrResult, Error> {
        self.expect_step(WorkflowStep::DocumentUpload).await?;
        let user_id = self.require_user_id().await?;
        let _busy = self.try_busy()?;

        let ocr = self.uploads.upload_document(&user_id, front, back).await?;
        self.store.set_ocr_result(ocr.clone()).await?;
        self.advance_to(WorkflowStep::OcrReview).await?;
        Ok(ocr)
    }

    /// Re-fetch the OCR extraction from the gateway, replacing the stored
    /// copy wholesale. Only valid while reviewing.
    pub async fn fetch_ocr(&self) -> Result<OcrResult, Error> {
        self.expect_step(WorkflowStep::OcrReview).await?;
        let user_id = self.require_user_id().await?;

        let ocr = self.gateway.fetch_ocr_result(&user_id).await?;
        self.store.set_ocr_result(ocr.clone()).await?;
        Ok(ocr)
    }

    /// User acknowledges the OCR extraction. No network guard.
    pub async fn confirm_ocr(&self) -> Result<WorkflowStep, Error> {
        self.expect_step(WorkflowStep::OcrReview).await?;
        self.advance_to(WorkflowStep::SelfieCapture).await?;
        Ok(WorkflowStep::SelfieCapture)
    }

    /// Upload the selfie; once acknowledged the workflow moves to the
    /// liveness challenge.
    pub async fn capture_selfie(&self, image: &ImagePayload) -> Result<WorkflowStep, Error> {
        self.expect_step(WorkflowStep::SelfieCapture).await?;
        let user_id = self.require_user_id().await?;
        let _busy = self.try_busy()?;

        self.uploads.upload_selfie(&user_id, image).await?;
        self.advance_to(WorkflowStep::LivenessChallenge).await?;
        Ok(WorkflowStep::LivenessChallenge)
    }

    /// Run one liveness challenge attempt.
    ///
    /// When the sequence completes, the face match is triggered
    /// automatically with no user action; a face-match failure leaves the
    /// workflow at FaceMatch for an explicit [`Self::run_face_match`]
    /// retry.
    pub async fn run_liveness_step(
        &self,
        source: &mut dyn FrameSource,
        cancel: &CancelToken,
    ) -> Result<LivenessProgress, Error> {
        self.expect_step(WorkflowStep::LivenessChallenge).await?;
        let user_id = self.require_user_id().await?;

        // The engine carries its own busy guard for the burst.
        let outcome = self.engine.run_current(&user_id, source, cancel).await?;
        match outcome {
            ChallengeOutcome::Busy => Ok(LivenessProgress::Busy),
            ChallengeOutcome::Rejected => Ok(LivenessProgress::Retry),
            ChallengeOutcome::Advanced { next } => Ok(LivenessProgress::NextChallenge(next)),
            ChallengeOutcome::SequenceComplete => {
                self.advance_to(WorkflowStep::FaceMatch).await?;
                let similarity = self.run_face_match().await?;
                Ok(LivenessProgress::FaceMatched(similarity))
            }
        }
    }

    /// Run the face match and store the similarity verdict.
    ///
    /// Invoked automatically when the challenge sequence completes; call
    /// it explicitly to retry after a network failure. Never retries on
    /// its own.
    pub async fn run_face_match(&self) -> Result<Similarity, Error> {
        self.expect_step(WorkflowStep::FaceMatch).await?;
        let user_id = self.require_user_id().await?;

        let similarity = self.gateway.run_face_match(&user_id).await?;
        self.store.set_similarity(similarity).await?;
        self.advance_to(WorkflowStep::FinalDecision).await?;
        Ok(similarity)
    }

    /// Ask for the terminal verdict.
    ///
    /// Fail-open: a gateway failure still lands the user on the Dashboard
    /// with a FAILED status instead of stranding them mid-flow.
    pub async fn finalize(&self) -> Result<KycStatus, Error> {
        self.expect_step(WorkflowStep::FinalDecision).await?;
        let user_id = self.require_user_id().await?;
        let _busy = self.try_busy()?;

        let status = match self.gateway.run_final_decision(&user_id).await {
            Ok(decision) => {
                if let Some(reason) = &decision.reason {
                    tracing::info!(status = %decision.final_status, reason, "Final decision returned");
                }
                decision.final_status
            }
            Err(err) => {
                tracing::warn!(error = %err, "Final decision call failed; landing on dashboard as FAILED");
                KycStatus::Failed
            }
        };

        self.store.set_kyc_status(status).await?;
        self.advance_to(WorkflowStep::Dashboard).await?;
        Ok(status)
    }

    /// Refresh the authoritative status from the gateway (Dashboard only).
    pub async fn refresh_status(&self) -> Result<KycStatus, Error> {
        self.expect_step(WorkflowStep::Dashboard).await?;
        let user_id = self.require_user_id().await?;

        let status = self.gateway.fetch_kyc_status(&user_id).await?;
        self.store.set_kyc_status(status).await?;
        Ok(status)
    }

    /// Fetch the profile as the gateway knows it.
    pub async fn fetch_profile(&self) -> Result<Profile, Error> {
        let user_id = self.require_user_id().await?;
        Ok(self.gateway.fetch_profile(&user_id).await?)
    }

    /// Destroy the session and return to Registration.
    pub async fn logout(&self) -> Result<(), Error> {
        self.store.reset().await?;
        self.engine.reset();
        *self.step.write().await = WorkflowStep::Registration;
        tracing::info!("Session cleared; workflow reset to registration");
        Ok(())
    }

    fn try_busy(&self) -> Result<BusyGuard<'_>, WorkflowError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WorkflowError::Busy);
        }
        Ok(BusyGuard(&self.busy))
    }

    async fn expect_step(&self, expected: WorkflowStep) -> Result<(), WorkflowError> {
        let current = *self.step.read().await;
        if current != expected {
            return Err(WorkflowError::WrongStep {
                step: expected.to_string(),
                current: current.to_string(),
            });
        }
        Ok(())
    }

    async fn advance_to(&self, target: WorkflowStep) -> Result<(), WorkflowError> {
        let mut step = self.step.write().await;
        if !step.can_transition_to(target) {
            return Err(WorkflowError::WrongStep {
                step: target.to_string(),
                current: step.to_string(),
            });
        }
        tracing::info!(from = %*step, to = %target, "Workflow step advanced");
        *step = target;
        Ok(())
    }

    /// Resolve the session's user id. Entering a step without one means
    /// the user is not authenticated: redirect to Registration rather
    /// than crash.
    async fn require_user_id(&self) -> Result<String, Error> {
        if let Some(id) = self.store.user_id().await {
            return Ok(id);
        }
        tracing::warn!("No resolved user id in session; redirecting to registration");
        *self.step.write().await = WorkflowStep::Registration;
        Err(WorkflowError::NotAuthenticated.into())
    }
}
