//! End-to-end workflow tests against a scripted gateway.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use kyc_onboard::capture::{CancelToken, ChallengeAction, ChallengeSequence, Frame, FrameSource};
use kyc_onboard::config::CaptureConfig;
use kyc_onboard::error::{Error, GatewayError, ValidationError, WorkflowError};
use kyc_onboard::gateway::{FinalDecision, LivenessOutcome, UserIdentity, VerificationGateway};
use kyc_onboard::session::{
    KycStatus, MemoryBackend, OcrResult, Profile, SessionStore, Similarity, StorageBackend,
};
use kyc_onboard::upload::ImagePayload;
use kyc_onboard::workflow::{LivenessProgress, WorkflowController, WorkflowStep};

fn profile() -> Profile {
    Profile {
        first_name: "Asha".to_string(),
        last_name: "Rao".to_string(),
        email: "asha@example.com".to_string(),
        mobile: "9876543210".to_string(),
        pan_number: "ABCDE1234F".to_string(),
    }
}

fn ocr() -> OcrResult {
    OcrResult {
        name: Some("Asha Rao".to_string()),
        dob: Some("1994-02-11".to_string()),
        aadhaar_number: Some("XXXX-XXXX-1234".to_string()),
        aadhaar_full: None,
        confidence: 0.93,
    }
}

fn jpeg(name: &str) -> ImagePayload {
    ImagePayload::jpeg(name, vec![0xFF, 0xD8, 0xFF, 0xE0])
}

/// Scripted gateway double. Each queue is popped front-first; an empty
/// queue yields the happy-path default. Every call is recorded by name.
#[derive(Default)]
struct MockGateway {
    calls: Mutex<Vec<String>>,
    register: Mutex<Vec<Result<UserIdentity, GatewayError>>>,
    login: Mutex<Vec<Result<UserIdentity, GatewayError>>>,
    liveness: Mutex<Vec<bool>>,
    face_match: Mutex<Vec<Result<Similarity, GatewayError>>>,
    decision: Mutex<Vec<Result<FinalDecision, GatewayError>>>,
}

impl MockGateway {
    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn script_register(&self, result: Result<UserIdentity, GatewayError>) {
        self.register.lock().unwrap().push(result);
    }

    fn script_login(&self, result: Result<UserIdentity, GatewayError>) {
        self.login.lock().unwrap().push(result);
    }

    fn script_liveness(&self, results: &[bool]) {
        self.liveness.lock().unwrap().extend_from_slice(results);
    }

    fn script_face_match(&self, result: Result<Similarity, GatewayError>) {
        self.face_match.lock().unwrap().push(result);
    }

    fn script_decision(&self, result: Result<FinalDecision, GatewayError>) {
        self.decision.lock().unwrap().push(result);
    }
}

fn pop<T>(queue: &Mutex<Vec<T>>) -> Option<T> {
    let mut queue = queue.lock().unwrap();
    if queue.is_empty() { None } else { Some(queue.remove(0)) }
}

#[async_trait]
impl VerificationGateway for MockGateway {
    async fn register_user(&self, _: &Profile) -> Result<UserIdentity, GatewayError> {
        self.record("register_user");
        pop(&self.register).unwrap_or_else(|| {
            Ok(UserIdentity {
                user_id: "101".to_string(),
                profile: None,
            })
        })
    }

    async fn login_user(&self, _: &str, _: &str) -> Result<UserIdentity, GatewayError> {
        self.record("login_user");
        pop(&self.login).unwrap_or_else(|| {
            Ok(UserIdentity {
                user_id: "55".to_string(),
                profile: Some(profile()),
            })
        })
    }

    async fn upload_document(
        &self,
        _: &str,
        _: &ImagePayload,
        _: &ImagePayload,
    ) -> Result<OcrResult, GatewayError> {
        self.record("upload_document");
        Ok(ocr())
    }

    async fn fetch_ocr_result(&self, _: &str) -> Result<OcrResult, GatewayError> {
        self.record("fetch_ocr_result");
        Ok(ocr())
    }

    async fn capture_selfie(&self, _: &str, _: &ImagePayload) -> Result<(), GatewayError> {
        self.record("capture_selfie");
        Ok(())
    }

    async fn submit_liveness_step(
        &self,
        _: &str,
        action: ChallengeAction,
        _: &[Frame],
    ) -> Result<LivenessOutcome, GatewayError> {
        self.record(&format!("liveness:{}", action.wire_name()));
        let success = pop(&self.liveness).unwrap_or(true);
        Ok(LivenessOutcome { success })
    }

    async fn run_face_match(&self, _: &str) -> Result<Similarity, GatewayError> {
        self.record("run_face_match");
        pop(&self.face_match).unwrap_or(Ok(Similarity {
            score: 0.78,
            is_match: true,
        }))
    }

    async fn run_final_decision(&self, _: &str) -> Result<FinalDecision, GatewayError> {
        self.record("run_final_decision");
        pop(&self.decision).unwrap_or(Ok(FinalDecision {
            final_status: KycStatus::Verified,
            reason: None,
            metrics: None,
        }))
    }

    async fn fetch_profile(&self, _: &str) -> Result<Profile, GatewayError> {
        self.record("fetch_profile");
        Ok(profile())
    }

    async fn fetch_kyc_status(&self, _: &str) -> Result<KycStatus, GatewayError> {
        self.record("fetch_kyc_status");
        Ok(KycStatus::Verified)
    }
}

/// Yields a fixed frame on every tick.
struct SteadyFrames;

#[async_trait]
impl FrameSource for SteadyFrames {
    async fn next_frame(&mut self) -> Option<Vec<u8>> {
        Some(vec![0xFF, 0xD8])
    }
}

fn fast_config() -> CaptureConfig {
    CaptureConfig {
        frames_per_burst: 6,
        frame_interval: Duration::from_millis(1),
        burst_grace: Duration::from_millis(50),
    }
}

async fn fresh_store() -> Arc<SessionStore> {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::default());
    Arc::new(SessionStore::load(backend).await.unwrap())
}

async fn controller(gateway: Arc<MockGateway>, store: Arc<SessionStore>) -> WorkflowController {
    WorkflowController::new(store, gateway, ChallengeSequence::default(), fast_config()).await
}

async fn advance_to_liveness(ctl: &WorkflowController) {
    ctl.register(profile()).await.unwrap();
    ctl.upload_document(Some(&jpeg("front.jpg")), Some(&jpeg("back.jpg")))
        .await
        .unwrap();
    ctl.confirm_ocr().await.unwrap();
    ctl.capture_selfie(&jpeg("selfie.jpg")).await.unwrap();
    assert_eq!(ctl.current_step().await, WorkflowStep::LivenessChallenge);
}

#[tokio::test]
async fn registration_success_advances_to_document_upload() {
    let gateway = Arc::new(MockGateway::default());
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;

    let next = ctl.register(profile()).await.unwrap();

    assert_eq!(next, WorkflowStep::DocumentUpload);
    assert_eq!(ctl.current_step().await, WorkflowStep::DocumentUpload);
    let session = ctl.session().await;
    assert_eq!(session.user_id(), Some("101"));
    // No profile echoed by the gateway: the submitted one is kept.
    assert_eq!(session.user.unwrap().profile, profile());
    assert_eq!(gateway.calls(), vec!["register_user"]);
}

#[tokio::test]
async fn registration_conflict_falls_back_to_login() {
    let gateway = Arc::new(MockGateway::default());
    gateway.script_register(Err(GatewayError::Conflict {
        code: "USER_EXISTS".to_string(),
    }));
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;

    let next = ctl.register(profile()).await.unwrap();

    assert_eq!(next, WorkflowStep::DocumentUpload);
    assert_eq!(ctl.session().await.user_id(), Some("55"));
    assert_eq!(gateway.calls(), vec!["register_user", "login_user"]);
}

#[tokio::test]
async fn conflict_with_failed_login_rejects_registration() {
    let gateway = Arc::new(MockGateway::default());
    gateway.script_register(Err(GatewayError::Conflict {
        code: "USER_EXISTS".to_string(),
    }));
    gateway.script_login(Err(GatewayError::Server {
        status: 401,
        detail: "credentials do not match".to_string(),
    }));
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;

    let err = ctl.register(profile()).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Workflow(WorkflowError::RegistrationRejected { .. })
    ));
    // Still at registration, nothing stored.
    assert_eq!(ctl.current_step().await, WorkflowStep::Registration);
    assert!(!ctl.session().await.is_authenticated());
}

#[tokio::test]
async fn invalid_pan_never_reaches_the_gateway() {
    let gateway = Arc::new(MockGateway::default());
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;

    let mut bad = profile();
    bad.pan_number = "abcde1234f".to_string();
    let err = ctl.register(bad).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Validation(ValidationError::InvalidField {
            field: "pan_number",
            ..
        })
    ));
    assert!(gateway.calls().is_empty());
    assert_eq!(ctl.current_step().await, WorkflowStep::Registration);
}

#[tokio::test]
async fn missing_document_side_leaves_session_untouched() {
    let gateway = Arc::new(MockGateway::default());
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;
    ctl.register(profile()).await.unwrap();

    let err = ctl
        .upload_document(Some(&jpeg("front.jpg")), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Validation(ValidationError::MissingDocumentSide { side: "back" })
    ));
    assert_eq!(ctl.session().await.ocr_result, None);
    // Same step, retryable with corrected input.
    assert_eq!(ctl.current_step().await, WorkflowStep::DocumentUpload);
    assert_eq!(gateway.calls(), vec!["register_user"]);
}

#[tokio::test]
async fn ocr_refetch_replaces_the_stored_extraction() {
    let gateway = Arc::new(MockGateway::default());
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;
    ctl.register(profile()).await.unwrap();
    ctl.upload_document(Some(&jpeg("front.jpg")), Some(&jpeg("back.jpg")))
        .await
        .unwrap();

    let refetched = ctl.fetch_ocr().await.unwrap();

    assert_eq!(ctl.session().await.ocr_result, Some(refetched));
    // Still reviewing; the user has not acknowledged yet.
    assert_eq!(ctl.current_step().await, WorkflowStep::OcrReview);
    assert_eq!(
        gateway.calls(),
        vec!["register_user", "upload_document", "fetch_ocr_result"]
    );
}

#[tokio::test]
async fn profile_is_fetched_from_the_gateway() {
    let gateway = Arc::new(MockGateway::default());
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;
    ctl.register(profile()).await.unwrap();

    let fetched = ctl.fetch_profile().await.unwrap();
    assert_eq!(fetched, profile());
}

#[tokio::test]
async fn operations_out_of_step_order_are_refused() {
    let gateway = Arc::new(MockGateway::default());
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;

    let err = ctl.finalize().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Workflow(WorkflowError::WrongStep { .. })
    ));

    let err = ctl.capture_selfie(&jpeg("selfie.jpg")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Workflow(WorkflowError::WrongStep { .. })
    ));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn happy_path_runs_every_step_in_order() {
    let gateway = Arc::new(MockGateway::default());
    gateway.script_liveness(&[true, true, true]);
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;
    let cancel = CancelToken::never();

    advance_to_liveness(&ctl).await;
    assert_eq!(ctl.current_challenge(), Some(ChallengeAction::Blink));

    let first = ctl
        .run_liveness_step(&mut SteadyFrames, &cancel)
        .await
        .unwrap();
    assert_eq!(
        first,
        LivenessProgress::NextChallenge(ChallengeAction::TurnLeft)
    );
    let second = ctl
        .run_liveness_step(&mut SteadyFrames, &cancel)
        .await
        .unwrap();
    assert_eq!(
        second,
        LivenessProgress::NextChallenge(ChallengeAction::TurnRight)
    );

    // Third success completes the sequence and the face match runs with no
    // user action.
    let third = ctl
        .run_liveness_step(&mut SteadyFrames, &cancel)
        .await
        .unwrap();
    assert_eq!(
        third,
        LivenessProgress::FaceMatched(Similarity {
            score: 0.78,
            is_match: true,
        })
    );
    assert_eq!(ctl.current_step().await, WorkflowStep::FinalDecision);

    let status = ctl.finalize().await.unwrap();
    assert_eq!(status, KycStatus::Verified);
    assert_eq!(ctl.current_step().await, WorkflowStep::Dashboard);

    let session = ctl.session().await;
    assert_eq!(session.ocr_result, Some(ocr()));
    assert_eq!(
        session.similarity,
        Some(Similarity {
            score: 0.78,
            is_match: true,
        })
    );
    assert_eq!(session.kyc_status, Some(KycStatus::Verified));

    assert_eq!(
        gateway.calls(),
        vec![
            "register_user",
            "upload_document",
            "capture_selfie",
            "liveness:blink",
            "liveness:left",
            "liveness:right",
            "run_face_match",
            "run_final_decision",
        ]
    );
}

#[tokio::test]
async fn liveness_rejection_keeps_the_same_challenge() {
    let gateway = Arc::new(MockGateway::default());
    gateway.script_liveness(&[false]);
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;

    advance_to_liveness(&ctl).await;
    let outcome = ctl
        .run_liveness_step(&mut SteadyFrames, &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(outcome, LivenessProgress::Retry);
    assert_eq!(ctl.current_challenge(), Some(ChallengeAction::Blink));
    assert_eq!(ctl.current_step().await, WorkflowStep::LivenessChallenge);
    assert_eq!(ctl.session().await.similarity, None);
}

#[tokio::test]
async fn face_match_failure_is_retryable_explicitly() {
    let gateway = Arc::new(MockGateway::default());
    gateway.script_face_match(Err(GatewayError::Network("connection reset".to_string())));
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;
    let cancel = CancelToken::never();

    advance_to_liveness(&ctl).await;
    for _ in 0..2 {
        ctl.run_liveness_step(&mut SteadyFrames, &cancel)
            .await
            .unwrap();
    }
    // The automatic face match after the last challenge fails.
    let err = ctl
        .run_liveness_step(&mut SteadyFrames, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Gateway(GatewayError::Network(_))));
    assert_eq!(ctl.current_step().await, WorkflowStep::FaceMatch);
    assert_eq!(ctl.session().await.similarity, None);

    // Manual retry succeeds and moves on.
    let similarity = ctl.run_face_match().await.unwrap();
    assert!(similarity.is_match);
    assert_eq!(ctl.current_step().await, WorkflowStep::FinalDecision);
    assert_eq!(ctl.session().await.similarity, Some(similarity));
}

#[tokio::test]
async fn final_decision_fails_open_to_the_dashboard() {
    let gateway = Arc::new(MockGateway::default());
    gateway.script_decision(Err(GatewayError::Server {
        status: 503,
        detail: "decision service unavailable".to_string(),
    }));
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;

    advance_to_liveness(&ctl).await;
    let cancel = CancelToken::never();
    for _ in 0..3 {
        ctl.run_liveness_step(&mut SteadyFrames, &cancel)
            .await
            .unwrap();
    }

    // The gateway error does not strand the user mid-flow.
    let status = ctl.finalize().await.unwrap();
    assert_eq!(status, KycStatus::Failed);
    assert_eq!(ctl.current_step().await, WorkflowStep::Dashboard);
    assert_eq!(ctl.session().await.kyc_status, Some(KycStatus::Failed));
}

#[tokio::test]
async fn missing_identity_redirects_to_registration() {
    let gateway = Arc::new(MockGateway::default());
    let store = fresh_store().await;
    let ctl = controller(Arc::clone(&gateway), Arc::clone(&store)).await;
    ctl.register(profile()).await.unwrap();

    // The session is cleared underneath the controller.
    store.reset().await.unwrap();

    let err = ctl
        .upload_document(Some(&jpeg("front.jpg")), Some(&jpeg("back.jpg")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Workflow(WorkflowError::NotAuthenticated)
    ));
    assert_eq!(ctl.current_step().await, WorkflowStep::Registration);
}

#[tokio::test]
async fn logout_clears_session_and_restarts() {
    let gateway = Arc::new(MockGateway::default());
    let store = fresh_store().await;
    let ctl = controller(Arc::clone(&gateway), Arc::clone(&store)).await;

    advance_to_liveness(&ctl).await;
    ctl.logout().await.unwrap();

    assert_eq!(ctl.current_step().await, WorkflowStep::Registration);
    assert!(!ctl.session().await.is_authenticated());
    assert_eq!(ctl.current_challenge(), Some(ChallengeAction::Blink));
}

#[tokio::test]
async fn reload_resumes_at_the_persisted_step() {
    let gateway = Arc::new(MockGateway::default());
    let backend = Arc::new(MemoryBackend::default());

    {
        let store = Arc::new(
            SessionStore::load(Arc::clone(&backend) as Arc<dyn StorageBackend>)
                .await
                .unwrap(),
        );
        let ctl = controller(Arc::clone(&gateway), store).await;
        ctl.register(profile()).await.unwrap();
        ctl.upload_document(Some(&jpeg("front.jpg")), Some(&jpeg("back.jpg")))
            .await
            .unwrap();
    }

    // A fresh controller over the same backend resumes at review; the
    // uploaded extraction survives the reload.
    let store = Arc::new(
        SessionStore::load(backend as Arc<dyn StorageBackend>)
            .await
            .unwrap(),
    );
    let ctl = controller(Arc::clone(&gateway), store).await;
    assert_eq!(ctl.current_step().await, WorkflowStep::OcrReview);
    assert_eq!(ctl.session().await.ocr_result, Some(ocr()));

    // And the flow continues from there.
    ctl.confirm_ocr().await.unwrap();
    assert_eq!(ctl.current_step().await, WorkflowStep::SelfieCapture);
}

#[tokio::test]
async fn dashboard_refresh_pulls_the_authoritative_status() {
    let gateway = Arc::new(MockGateway::default());
    gateway.script_decision(Ok(FinalDecision {
        final_status: KycStatus::ManualReview,
        reason: Some("name mismatch below threshold".to_string()),
        metrics: None,
    }));
    let ctl = controller(Arc::clone(&gateway), fresh_store().await).await;

    advance_to_liveness(&ctl).await;
    let cancel = CancelToken::never();
    for _ in 0..3 {
        ctl.run_liveness_step(&mut SteadyFrames, &cancel)
            .await
            .unwrap();
    }
    assert_eq!(ctl.finalize().await.unwrap(), KycStatus::ManualReview);

    // The review has since concluded server-side.
    let refreshed = ctl.refresh_status().await.unwrap();
    assert_eq!(refreshed, KycStatus::Verified);
    assert_eq!(ctl.session().await.kyc_status, Some(KycStatus::Verified));
}
