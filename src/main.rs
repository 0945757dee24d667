use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use kyc_onboard::capture::{CancelToken, ChallengeSequence, FrameSource};
use kyc_onboard::config::{CaptureConfig, GatewayConfig};
use kyc_onboard::gateway::HttpGateway;
use kyc_onboard::session::{FileBackend, SessionStore, StorageBackend};
use kyc_onboard::upload::ImagePayload;
use kyc_onboard::workflow::{LivenessProgress, WorkflowController, WorkflowStep};

/// Liveness retry attempts per challenge before giving up.
const MAX_CHALLENGE_RETRIES: u32 = 3;

/// Replays image files from a directory as camera frames, in name order.
struct DirFrameSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl DirFrameSource {
    async fn open(dir: &Path) -> anyhow::Result<Self> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("reading frames dir {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(Self { paths, next: 0 })
    }
}

#[async_trait]
impl FrameSource for DirFrameSource {
    async fn next_frame(&mut self) -> Option<Vec<u8>> {
        // Wrap around so every burst gets frames.
        if self.paths.is_empty() {
            return None;
        }
        let path = &self.paths[self.next % self.paths.len()];
        self.next += 1;
        tokio::fs::read(path).await.ok()
    }
}

async fn load_image(path: &str) -> anyhow::Result<ImagePayload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading image {path}"))?;
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let payload = if path.ends_with(".png") {
        ImagePayload::png(name, bytes)
    } else {
        ImagePayload::jpeg(name, bytes)
    };
    Ok(payload)
}

fn require_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        eprintln!("Error: {key} not set");
        eprintln!("  export {key}=...");
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 5 {
        eprintln!("Usage: {} <front.jpg> <back.jpg> <selfie.jpg> <frames_dir>", args[0]);
        std::process::exit(2);
    }

    let gateway_config = GatewayConfig::from_env();
    let session_path =
        std::env::var("KYC_SESSION_PATH").unwrap_or_else(|_| "./data/kyc-session.json".to_string());

    eprintln!("🪪 KYC Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Gateway: {}", gateway_config.base_url);
    eprintln!("   Session: {session_path}\n");

    let profile = kyc_onboard::session::Profile {
        first_name: require_env("KYC_FIRST_NAME"),
        last_name: require_env("KYC_LAST_NAME"),
        email: require_env("KYC_EMAIL"),
        mobile: require_env("KYC_MOBILE"),
        pan_number: require_env("KYC_PAN"),
    };

    let front = load_image(&args[1]).await?;
    let back = load_image(&args[2]).await?;
    let selfie = load_image(&args[3]).await?;
    let mut frames = DirFrameSource::open(Path::new(&args[4])).await?;

    let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::new(&session_path));
    let store = Arc::new(SessionStore::load(backend).await?);
    let gateway = Arc::new(HttpGateway::new(&gateway_config)?);
    let controller = WorkflowController::new(
        store,
        gateway,
        ChallengeSequence::default(),
        CaptureConfig::default(),
    )
    .await;

    let cancel = CancelToken::never();
    let mut retries_left = MAX_CHALLENGE_RETRIES;

    loop {
        match controller.current_step().await {
            WorkflowStep::Registration => {
                let step = controller.register(profile.clone()).await?;
                eprintln!("   Registered; next step: {step}");
            }
            WorkflowStep::DocumentUpload => {
                let ocr = controller.upload_document(Some(&front), Some(&back)).await?;
                eprintln!(
                    "   Document uploaded (OCR confidence {:.0}%)",
                    ocr.confidence * 100.0
                );
            }
            WorkflowStep::OcrReview => {
                let session = controller.session().await;
                if let Some(ocr) = &session.ocr_result {
                    eprintln!(
                        "   OCR: name={} dob={} number={}",
                        ocr.name.as_deref().unwrap_or("(not detected)"),
                        ocr.dob.as_deref().unwrap_or("(not detected)"),
                        ocr.aadhaar_number.as_deref().unwrap_or("(not detected)"),
                    );
                }
                controller.confirm_ocr().await?;
            }
            WorkflowStep::SelfieCapture => {
                controller.capture_selfie(&selfie).await?;
                eprintln!("   Selfie accepted");
            }
            WorkflowStep::LivenessChallenge => {
                if let Some(challenge) = controller.current_challenge() {
                    eprintln!("   Challenge: {}", challenge.instruction());
                }
                match controller.run_liveness_step(&mut frames, &cancel).await? {
                    LivenessProgress::Busy => {}
                    LivenessProgress::Retry => {
                        retries_left = retries_left.saturating_sub(1);
                        anyhow::ensure!(
                            retries_left > 0,
                            "liveness challenge kept failing; giving up"
                        );
                        eprintln!("   Action not detected, retrying...");
                    }
                    LivenessProgress::NextChallenge(next) => {
                        retries_left = MAX_CHALLENGE_RETRIES;
                        eprintln!("   Passed; next: {}", next.instruction());
                    }
                    LivenessProgress::FaceMatched(similarity) => {
                        eprintln!(
                            "   Liveness complete; face match score {:.2} (match: {})",
                            similarity.score, similarity.is_match
                        );
                    }
                }
            }
            WorkflowStep::FaceMatch => {
                // Only reached when the automatic face match failed.
                let similarity = controller.run_face_match().await?;
                eprintln!("   Face match score {:.2}", similarity.score);
            }
            WorkflowStep::FinalDecision => {
                let status = controller.finalize().await?;
                eprintln!("   Final decision: {status}");
            }
            WorkflowStep::Dashboard => {
                let status = controller.refresh_status().await?;
                let presentation = status.presentation();
                eprintln!("\n   ── {} ──", presentation.label);
                eprintln!("   {}", presentation.message);
                if !presentation.actions.is_empty() {
                    eprintln!("   Available actions: {:?}", presentation.actions);
                }
                break;
            }
        }
    }

    Ok(())
}
