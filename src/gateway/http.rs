//! reqwest-backed [`VerificationGateway`] implementation.
//!
//! REST paths mirror the verification service; every call carries the
//! configured client-level deadline. Error bodies are mapped onto the
//! structured [`GatewayError`] taxonomy — conflicts arrive as a 409 or a
//! structured `code`, never as a message substring.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::capture::{ChallengeAction, Frame};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::session::model::{KycStatus, OcrResult, Profile, Similarity};
use crate::upload::ImagePayload;

use super::{DecisionMetrics, FinalDecision, LivenessOutcome, UserIdentity, VerificationGateway};

/// Structured error body returned by the verification service.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireIdentity {
    #[serde(alias = "id")]
    user_id: serde_json::Value,
    #[serde(default)]
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct WireUpload {
    ocr_result: OcrResult,
}

#[derive(Debug, Deserialize)]
struct WireLiveness {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct WireDecision {
    final_status: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    metrics: Option<DecisionMetrics>,
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    kyc_status: String,
}

/// The user id is opaque to the client but the service may emit it as a
/// number or a string.
fn id_from_wire(value: serde_json::Value) -> Result<String, GatewayError> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(GatewayError::Decode(format!(
            "unexpected user id shape: {other}"
        ))),
    }
}

fn identity_from_wire(wire: WireIdentity) -> Result<UserIdentity, GatewayError> {
    Ok(UserIdentity {
        user_id: id_from_wire(wire.user_id)?,
        profile: wire.profile,
    })
}

/// Degrade unknown status strings to PENDING rather than guessing at
/// success or failure.
fn status_from_wire(s: &str) -> KycStatus {
    KycStatus::from_wire(s).unwrap_or_else(|| {
        tracing::warn!(status = s, "Unknown KYC status from gateway; treating as PENDING");
        KycStatus::Pending
    })
}

fn image_part(image: &ImagePayload) -> Result<Part, GatewayError> {
    Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(&image.mime_type)
        .map_err(|e| GatewayError::Decode(format!("invalid mime type: {e}")))
}

/// HTTP client for the verification service.
pub struct HttpGateway {
    base_url: String,
    call_deadline: Duration,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.call_deadline)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            call_deadline: config.call_deadline,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Map transport errors and non-success statuses onto [`GatewayError`].
    async fn check(
        &self,
        operation: &'static str,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<reqwest::Response, GatewayError> {
        let resp = result.map_err(|e| {
            if e.is_timeout() {
                GatewayError::DeadlineExceeded {
                    operation,
                    deadline: self.call_deadline,
                }
            } else {
                GatewayError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body: ApiErrorBody = resp.json().await.unwrap_or_default();
        let detail = body.detail.unwrap_or_else(|| status.to_string());

        if status == StatusCode::CONFLICT || body.code.as_deref() == Some("USER_EXISTS") {
            return Err(GatewayError::Conflict {
                code: body.code.unwrap_or_else(|| "CONFLICT".to_string()),
            });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(detail));
        }
        Err(GatewayError::Server {
            status: status.as_u16(),
            detail,
        })
    }

    async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, GatewayError> {
        resp.json().await.map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl VerificationGateway for HttpGateway {
    async fn register_user(&self, profile: &Profile) -> Result<UserIdentity, GatewayError> {
        let result = self
            .client
            .post(self.url("/users/register"))
            .json(profile)
            .send()
            .await;
        let resp = self.check("register_user", result).await?;
        identity_from_wire(Self::parse(resp).await?)
    }

    async fn login_user(&self, email: &str, mobile: &str) -> Result<UserIdentity, GatewayError> {
        let result = self
            .client
            .post(self.url("/users/login"))
            .json(&serde_json::json!({ "email": email, "mobile": mobile }))
            .send()
            .await;
        let resp = self.check("login_user", result).await?;
        identity_from_wire(Self::parse(resp).await?)
    }

    async fn upload_document(
        &self,
        user_id: &str,
        front: &ImagePayload,
        back: &ImagePayload,
    ) -> Result<OcrResult, GatewayError> {
        let form = Form::new()
            .part("front", image_part(front)?)
            .part("back", image_part(back)?);
        let result = self
            .client
            .post(self.url(&format!("/upload/aadhaar/{user_id}")))
            .multipart(form)
            .send()
            .await;
        let resp = self.check("upload_document", result).await?;
        let body: WireUpload = Self::parse(resp).await?;
        Ok(body.ocr_result)
    }

    async fn fetch_ocr_result(&self, user_id: &str) -> Result<OcrResult, GatewayError> {
        let result = self
            .client
            .get(self.url(&format!("/kyc/ocr/{user_id}")))
            .send()
            .await;
        let resp = self.check("fetch_ocr_result", result).await?;
        Self::parse(resp).await
    }

    async fn capture_selfie(
        &self,
        user_id: &str,
        image: &ImagePayload,
    ) -> Result<(), GatewayError> {
        let form = Form::new().part("selfie", image_part(image)?);
        let result = self
            .client
            .post(self.url(&format!("/selfie/capture/{user_id}")))
            .multipart(form)
            .send()
            .await;
        self.check("capture_selfie", result).await?;
        Ok(())
    }

    async fn submit_liveness_step(
        &self,
        user_id: &str,
        action: ChallengeAction,
        frames: &[Frame],
    ) -> Result<LivenessOutcome, GatewayError> {
        let mut form = Form::new();
        for frame in frames {
            let part = Part::bytes(frame.bytes.clone())
                .file_name(frame.file_name.clone())
                .mime_str("image/jpeg")
                .map_err(|e| GatewayError::Decode(format!("invalid mime type: {e}")))?;
            form = form.part("frames", part);
        }
        let result = self
            .client
            .post(self.url(&format!("/liveness/step/{user_id}")))
            .query(&[("action", action.wire_name())])
            .multipart(form)
            .send()
            .await;
        let resp = self.check("submit_liveness_step", result).await?;
        let body: WireLiveness = Self::parse(resp).await?;
        Ok(LivenessOutcome {
            success: body.success,
        })
    }

    async fn run_face_match(&self, user_id: &str) -> Result<Similarity, GatewayError> {
        let result = self
            .client
            .post(self.url(&format!("/kyc/face-match/{user_id}")))
            .send()
            .await;
        let resp = self.check("run_face_match", result).await?;
        Self::parse(resp).await
    }

    async fn run_final_decision(&self, user_id: &str) -> Result<FinalDecision, GatewayError> {
        let result = self
            .client
            .post(self.url(&format!("/kyc/final-decision/{user_id}")))
            .send()
            .await;
        let resp = self.check("run_final_decision", result).await?;
        let body: WireDecision = Self::parse(resp).await?;
        Ok(FinalDecision {
            final_status: status_from_wire(&body.final_status),
            reason: body.reason,
            metrics: body.metrics,
        })
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Profile, GatewayError> {
        let result = self
            .client
            .get(self.url(&format!("/users/{user_id}")))
            .send()
            .await;
        let resp = self.check("fetch_profile", result).await?;
        Self::parse(resp).await
    }

    async fn fetch_kyc_status(&self, user_id: &str) -> Result<KycStatus, GatewayError> {
        let result = self
            .client
            .get(self.url(&format!("/kyc/status/{user_id}")))
            .send()
            .await;
        let resp = self.check("fetch_kyc_status", result).await?;
        let body: WireStatus = Self::parse(resp).await?;
        Ok(status_from_wire(&body.kyc_status))
    }
}
