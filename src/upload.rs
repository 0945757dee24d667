//! UploadManager — validates and ships document/selfie payloads.
//!
//! Packaging is single-shot multipart; inputs are photographs, so there is
//! no chunking or resumability. Local preconditions are checked before any
//! network call, and a failed call never mutates stored session fields.

use std::sync::Arc;

use crate::error::{Error, ValidationError};
use crate::gateway::VerificationGateway;
use crate::session::model::OcrResult;

/// Maximum accepted image size, matching the gateway's own limit.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ACCEPTED_MIME_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// An image destined for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn jpeg(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: "image/jpeg".to_string(),
            bytes,
        }
    }

    pub fn png(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: "image/png".to_string(),
            bytes,
        }
    }
}

fn validate_image(image: &ImagePayload) -> Result<(), ValidationError> {
    if !ACCEPTED_MIME_TYPES.contains(&image.mime_type.as_str()) {
        return Err(ValidationError::UnsupportedImageType {
            name: image.file_name.clone(),
            mime: image.mime_type.clone(),
        });
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(ValidationError::ImageTooLarge {
            name: image.file_name.clone(),
            size: image.bytes.len(),
            max: MAX_IMAGE_BYTES,
        });
    }
    Ok(())
}

/// Validates and ships document and selfie payloads via the gateway.
pub struct UploadManager {
    gateway: Arc<dyn VerificationGateway>,
}

impl UploadManager {
    pub fn new(gateway: Arc<dyn VerificationGateway>) -> Self {
        Self { gateway }
    }

    /// Upload both document sides and return the OCR extraction.
    ///
    /// Both images must be present and locally valid; a missing side is a
    /// [`ValidationError`] rejected without contacting the gateway.
    pub async fn upload_document(
        &self,
        user_id: &str,
        front: Option<&ImagePayload>,
        back: Option<&ImagePayload>,
    ) -> Result<OcrResult, Error> {
        let front = front.ok_or(ValidationError::MissingDocumentSide { side: "front" })?;
        let back = back.ok_or(ValidationError::MissingDocumentSide { side: "back" })?;
        validate_image(front)?;
        validate_image(back)?;

        let ocr = self.gateway.upload_document(user_id, front, back).await?;
        tracing::info!(
            user_id,
            confidence = ocr.confidence,
            "Document uploaded; OCR extracted"
        );
        Ok(ocr)
    }

    /// Upload the selfie and wait for the acknowledgement.
    pub async fn upload_selfie(&self, user_id: &str, image: &ImagePayload) -> Result<(), Error> {
        validate_image(image)?;
        self.gateway.capture_selfie(user_id, image).await?;
        tracing::info!(user_id, "Selfie accepted by gateway");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::capture::{ChallengeAction, Frame};
    use crate::error::GatewayError;
    use crate::gateway::{FinalDecision, LivenessOutcome, UserIdentity};
    use crate::session::model::{KycStatus, Profile, Similarity};

    /// Panics on any call: validation failures must never reach the wire.
    struct UnreachableGateway;

    #[async_trait]
    impl VerificationGateway for UnreachableGateway {
        async fn register_user(&self, _: &Profile) -> Result<UserIdentity, GatewayError> {
            unreachable!("gateway must not be contacted")
        }
        async fn login_user(&self, _: &str, _: &str) -> Result<UserIdentity, GatewayError> {
            unreachable!("gateway must not be contacted")
        }
        async fn upload_document(
            &self,
            _: &str,
            _: &ImagePayload,
            _: &ImagePayload,
        ) -> Result<OcrResult, GatewayError> {
            unreachable!("gateway must not be contacted")
        }
        async fn fetch_ocr_result(&self, _: &str) -> Result<OcrResult, GatewayError> {
            unreachable!("gateway must not be contacted")
        }
        async fn capture_selfie(&self, _: &str, _: &ImagePayload) -> Result<(), GatewayError> {
            unreachable!("gateway must not be contacted")
        }
        async fn submit_liveness_step(
            &self,
            _: &str,
            _: ChallengeAction,
            _: &[Frame],
        ) -> Result<LivenessOutcome, GatewayError> {
            unreachable!("gateway must not be contacted")
        }
        async fn run_face_match(&self, _: &str) -> Result<Similarity, GatewayError> {
            unreachable!("gateway must not be contacted")
        }
        async fn run_final_decision(&self, _: &str) -> Result<FinalDecision, GatewayError> {
            unreachable!("gateway must not be contacted")
        }
        async fn fetch_profile(&self, _: &str) -> Result<Profile, GatewayError> {
            unreachable!("gateway must not be contacted")
        }
        async fn fetch_kyc_status(&self, _: &str) -> Result<KycStatus, GatewayError> {
            unreachable!("gateway must not be contacted")
        }
    }

    fn manager() -> UploadManager {
        UploadManager::new(Arc::new(UnreachableGateway))
    }

    fn jpeg(name: &str) -> ImagePayload {
        ImagePayload::jpeg(name, vec![0xFF, 0xD8, 0xFF])
    }

    #[tokio::test]
    async fn missing_front_is_rejected_locally() {
        let err = manager()
            .upload_document("u1", None, Some(&jpeg("back.jpg")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingDocumentSide { side: "front" })
        ));
    }

    #[tokio::test]
    async fn missing_back_is_rejected_locally() {
        let err = manager()
            .upload_document("u1", Some(&jpeg("front.jpg")), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingDocumentSide { side: "back" })
        ));
    }

    #[tokio::test]
    async fn unsupported_mime_is_rejected_locally() {
        let mut gif = jpeg("anim.gif");
        gif.mime_type = "image/gif".to_string();
        let err = manager()
            .upload_document("u1", Some(&gif), Some(&jpeg("back.jpg")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnsupportedImageType { .. })
        ));
    }

    #[tokio::test]
    async fn oversized_image_is_rejected_locally() {
        let huge = ImagePayload::png("huge.png", vec![0u8; MAX_IMAGE_BYTES + 1]);
        let err = manager().upload_selfie("u1", &huge).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::ImageTooLarge { .. })
        ));
    }
}
