//! Session data model — the artifacts one onboarding attempt accumulates.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

static PAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").expect("valid PAN regex"));
static MOBILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10}$").expect("valid mobile regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Profile fields collected at registration. Read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: String,
    pub pan_number: String,
}

impl Profile {
    /// Validate all fields against the registration schema. Runs locally,
    /// before any network call.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.first_name.trim().len() < 2 {
            return Err(ValidationError::InvalidField {
                field: "first_name",
                reason: "must be at least 2 characters",
            });
        }
        if self.last_name.trim().len() < 2 {
            return Err(ValidationError::InvalidField {
                field: "last_name",
                reason: "must be at least 2 characters",
            });
        }
        if !EMAIL_RE.is_match(&self.email) {
            return Err(ValidationError::InvalidField {
                field: "email",
                reason: "not a valid email address",
            });
        }
        if !MOBILE_RE.is_match(&self.mobile) {
            return Err(ValidationError::InvalidField {
                field: "mobile",
                reason: "must be exactly 10 digits",
            });
        }
        if !PAN_RE.is_match(&self.pan_number) {
            return Err(ValidationError::InvalidField {
                field: "pan_number",
                reason: "invalid PAN format (expected ABCDE1234F)",
            });
        }
        Ok(())
    }
}

/// Identity resolved at registration or login. Immutable until logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: String,
    pub profile: Profile,
}

/// Structured extraction returned by the document OCR step.
///
/// Replaced wholesale on every fetch, never partially merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    /// Masked document number, safe to display.
    #[serde(default)]
    pub aadhaar_number: Option<String>,
    /// Full document number — sensitive, only present when the gateway
    /// chooses to return it.
    #[serde(default)]
    pub aadhaar_full: Option<String>,
    #[serde(alias = "confidence_score")]
    pub confidence: f64,
}

/// Face-match verdict. Set exactly once, after all liveness challenges
/// have passed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    #[serde(alias = "similarity")]
    pub score: f64,
    #[serde(rename = "match")]
    pub is_match: bool,
}

/// Authoritative verification status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    Pending,
    Verified,
    ManualReview,
    OcrFailed,
    LivenessFailed,
    FaceFailed,
    NameFailed,
    Failed,
}

impl KycStatus {
    /// Wire spelling of this status.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
            Self::ManualReview => "MANUAL_REVIEW",
            Self::OcrFailed => "OCR_FAILED",
            Self::LivenessFailed => "LIVENESS_FAILED",
            Self::FaceFailed => "FACE_FAILED",
            Self::NameFailed => "NAME_FAILED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse a wire status string. Returns `None` for anything outside the
    /// known vocabulary; callers decide how to degrade.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "VERIFIED" => Some(Self::Verified),
            "MANUAL_REVIEW" => Some(Self::ManualReview),
            "OCR_FAILED" => Some(Self::OcrFailed),
            "LIVENESS_FAILED" => Some(Self::LivenessFailed),
            "FACE_FAILED" => Some(Self::FaceFailed),
            "NAME_FAILED" => Some(Self::NameFailed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this status is a failure verdict. An explicit enumeration,
    /// not a substring test.
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            Self::OcrFailed
                | Self::LivenessFailed
                | Self::FaceFailed
                | Self::NameFailed
                | Self::Failed
        )
    }
}

impl std::fmt::Display for KycStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

/// One onboarding attempt. Fields fill monotonically forward through the
/// step sequence and are cleared atomically at logout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KycSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_result: Option<OcrResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<Similarity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_status: Option<KycStatus>,
}

impl KycSession {
    /// The resolved user id, if registration or login has completed.
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.user_id.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}
