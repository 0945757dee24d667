//! Error types for the onboarding workflow engine.

use std::time::Duration;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Local input validation failures.
///
/// Raised before any network call leaves the client; always recoverable
/// by the user correcting their input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Missing document image: {side}")]
    MissingDocumentSide { side: &'static str },

    #[error("Unsupported image type {mime} for {name}: only JPEG/PNG accepted")]
    UnsupportedImageType { name: String, mime: String },

    #[error("Image {name} too large: {size} bytes (max {max})")]
    ImageTooLarge {
        name: String,
        size: usize,
        max: usize,
    },
}

/// Errors surfaced by the remote verification gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Duplicate identity at registration, signalled by a structured
    /// conflict code rather than an error-message substring.
    #[error("Conflict: {code}")]
    Conflict { code: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gateway returned {status}: {detail}")]
    Server { status: u16, detail: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gateway call {operation} exceeded deadline of {deadline:?}")]
    DeadlineExceeded {
        operation: &'static str,
        deadline: Duration,
    },

    #[error("Invalid response payload: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether this error signals a duplicate-identity conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Challenge-capture errors. Every variant leaves the engine idle and
/// the current challenge retryable.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Capture burst cancelled")]
    Cancelled,

    #[error("Capture burst exceeded deadline of {deadline:?}")]
    DeadlineExceeded { deadline: Duration },

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Workflow sequencing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Not authenticated: no resolved user id in session")]
    NotAuthenticated,

    #[error("Step {step} is not active (currently at {current})")]
    WrongStep { step: String, current: String },

    #[error("Another operation is already in flight")]
    Busy,

    #[error("Registration rejected: {detail}")]
    RegistrationRejected { detail: String },
}

/// Session persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
