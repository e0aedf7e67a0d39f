//! Error types for the intake service.

/// Top-level error type for the submission pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Attachment error: {0}")]
    Attachment(#[from] AttachmentError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Form-field validation errors. Resolved before any side effect occurs.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field: {0}")]
    InvalidField(String),

    #[error("Malformed form payload: {0}")]
    MalformedPayload(String),
}

/// Attachment staging errors. Resolved before any transport call.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("Unsupported attachment type: {0} (only PDF or DOCX allowed)")]
    UnsupportedType(String),

    #[error("Attachment too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("Failed to stage attachment: {0}")]
    Storage(String),
}

/// Mail delivery errors. Terminal per submission — no retry.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Mail transport rejected the message: {0}")]
    TransportRejected(String),

    #[error("Network failure during delivery: {0}")]
    NetworkFailure(String),

    #[error("Invalid mail address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build outbound message: {0}")]
    Build(String),
}

/// Cleanup failure for a staged attachment.
///
/// Never surfaces to the caller — the email may already be sent by the time
/// cleanup runs, so this is logged and dropped.
#[derive(Debug, thiserror::Error)]
#[error("Failed to remove staged attachment at {}: {source}", .path.display())]
pub struct CleanupError {
    pub path: std::path::PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Result type alias for the intake service.
pub type Result<T> = std::result::Result<T, Error>;
