// Error types for the ingestion pipeline

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that can occur while ingesting a session
///
/// Malformed and Validation are caller errors: terminal, no retry, no partial write.
/// Everything else is a collaborator failure that aborts the session at the step
/// where it happened.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Payload could not be parsed at all
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Payload parsed but its content is invalid
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// IP geolocation lookup failed
    #[error("Geolocation error: {0}")]
    Geolocation(String),

    /// Deobfuscation round trip failed
    #[error("Symbolication error: {0}")]
    Symbolication(String),

    /// Attachment upload failed
    #[error("Attachment error: {0}")]
    Attachment(String),

    /// Relational store error
    #[error("Store error: {0}")]
    Store(String),

    /// Columnar store write failed
    #[error("Columnar store error: {0}")]
    Columnar(String),

    /// Group store failed during bucketing
    #[error("Grouping error: {0}")]
    Grouping(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IngestError {
    /// Create a malformed payload error
    pub fn malformed(msg: impl Into<String>) -> Self {
        IngestError::Malformed(msg.into())
    }

    /// Create a geolocation error
    pub fn geolocation(msg: impl Into<String>) -> Self {
        IngestError::Geolocation(msg.into())
    }

    /// Create a symbolication error
    pub fn symbolication(msg: impl Into<String>) -> Self {
        IngestError::Symbolication(msg.into())
    }

    /// Create an attachment error
    pub fn attachment(msg: impl Into<String>) -> Self {
        IngestError::Attachment(msg.into())
    }

    /// Create a relational store error
    pub fn store(msg: impl Into<String>) -> Self {
        IngestError::Store(msg.into())
    }

    /// Create a columnar store error
    pub fn columnar(msg: impl Into<String>) -> Self {
        IngestError::Columnar(msg.into())
    }

    /// Create a grouping error
    pub fn grouping(msg: impl Into<String>) -> Self {
        IngestError::Grouping(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        IngestError::Configuration(msg.into())
    }

    /// True for errors caused by the submitted payload rather than a collaborator
    pub fn is_client_error(&self) -> bool {
        matches!(self, IngestError::Malformed(_) | IngestError::Validation(_))
    }

    /// Generic, caller-safe description of the failure category
    pub fn category(&self) -> &'static str {
        match self {
            IngestError::Malformed(_) => "failed to parse session payload",
            IngestError::Validation(_) => "session validation failed",
            IngestError::Geolocation(_) => "failed to lookup country by IP",
            IngestError::Symbolication(_) => "failed to symbolicate",
            IngestError::Attachment(_) => "failed to upload attachment(s)",
            IngestError::Store(_) => "failed to save session",
            IngestError::Columnar(_) => "failed to save session events",
            IngestError::Grouping(_) => "failed to group session issues",
            IngestError::Configuration(_) | IngestError::Internal(_) => "failed to ingest session",
        }
    }
}
