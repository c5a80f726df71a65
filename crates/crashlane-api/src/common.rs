// Response DTOs for the public API

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Acknowledgement returned for an accepted session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AcceptedResponse {
    /// "accepted" for new sessions, "accepted, known session" for repeats
    #[schema(example = "accepted")]
    pub ok: String,
}

impl AcceptedResponse {
    pub fn accepted() -> Self {
        Self {
            ok: "accepted".to_string(),
        }
    }

    pub fn known_session() -> Self {
        Self {
            ok: "accepted, known session".to_string(),
        }
    }
}

/// Error body. `details` is only present for problems with the request itself.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "session validation failed")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "`events[].timestamp` is required")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
