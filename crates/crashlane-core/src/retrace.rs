// HTTP client for the retrace (deobfuscation) service

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::symbolication::{SymbolicationRequest, SymbolicationResponse, SymbolicationUnit};
use crate::traits::Deobfuscator;

/// Deobfuscator that POSTs batches to `{origin}/symbolicate`
#[derive(Clone)]
pub struct RetraceClient {
    client: Client,
    api_url: String,
}

impl RetraceClient {
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        Self {
            client: Client::new(),
            api_url: format!("{}/symbolicate", origin.trim_end_matches('/')),
        }
    }

    /// Create from the SYMBOLICATOR_ORIGIN environment variable
    pub fn from_env() -> Result<Self> {
        let origin = std::env::var("SYMBOLICATOR_ORIGIN")
            .map_err(|_| IngestError::config("SYMBOLICATOR_ORIGIN environment variable not set"))?;
        Ok(Self::new(origin))
    }
}

#[async_trait]
impl Deobfuscator for RetraceClient {
    async fn deobfuscate(&self, request: &SymbolicationRequest) -> Result<Vec<SymbolicationUnit>> {
        debug!(session_id = %request.id, units = request.data.len(), "calling retrace service");

        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| IngestError::symbolication(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(IngestError::symbolication(format!(
                "retrace error ({}): {}",
                status, error_text
            )));
        }

        let body: SymbolicationResponse = response
            .json()
            .await
            .map_err(|e| IngestError::symbolication(format!("Failed to parse response: {}", e)))?;
        Ok(body.data)
    }
}
