// Server configuration loaded from the environment

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use crashlane_core::GroupingConfig;
use crashlane_storage::{AttachmentStorageConfig, ClickHouseConfig};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub listen_addr: String,
    /// Example: API_PREFIX="/api" results in routes like /api/v1/apps/{app_id}/sessions
    pub api_prefix: String,
    pub cors_origins: Vec<HeaderValue>,
    pub max_body_bytes: usize,
    pub clickhouse: ClickHouseConfig,
    pub attachments: Option<AttachmentStorageConfig>,
    pub grouping: GroupingConfig,
    /// Run pending migrations on startup
    pub migrate: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;
        let grouping = GroupingConfig::from_env().context("Invalid grouping configuration")?;

        let max_body_bytes = match std::env::var("MAX_BODY_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("MAX_BODY_BYTES must be an integer, got '{raw}'"))?,
            Err(_) => DEFAULT_MAX_BODY_BYTES,
        };

        // Only needed when sessions are sent from browsers on another origin
        let cors_origins: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| s.split(',').filter_map(|s| s.trim().parse().ok()).collect())
            .unwrap_or_default();

        Ok(Self {
            database_url,
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string()),
            api_prefix: std::env::var("API_PREFIX").unwrap_or_default(),
            cors_origins,
            max_body_bytes,
            clickhouse: ClickHouseConfig::from_env(),
            attachments: AttachmentStorageConfig::from_env(),
            grouping,
            migrate: std::env::var("RUN_MIGRATIONS")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
        })
    }
}
