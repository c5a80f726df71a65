// Columnar event sink over the ClickHouse HTTP interface
//
// All events of a session go out as one INSERT statement. The insert is
// asynchronous on the server side: parse and auth errors come back, buffered
// flush failures do not.

use async_trait::async_trait;
use crashlane_core::{traits::EventSink, IngestError, Result, Session};
use reqwest::Client;

use crate::event_row::{values_tuple, EVENT_COLUMNS};

const DEFAULT_URL: &str = "http://localhost:8123";
const DEFAULT_DATABASE: &str = "default";

/// Connection settings for the ClickHouse HTTP endpoint
#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    pub url: String,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ClickHouseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            database: DEFAULT_DATABASE.to_string(),
            user: None,
            password: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Load from CLICKHOUSE_* environment variables
    pub fn from_env() -> Self {
        let url = std::env::var("CLICKHOUSE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let mut config = Self::new(url);
        if let Ok(database) = std::env::var("CLICKHOUSE_DATABASE") {
            config.database = database;
        }
        config.user = std::env::var("CLICKHOUSE_USER").ok();
        config.password = std::env::var("CLICKHOUSE_PASSWORD").ok();
        config
    }
}

/// EventSink writing one wide row per event into `<database>.events`
#[derive(Clone)]
pub struct ClickHouseSink {
    client: Client,
    config: ClickHouseConfig,
}

impl ClickHouseSink {
    pub fn new(config: ClickHouseConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Build the INSERT statement for every event in the session
    pub fn insert_statement(&self, session: &Session) -> String {
        let columns: Vec<String> = EVENT_COLUMNS.iter().map(|c| format!("`{}`", c)).collect();
        let rows: Vec<String> = session
            .events
            .iter()
            .map(|event| values_tuple(session, event))
            .collect();
        format!(
            "INSERT INTO {}.events ({}) VALUES {}",
            self.config.database,
            columns.join(", "),
            rows.join(", ")
        )
    }
}

#[async_trait]
impl EventSink for ClickHouseSink {
    async fn insert_events(&self, session: &Session) -> Result<()> {
        if session.events.is_empty() {
            return Ok(());
        }

        let mut request = self
            .client
            .post(&self.config.url)
            .query(&[("async_insert", "1"), ("wait_for_async_insert", "0")])
            .body(self.insert_statement(session));
        if let Some(user) = &self.config.user {
            request = request.header("X-ClickHouse-User", user);
        }
        if let Some(password) = &self.config.password {
            request = request.header("X-ClickHouse-Key", password);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IngestError::columnar(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(IngestError::columnar(format!(
                "ClickHouse error ({}): {}",
                status, error_text
            )));
        }

        tracing::debug!(
            session_id = %session.session_id,
            events = session.events.len(),
            "inserted events"
        );
        Ok(())
    }
}
