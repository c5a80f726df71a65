// Database-backed SessionStore implementation
//
// This module implements the core SessionStore trait on top of the
// sessions, session_attachments, mapping_files and apps tables.

use async_trait::async_trait;
use crashlane_core::{traits::SessionStore, IngestError, Resource, Result, Session};
use uuid::Uuid;

use crate::models::{CreateAttachmentRow, CreateSessionRow, OnboardApp};
use crate::repositories::Database;

// ============================================================================
// DbSessionStore - Persists session records in the database
// ============================================================================

/// Database-backed session store
///
/// The (id, app_id) primary key on `sessions` decides idempotency: a conflicting
/// insert is reported as "not inserted".
#[derive(Clone)]
pub struct DbSessionStore {
    db: Database,
}

impl DbSessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn session_row(session: &Session, bytes_in: u64) -> CreateSessionRow {
    CreateSessionRow {
        id: session.session_id,
        app_id: session.app_id,
        event_count: i32::try_from(session.events.len()).unwrap_or(i32::MAX),
        attachment_count: i32::try_from(session.attachments.len()).unwrap_or(i32::MAX),
        bytes_in: i64::try_from(bytes_in).unwrap_or(i64::MAX),
        timestamp: session.timestamp,
    }
}

fn attachment_rows(session: &Session) -> Vec<CreateAttachmentRow> {
    session
        .attachments
        .iter()
        .map(|a| CreateAttachmentRow {
            id: a.id,
            name: a.name.clone(),
            extension: a.extension.clone(),
            kind: a.kind.clone(),
            key: a.key.clone(),
            location: a.location.clone(),
            timestamp: a.timestamp,
        })
        .collect()
}

#[async_trait]
impl SessionStore for DbSessionStore {
    async fn session_exists(&self, session_id: Uuid, app_id: Uuid) -> Result<bool> {
        self.db
            .session_exists(session_id, app_id)
            .await
            .map_err(|e| IngestError::store(e.to_string()))
    }

    async fn mapping_key(&self, app_id: Uuid, resource: &Resource) -> Result<Option<String>> {
        let (unique_id, version_name, version_code) = resource.mapping_lookup();
        self.db
            .get_mapping_key(app_id, unique_id, version_name, version_code)
            .await
            .map_err(|e| IngestError::store(e.to_string()))
    }

    async fn save_session(&self, session: &Session, bytes_in: u64) -> Result<bool> {
        let onboard = OnboardApp {
            unique_identifier: session.resource.app_unique_id.clone(),
            platform: session.resource.platform.clone(),
            first_version: session.resource.app_version.clone(),
        };
        self.db
            .insert_session(session_row(session, bytes_in), attachment_rows(session), onboard)
            .await
            .map_err(|e| IngestError::store(e.to_string()))
    }
}

// ============================================================================
// Factory functions
// ============================================================================

/// Create a database-backed session store
pub fn create_db_session_store(db: Database) -> DbSessionStore {
    DbSessionStore::new(db)
}
