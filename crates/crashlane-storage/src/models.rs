// Database models (internal, may differ from core domain types)

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================
// Session models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub app_id: Uuid,
    pub event_count: i32,
    pub attachment_count: i32,
    pub bytes_in: i64,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateSessionRow {
    pub id: Uuid,
    pub app_id: Uuid,
    pub event_count: i32,
    pub attachment_count: i32,
    pub bytes_in: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AttachmentRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub app_id: Uuid,
    pub name: String,
    pub extension: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub key: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAttachmentRow {
    pub id: Uuid,
    pub name: String,
    pub extension: String,
    pub kind: String,
    pub key: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

/// App details recorded when an application sends its first session
#[derive(Debug, Clone)]
pub struct OnboardApp {
    pub unique_identifier: String,
    pub platform: String,
    pub first_version: String,
}

// ============================================
// Issue group models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct GroupRow {
    pub id: Uuid,
    pub app_id: Uuid,
    pub app_version: String,
    pub name: String,
    pub fingerprint: String,
    pub event_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateGroupRow {
    pub app_id: Uuid,
    pub app_version: String,
    pub name: String,
    pub fingerprint: String,
    pub event_ids: Vec<Uuid>,
}
