// Core traits for pluggable backends
//
// These traits keep the ingestion pipeline independent of its collaborators:
// - In-memory implementations for tests and embedded use
// - Database and HTTP implementations for production

use async_trait::async_trait;
use std::net::IpAddr;
use uuid::Uuid;

use crate::error::Result;
use crate::grouping::{GroupKind, IssueGroup, NewIssueGroup};
use crate::resource::Resource;
use crate::session::{Attachment, Session};
use crate::symbolication::{SymbolicationRequest, SymbolicationUnit};

// ============================================================================
// SessionStore - Relational session records
// ============================================================================

/// Trait for the relational store that owns session identity
///
/// The (session id, application id) pair is unique. A write that collides with an
/// existing record is reported as "not inserted" rather than as an error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Whether a session with this id was already accepted for the application
    async fn session_exists(&self, session_id: Uuid, app_id: Uuid) -> Result<bool>;

    /// Mapping file reference for the resource's app build, if one was uploaded
    async fn mapping_key(&self, app_id: Uuid, resource: &Resource) -> Result<Option<String>>;

    /// Persist the session record with its attachment records in one transaction.
    ///
    /// The first session of an application also marks the application onboarded.
    /// Returns `false` when the session already existed.
    async fn save_session(&self, session: &Session, bytes_in: u64) -> Result<bool>;
}

// ============================================================================
// EventSink - Columnar event rows
// ============================================================================

/// Trait for the columnar store receiving one row per event
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Insert every event of the session as a single batch
    async fn insert_events(&self, session: &Session) -> Result<()>;
}

// ============================================================================
// GroupStore - Issue groups
// ============================================================================

/// Trait for storing exception and ANR groups
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Groups of one kind for an application, oldest first.
    ///
    /// `app_version` narrows the list to groups founded on that version.
    async fn list_groups(
        &self,
        app_id: Uuid,
        kind: GroupKind,
        app_version: Option<&str>,
    ) -> Result<Vec<IssueGroup>>;

    /// Found a new group
    async fn create_group(&self, group: NewIssueGroup) -> Result<IssueGroup>;

    /// Add an event to a group. Returns `false` if it was already a member.
    async fn append_event(&self, kind: GroupKind, group_id: Uuid, event_id: Uuid) -> Result<bool>;
}

// ============================================================================
// AttachmentStore - Blob storage
// ============================================================================

/// Trait for uploading attachment blobs
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Upload the blob under `attachment.key` and return its location
    async fn upload(&self, attachment: &Attachment) -> Result<String>;
}

// ============================================================================
// GeoLocator - IP to country
// ============================================================================

/// Trait for resolving a public IP address to a country code
#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// ISO country code, or `None` when the service has no answer
    async fn lookup_country(&self, ip: IpAddr) -> Result<Option<String>>;
}

// ============================================================================
// Deobfuscator - Symbolication service
// ============================================================================

/// Trait for the external deobfuscation service
#[async_trait]
pub trait Deobfuscator: Send + Sync {
    /// Deobfuscate a batch of units, returning the units it translated
    async fn deobfuscate(&self, request: &SymbolicationRequest) -> Result<Vec<SymbolicationUnit>>;
}
