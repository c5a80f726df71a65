// In-memory implementations for testing
//
// These implementations keep all data in memory, making them useful for:
// - Unit and integration tests of the pipeline
// - Running the server without external collaborators
//
// Stores that can fail expose `fail_next(n)`: the next `n` operations return an error.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::grouping::{GroupKind, IssueGroup, NewIssueGroup};
use crate::resource::Resource;
use crate::session::{Attachment, Session};
use crate::symbolication::{SymbolicationRequest, SymbolicationUnit};
use crate::traits::{AttachmentStore, Deobfuscator, EventSink, GeoLocator, GroupStore, SessionStore};

/// Countdown of operations that should fail
#[derive(Debug, Default, Clone)]
struct FailureBudget {
    remaining: Arc<RwLock<usize>>,
}

impl FailureBudget {
    async fn arm(&self, count: usize) {
        *self.remaining.write().await = count;
    }

    /// Consume one failure if any are armed
    async fn take(&self) -> bool {
        let mut remaining = self.remaining.write().await;
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }
}

// ============================================================================
// InMemorySessionStore - Stores sessions in memory
// ============================================================================

/// A session as persisted by the in-memory store
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub session: Session,
    pub bytes_in: u64,
}

/// In-memory session store
///
/// Sessions are keyed by (application ID, session ID).
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<(Uuid, Uuid), StoredSession>>>,
    mappings: Arc<RwLock<HashMap<(Uuid, String, String, String), String>>>,
    onboarded: Arc<RwLock<HashSet<Uuid>>>,
    failures: FailureBudget,
}

impl InMemorySessionStore {
    /// Create a new in-memory session store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapping file for an app build
    pub async fn add_mapping(
        &self,
        app_id: Uuid,
        app_unique_id: &str,
        version_name: &str,
        version_code: &str,
        key: impl Into<String>,
    ) {
        self.mappings.write().await.insert(
            (
                app_id,
                app_unique_id.to_string(),
                version_name.to_string(),
                version_code.to_string(),
            ),
            key.into(),
        );
    }

    /// Get a stored session
    pub async fn get(&self, app_id: Uuid, session_id: Uuid) -> Option<StoredSession> {
        self.sessions.read().await.get(&(app_id, session_id)).cloned()
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_onboarded(&self, app_id: Uuid) -> bool {
        self.onboarded.read().await.contains(&app_id)
    }

    /// Make the next `count` operations fail
    pub async fn fail_next(&self, count: usize) {
        self.failures.arm(count).await;
    }

    async fn check(&self) -> Result<()> {
        if self.failures.take().await {
            return Err(IngestError::store("in-memory session store failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn session_exists(&self, session_id: Uuid, app_id: Uuid) -> Result<bool> {
        self.check().await?;
        Ok(self.sessions.read().await.contains_key(&(app_id, session_id)))
    }

    async fn mapping_key(&self, app_id: Uuid, resource: &Resource) -> Result<Option<String>> {
        self.check().await?;
        let (unique_id, version_name, version_code) = resource.mapping_lookup();
        let key = (
            app_id,
            unique_id.to_string(),
            version_name.to_string(),
            version_code.to_string(),
        );
        Ok(self.mappings.read().await.get(&key).cloned())
    }

    async fn save_session(&self, session: &Session, bytes_in: u64) -> Result<bool> {
        self.check().await?;
        let mut sessions = self.sessions.write().await;
        let key = (session.app_id, session.session_id);
        if sessions.contains_key(&key) {
            return Ok(false);
        }
        sessions.insert(
            key,
            StoredSession {
                session: session.clone(),
                bytes_in,
            },
        );
        self.onboarded.write().await.insert(session.app_id);
        Ok(true)
    }
}

// ============================================================================
// InMemoryEventSink - Collects event rows in memory
// ============================================================================

/// In-memory event sink
///
/// Keeps every inserted batch. Re-inserting a session appends its rows again, the
/// way an append-only columnar table would before background deduplication.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventSink {
    batches: Arc<RwLock<Vec<Session>>>,
    failures: FailureBudget,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of inserted batches
    pub async fn batch_count(&self) -> usize {
        self.batches.read().await.len()
    }

    /// Every inserted event, in insertion order
    pub async fn events(&self) -> Vec<crate::event::Event> {
        self.batches
            .read()
            .await
            .iter()
            .flat_map(|s| s.events.iter().cloned())
            .collect()
    }

    /// Make the next `count` inserts fail
    pub async fn fail_next(&self, count: usize) {
        self.failures.arm(count).await;
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn insert_events(&self, session: &Session) -> Result<()> {
        if self.failures.take().await {
            return Err(IngestError::columnar("in-memory event sink failure"));
        }
        self.batches.write().await.push(session.clone());
        Ok(())
    }
}

// ============================================================================
// InMemoryGroupStore - Stores issue groups in memory
// ============================================================================

/// In-memory group store
///
/// Groups are kept per (application ID, kind) in creation order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryGroupStore {
    groups: Arc<RwLock<HashMap<(Uuid, GroupKind), Vec<IssueGroup>>>>,
    failures: FailureBudget,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All groups of one kind for an application, oldest first
    pub async fn groups(&self, app_id: Uuid, kind: GroupKind) -> Vec<IssueGroup> {
        self.groups
            .read()
            .await
            .get(&(app_id, kind))
            .cloned()
            .unwrap_or_default()
    }

    /// Make the next `count` operations fail
    pub async fn fail_next(&self, count: usize) {
        self.failures.arm(count).await;
    }

    async fn check(&self) -> Result<()> {
        if self.failures.take().await {
            return Err(IngestError::store("in-memory group store failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl GroupStore for InMemoryGroupStore {
    async fn list_groups(
        &self,
        app_id: Uuid,
        kind: GroupKind,
        app_version: Option<&str>,
    ) -> Result<Vec<IssueGroup>> {
        self.check().await?;
        Ok(self
            .groups(app_id, kind)
            .await
            .into_iter()
            .filter(|g| app_version.map_or(true, |v| g.app_version == v))
            .collect())
    }

    async fn create_group(&self, group: NewIssueGroup) -> Result<IssueGroup> {
        self.check().await?;
        let now = Utc::now();
        let created = IssueGroup {
            id: Uuid::now_v7(),
            app_id: group.app_id,
            app_version: group.app_version,
            name: group.name,
            fingerprint: group.fingerprint,
            event_ids: group.event_ids,
            created_at: now,
            updated_at: now,
        };
        self.groups
            .write()
            .await
            .entry((group.app_id, group.kind))
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn append_event(&self, kind: GroupKind, group_id: Uuid, event_id: Uuid) -> Result<bool> {
        self.check().await?;
        let mut groups = self.groups.write().await;
        let group = groups
            .iter_mut()
            .filter(|((_, k), _)| *k == kind)
            .flat_map(|(_, list)| list.iter_mut())
            .find(|g| g.id == group_id)
            .ok_or_else(|| IngestError::store(format!("{kind} group {group_id} not found")))?;

        if group.contains(event_id) {
            return Ok(false);
        }
        group.event_ids.push(event_id);
        group.updated_at = Utc::now();
        Ok(true)
    }
}

// ============================================================================
// InMemoryAttachmentStore - Stores blobs in memory
// ============================================================================

/// In-memory attachment store
#[derive(Debug, Default, Clone)]
pub struct InMemoryAttachmentStore {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    failures: FailureBudget,
}

impl InMemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored blob for a key
    pub async fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Make the next `count` uploads fail
    pub async fn fail_next(&self, count: usize) {
        self.failures.arm(count).await;
    }
}

#[async_trait]
impl AttachmentStore for InMemoryAttachmentStore {
    async fn upload(&self, attachment: &Attachment) -> Result<String> {
        if self.failures.take().await {
            return Err(IngestError::attachment("in-memory attachment store failure"));
        }
        self.objects
            .write()
            .await
            .insert(attachment.key.clone(), attachment.blob.clone());
        Ok(format!("memory://attachments/{}", attachment.key))
    }
}

// ============================================================================
// StaticGeoLocator - Fixed IP to country table
// ============================================================================

/// Geolocator answering from a fixed table
#[derive(Debug, Default, Clone)]
pub struct StaticGeoLocator {
    countries: Arc<RwLock<HashMap<IpAddr, String>>>,
    calls: Arc<RwLock<Vec<IpAddr>>>,
    failures: FailureBudget,
}

impl StaticGeoLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `country` for `ip`
    pub async fn insert(&self, ip: IpAddr, country: impl Into<String>) {
        self.countries.write().await.insert(ip, country.into());
    }

    /// Addresses that were looked up
    pub async fn calls(&self) -> Vec<IpAddr> {
        self.calls.read().await.clone()
    }

    /// Make the next `count` lookups fail
    pub async fn fail_next(&self, count: usize) {
        self.failures.arm(count).await;
    }
}

#[async_trait]
impl GeoLocator for StaticGeoLocator {
    async fn lookup_country(&self, ip: IpAddr) -> Result<Option<String>> {
        self.calls.write().await.push(ip);
        if self.failures.take().await {
            return Err(IngestError::geolocation("static geolocator failure"));
        }
        Ok(self.countries.read().await.get(&ip).cloned())
    }
}

// ============================================================================
// MockDeobfuscator - Substring replacement
// ============================================================================

/// Deobfuscator that applies fixed substring replacements to every value
#[derive(Debug, Default, Clone)]
pub struct MockDeobfuscator {
    mappings: Vec<(String, String)>,
    failing: bool,
    requests: Arc<RwLock<Vec<SymbolicationRequest>>>,
}

impl MockDeobfuscator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deobfuscator that rejects every request
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Replace `obfuscated` with `original`, applied in insertion order
    pub fn with_mapping(mut self, obfuscated: impl Into<String>, original: impl Into<String>) -> Self {
        self.mappings.push((obfuscated.into(), original.into()));
        self
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<SymbolicationRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl Deobfuscator for MockDeobfuscator {
    async fn deobfuscate(&self, request: &SymbolicationRequest) -> Result<Vec<SymbolicationUnit>> {
        self.requests.write().await.push(request.clone());
        if self.failing {
            return Err(IngestError::symbolication("mapping service unavailable"));
        }
        Ok(request
            .data
            .iter()
            .map(|unit| SymbolicationUnit {
                id: unit.id,
                values: unit
                    .values
                    .iter()
                    .map(|value| {
                        self.mappings
                            .iter()
                            .fold(value.clone(), |acc, (from, to)| acc.replace(from, to))
                    })
                    .collect(),
            })
            .collect())
    }
}
