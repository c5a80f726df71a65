// Issue grouping (bucketing)
//
// Each fingerprinted event is matched against the existing groups of its application
// (optionally narrowed to its app version): the closest group within the configured
// Hamming distance gets the event appended, otherwise a new group is founded with the
// event's fingerprint and signature. Groups are never re-fingerprinted.
//
// Match-or-create is a read followed by a write. Inside one process an async lock per
// (application, kind) serialises it; across processes two writers can still both see
// "no match" and found duplicate groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{GroupingConfig, GroupingScope};
use crate::error::{IngestError, Result};
use crate::event::{CrashPayload, EventPayload};
use crate::fingerprint::{format_fingerprint, hamming_distance, parse_fingerprint};
use crate::session::Session;
use crate::traits::GroupStore;

/// Kind of issue a group tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Exception,
    Anr,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Exception => "exception",
            GroupKind::Anr => "anr",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted cluster of occurrences believed to share one root cause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueGroup {
    pub id: Uuid,
    pub app_id: Uuid,
    pub app_version: String,
    /// Exception or ANR type name of the founding event
    pub name: String,
    /// Lowercase hex fingerprint of the founding event
    pub fingerprint: String,
    pub event_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssueGroup {
    pub fn contains(&self, event_id: Uuid) -> bool {
        self.event_ids.contains(&event_id)
    }
}

/// Input for founding a new group
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssueGroup {
    pub kind: GroupKind,
    pub app_id: Uuid,
    pub app_version: String,
    pub name: String,
    pub fingerprint: String,
    pub event_ids: Vec<Uuid>,
}

/// A fingerprinted event waiting for a group
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub event_id: Uuid,
    pub signature: String,
    pub fingerprint: u64,
}

/// Outcome of bucketing one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// A new group was founded by this event
    Created(Uuid),
    /// The event joined an existing group
    Appended(Uuid),
    /// The event was already a member of the matched group
    Duplicate(Uuid),
}

impl Assignment {
    pub fn group_id(&self) -> Uuid {
        match self {
            Assignment::Created(id) | Assignment::Appended(id) | Assignment::Duplicate(id) => *id,
        }
    }
}

/// Index of the closest group within `max_distance`.
///
/// Groups are expected in creation order; the first group at the minimum distance wins.
/// Groups whose stored fingerprint does not parse are skipped.
pub fn closest_group(groups: &[IssueGroup], fingerprint: u64, max_distance: u32) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, group) in groups.iter().enumerate() {
        let Some(value) = parse_fingerprint(&group.fingerprint) else {
            warn!(group_id = %group.id, "skipping group with unparseable fingerprint");
            continue;
        };
        let distance = hamming_distance(value, fingerprint);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.filter(|(_, d)| *d <= max_distance).map(|(i, _)| i)
}

fn candidate(event_id: Uuid, payload: &impl CrashPayload, kind: GroupKind) -> Result<Option<Candidate>> {
    if payload.fingerprint().is_empty() {
        warn!(event_id = %event_id, kind = %kind, "fingerprint is empty, cannot bucket");
        return Ok(None);
    }
    let fingerprint = parse_fingerprint(payload.fingerprint()).ok_or_else(|| {
        IngestError::grouping(format!(
            "failed to parse fingerprint '{}' for {kind} event {event_id}",
            payload.fingerprint()
        ))
    })?;
    Ok(Some(Candidate {
        event_id,
        signature: payload.signature().to_string(),
        fingerprint,
    }))
}

/// Collect bucketing candidates of one kind from a session, in event order.
///
/// Exceptions contribute only when unhandled.
pub fn candidates(session: &Session, kind: GroupKind) -> Result<Vec<Candidate>> {
    let mut out = Vec::new();
    for event in &session.events {
        let found = match (&event.payload, kind) {
            (EventPayload::Exception { exception }, GroupKind::Exception) if !exception.handled => {
                candidate(event.id, exception, kind)?
            }
            (EventPayload::Anr { anr }, GroupKind::Anr) => candidate(event.id, anr, kind)?,
            _ => None,
        };
        out.extend(found);
    }
    Ok(out)
}

/// Assigns fingerprinted events to issue groups
pub struct Bucketer {
    store: Arc<dyn GroupStore>,
    config: GroupingConfig,
    locks: Mutex<HashMap<(Uuid, GroupKind), Arc<Mutex<()>>>>,
}

impl Bucketer {
    pub fn new(store: Arc<dyn GroupStore>, config: GroupingConfig) -> Self {
        Self {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    async fn lock_for(&self, app_id: Uuid, kind: GroupKind) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry((app_id, kind)).or_default().clone()
    }

    /// Bucket a batch of candidates of one kind, in submission order.
    ///
    /// Any store error aborts the batch; assignments already written stay written.
    pub async fn bucket(
        &self,
        app_id: Uuid,
        app_version: &str,
        kind: GroupKind,
        candidates: &[Candidate],
    ) -> Result<Vec<Assignment>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let lock = if self.config.serialize {
            Some(self.lock_for(app_id, kind).await)
        } else {
            None
        };
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let version_filter = match self.config.scope {
            GroupingScope::App => None,
            GroupingScope::AppVersion => Some(app_version),
        };

        let mut assignments = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let groups = self
                .store
                .list_groups(app_id, kind, version_filter)
                .await
                .map_err(|e| IngestError::grouping(format!("failed to list {kind} groups: {e}")))?;

            let assignment = match closest_group(&groups, candidate.fingerprint, self.config.max_distance) {
                Some(index) => {
                    let group = &groups[index];
                    if group.contains(candidate.event_id) {
                        debug!(group_id = %group.id, event_id = %candidate.event_id, "event already grouped");
                        Assignment::Duplicate(group.id)
                    } else {
                        let appended = self
                            .store
                            .append_event(kind, group.id, candidate.event_id)
                            .await
                            .map_err(|e| {
                                IngestError::grouping(format!("failed to append to {kind} group: {e}"))
                            })?;
                        if appended {
                            Assignment::Appended(group.id)
                        } else {
                            Assignment::Duplicate(group.id)
                        }
                    }
                }
                None => {
                    let group = self
                        .store
                        .create_group(NewIssueGroup {
                            kind,
                            app_id,
                            app_version: app_version.to_string(),
                            name: candidate.signature.clone(),
                            fingerprint: format_fingerprint(candidate.fingerprint),
                            event_ids: vec![candidate.event_id],
                        })
                        .await
                        .map_err(|e| IngestError::grouping(format!("failed to create {kind} group: {e}")))?;
                    info!(
                        group_id = %group.id,
                        app_id = %app_id,
                        kind = %kind,
                        fingerprint = %group.fingerprint,
                        "created issue group"
                    );
                    Assignment::Created(group.id)
                }
            };
            assignments.push(assignment);
        }

        Ok(assignments)
    }

    /// Bucket the unhandled exceptions, then the ANRs, of a persisted session
    pub async fn bucket_session(&self, session: &Session) -> Result<Vec<Assignment>> {
        let mut assignments = Vec::new();
        for kind in [GroupKind::Exception, GroupKind::Anr] {
            let batch = candidates(session, kind)?;
            assignments.extend(
                self.bucket(session.app_id, &session.resource.app_version, kind, &batch)
                    .await?,
            );
        }
        Ok(assignments)
    }
}
