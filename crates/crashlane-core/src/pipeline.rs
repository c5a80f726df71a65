// Ingestion pipeline
//
// One session moves through a strictly sequential state machine:
//
//   received -> validated -> dedup-checked -> geolocated -> (symbolicated)
//     -> (attachments uploaded) -> columnar rows written -> session row written -> (grouped)
//
// Nothing is written before every fallible transform has succeeded. Event rows are
// written before the session row, so a failure between the two leaves event rows
// behind and a retry appends them again. Grouping runs last, after durability; its
// failure fails the request without unwinding storage.

use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::GroupingConfig;
use crate::error::{IngestError, Result};
use crate::fingerprint::apply_fingerprints;
use crate::geo::{is_bogon, resolve_country, BOGON, NOT_AVAILABLE};
use crate::grouping::{Assignment, Bucketer};
use crate::session::Session;
use crate::symbolication::{needs_symbolication, symbolicate};
use crate::traits::{AttachmentStore, Deobfuscator, EventSink, GeoLocator, GroupStore, SessionStore};
use crate::validation::validate_session;

/// Parse a session document, stamping the application id from outside the body
pub fn parse_session(body: &[u8], app_id: Uuid) -> Result<Session> {
    let mut session: Session =
        serde_json::from_slice(body).map_err(|e| IngestError::malformed(e.to_string()))?;
    session.app_id = app_id;
    Ok(session)
}

/// One inbound session submission
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub session: Session,
    pub client_ip: Option<IpAddr>,
    /// Size of the request body in bytes
    pub bytes_in: u64,
}

/// Successful pipeline outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New data was persisted
    Accepted {
        session_id: Uuid,
        event_count: usize,
        assignments: Vec<Assignment>,
    },
    /// The session id was already known for this application; nothing was written
    AlreadyAccepted { session_id: Uuid },
}

impl IngestOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestOutcome::AlreadyAccepted { .. })
    }
}

/// Orchestrates one session through validation, enrichment, persistence and grouping
pub struct IngestPipeline {
    sessions: Arc<dyn SessionStore>,
    events: Arc<dyn EventSink>,
    bucketer: Bucketer,
    attachments: Option<Arc<dyn AttachmentStore>>,
    geolocator: Option<Arc<dyn GeoLocator>>,
    deobfuscator: Option<Arc<dyn Deobfuscator>>,
}

impl IngestPipeline {
    /// Create a pipeline with the required stores and no optional collaborators
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        events: Arc<dyn EventSink>,
        groups: Arc<dyn GroupStore>,
        grouping: GroupingConfig,
    ) -> Self {
        Self {
            sessions,
            events,
            bucketer: Bucketer::new(groups, grouping),
            attachments: None,
            geolocator: None,
            deobfuscator: None,
        }
    }

    pub fn with_attachment_store(mut self, store: Arc<dyn AttachmentStore>) -> Self {
        self.attachments = Some(store);
        self
    }

    pub fn with_geolocator(mut self, geolocator: Arc<dyn GeoLocator>) -> Self {
        self.geolocator = Some(geolocator);
        self
    }

    pub fn with_deobfuscator(mut self, deobfuscator: Arc<dyn Deobfuscator>) -> Self {
        self.deobfuscator = Some(deobfuscator);
        self
    }

    pub fn grouping_config(&self) -> &GroupingConfig {
        self.bucketer.config()
    }

    /// Run a session through the whole pipeline
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome> {
        let IngestRequest {
            mut session,
            client_ip,
            bytes_in,
        } = request;
        let session_id = session.session_id;
        let app_id = session.app_id;

        info!(
            session_id = %session_id,
            app_id = %app_id,
            events = session.events.len(),
            attachments = session.attachments.len(),
            "ingesting session"
        );

        session.trim();
        if let Err(e) = validate_session(&session) {
            warn!(session_id = %session_id, field = %e.field, error = %e, "session validation failed");
            return Err(e.into());
        }

        if self
            .sessions
            .session_exists(session_id, app_id)
            .await
            .inspect_err(|e| error!(session_id = %session_id, error = %e, "failed to check session"))?
        {
            info!(session_id = %session_id, app_id = %app_id, "session already accepted");
            return Ok(IngestOutcome::AlreadyAccepted { session_id });
        }

        if let Some(ip) = client_ip {
            self.geolocate(&mut session, ip)
                .await
                .inspect_err(|e| error!(session_id = %session_id, error = %e, "failed to lookup country by IP"))?;
        }

        if needs_symbolication(&session) {
            self.symbolicate(&mut session)
                .await
                .inspect_err(|e| error!(session_id = %session_id, error = %e, "failed to symbolicate"))?;
        }

        if session.has_attachments() {
            self.upload_attachments(&mut session)
                .await
                .inspect_err(|e| error!(session_id = %session_id, error = %e, "failed to upload attachments"))?;
        }

        session.assign_event_ids();
        apply_fingerprints(&mut session);

        if session.events.is_empty() {
            debug!(session_id = %session_id, "no events, skipping columnar insert");
        } else {
            self.events
                .insert_events(&session)
                .await
                .inspect_err(|e| error!(session_id = %session_id, error = %e, "failed to insert events"))?;
        }

        let inserted = self
            .sessions
            .save_session(&session, bytes_in)
            .await
            .inspect_err(|e| error!(session_id = %session_id, error = %e, "failed to save session"))?;
        if !inserted {
            // lost the race against a concurrent delivery of the same session
            warn!(session_id = %session_id, app_id = %app_id, "session row already present, skipping grouping");
            return Ok(IngestOutcome::AlreadyAccepted { session_id });
        }

        let assignments = if session.has_unhandled_exceptions() || session.has_anrs() {
            self.bucketer
                .bucket_session(&session)
                .await
                .inspect_err(|e| error!(session_id = %session_id, error = %e, "failed to group session issues"))?
        } else {
            Vec::new()
        };

        info!(
            session_id = %session_id,
            app_id = %app_id,
            groups_touched = assignments.len(),
            "session accepted"
        );

        Ok(IngestOutcome::Accepted {
            session_id,
            event_count: session.events.len(),
            assignments,
        })
    }

    async fn geolocate(&self, session: &mut Session, ip: IpAddr) -> Result<()> {
        session.record_client_ip(ip);
        let country = match &self.geolocator {
            Some(geolocator) => resolve_country(ip, geolocator.as_ref()).await?,
            None if is_bogon(ip) => BOGON.to_string(),
            None => NOT_AVAILABLE.to_string(),
        };
        debug!(session_id = %session.session_id, country = %country, "resolved client country");
        session.inet.country_code = country;
        Ok(())
    }

    async fn symbolicate(&self, session: &mut Session) -> Result<()> {
        let Some(deobfuscator) = &self.deobfuscator else {
            debug!(session_id = %session.session_id, "no deobfuscator configured, skipping symbolication");
            return Ok(());
        };

        let Some(key) = self
            .sessions
            .mapping_key(session.app_id, &session.resource)
            .await?
        else {
            debug!(
                session_id = %session.session_id,
                app_version = %session.resource.app_version,
                app_build = %session.resource.app_build,
                "no mapping file for build, skipping symbolication"
            );
            return Ok(());
        };

        symbolicate(session, &key, deobfuscator.as_ref()).await
    }

    async fn upload_attachments(&self, session: &mut Session) -> Result<()> {
        let Some(store) = &self.attachments else {
            return Err(IngestError::attachment("no attachment store configured"));
        };

        for attachment in &mut session.attachments {
            attachment.key = attachment.object_key();
            attachment.location = store.upload(attachment).await?;
            debug!(
                session_id = %session.session_id,
                attachment_id = %attachment.id,
                location = %attachment.location,
                "uploaded attachment"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_sets_app_id() {
        let app_id = Uuid::now_v7();
        let body = br#"{"session_id": "0191b8f2-7c1e-7a00-8000-000000000001", "events": []}"#;
        let session = parse_session(body, app_id).unwrap();
        assert_eq!(session.app_id, app_id);
        assert!(session.events.is_empty());
    }

    #[test]
    fn test_parse_session_malformed() {
        let err = parse_session(b"{not json", Uuid::nil()).unwrap_err();
        assert!(matches!(err, IngestError::Malformed(_)));
        assert!(err.is_client_error());

        // events is required
        let err = parse_session(br#"{"session_id": "0191b8f2-7c1e-7a00-8000-000000000001"}"#, Uuid::nil())
            .unwrap_err();
        assert!(matches!(err, IngestError::Malformed(_)));
    }

    #[test]
    fn test_parse_session_ignores_body_app_id() {
        let app_id = Uuid::now_v7();
        let body = br#"{"session_id": "0191b8f2-7c1e-7a00-8000-000000000001", "app_id": "0191b8f2-7c1e-7a00-8000-0000000000ff", "events": []}"#;
        assert_eq!(parse_session(body, app_id).unwrap().app_id, app_id);
    }
}
