// Session domain types
//
// A session is one bounded batch of events from one application instance. The
// client-generated session id is the idempotency key; the application id comes from
// the request path, never from the body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use uuid::Uuid;

use crate::event::{zero_instant, Event};
use crate::resource::Resource;

/// Network origin of a session, filled in by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inet {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub country_code: String,
}

/// Binary blob uploaded alongside a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default = "zero_instant")]
    pub timestamp: DateTime<Utc>,
    /// Raw bytes; base64 on the wire
    #[serde(default, with = "blob")]
    pub blob: Vec<u8>,
    /// Object store key, set before upload
    #[serde(default, skip_deserializing)]
    pub key: String,
    /// Object store location, set after upload
    #[serde(default, skip_deserializing)]
    pub location: String,
}

impl Attachment {
    /// Object key: `<id><extension>`
    pub fn object_key(&self) -> String {
        format!("{}{}", self.id, self.extension)
    }
}

mod blob {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// A session as received over the wire and enriched by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    #[serde(skip)]
    pub app_id: Uuid,
    #[serde(default = "zero_instant")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub inet: Inet,
    #[serde(default)]
    pub resource: Resource,
    pub events: Vec<Event>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Session {
    /// Create an empty session (used by tests and fixtures)
    pub fn new(session_id: Uuid, app_id: Uuid) -> Self {
        Self {
            session_id,
            app_id,
            timestamp: Utc::now(),
            inet: Inet::default(),
            resource: Resource::default(),
            events: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    pub fn has_unhandled_exceptions(&self) -> bool {
        self.events.iter().any(Event::is_unhandled_exception)
    }

    pub fn has_anrs(&self) -> bool {
        self.events.iter().any(Event::is_anr)
    }

    /// Strip NUL padding from client strings
    pub fn trim(&mut self) {
        self.resource.trim();
        for event in &mut self.events {
            event.trim();
        }
    }

    /// Record the client address in the matching family slot
    pub fn record_client_ip(&mut self, ip: IpAddr) {
        match ip {
            IpAddr::V4(v4) => self.inet.ipv4 = Some(v4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => self.inet.ipv4 = Some(v4),
                None => self.inet.ipv6 = Some(v6),
            },
        }
    }

    /// Assign fresh time-ordered ids to every event
    pub fn assign_event_ids(&mut self) {
        for event in &mut self.events {
            event.id = Uuid::now_v7();
        }
    }
}
