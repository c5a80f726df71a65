// Session Ingestion Core
//
// This crate provides a store-agnostic implementation of the mobile telemetry
// ingestion pipeline (validate → enrich → persist → group).
//
// Key design decisions:
// - Uses traits (SessionStore, EventSink, GroupStore, ...) for pluggable backends
// - Events are a tagged enum; each kind carries exactly its own payload
// - Fingerprints are 64-bit SimHashes over the canonical stack trace text
// - Grouping matches by Hamming distance and serialises match-or-create per app
// - Symbolication is an encode → external call → decode round trip addressed by
//   a typed codec map
// - Error handling distinguishes caller errors from collaborator failures

// Domain types
pub mod event;
pub mod resource;
pub mod session;

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod grouping;
pub mod pipeline;
pub mod symbolication;
pub mod traits;
pub mod validation;

// In-memory implementations for tests and embedded use
pub mod memory;

// Collaborator HTTP clients
pub mod geo;
pub mod retrace;

// Re-exports for convenience
pub use config::{GroupingConfig, GroupingScope};
pub use error::{IngestError, Result};
pub use event::{Event, EventPayload, Frame};
pub use grouping::{Assignment, Bucketer, GroupKind, IssueGroup, NewIssueGroup};
pub use pipeline::{parse_session, IngestOutcome, IngestPipeline, IngestRequest};
pub use resource::Resource;
pub use session::{Attachment, Inet, Session};
pub use symbolication::{SymbolicationRequest, SymbolicationUnit};
pub use traits::{AttachmentStore, Deobfuscator, EventSink, GeoLocator, GroupStore, SessionStore};
pub use validation::ValidationError;
