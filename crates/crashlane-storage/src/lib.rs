// Storage backends for session ingestion
//
// This crate provides implementations of the core collaborator traits:
// - DbSessionStore: implements SessionStore over Postgres (sessions, attachments, mappings)
// - DbGroupStore: implements GroupStore over Postgres (exception and ANR groups)
// - ClickHouseSink: implements EventSink over the ClickHouse HTTP interface
// - ObjectStoreAttachments: implements AttachmentStore over object_store

pub mod attachment_store;
pub mod clickhouse;
pub mod event_row;
pub mod group_store;
pub mod models;
pub mod repositories;
pub mod session_store;

pub use attachment_store::{create_object_store, AttachmentStorageConfig, ObjectStoreAttachments};
pub use clickhouse::{ClickHouseConfig, ClickHouseSink};
pub use group_store::{create_db_group_store, DbGroupStore};
pub use models::*;
pub use repositories::*;
pub use session_store::{create_db_session_store, DbSessionStore};
