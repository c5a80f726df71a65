// Database-backed GroupStore implementation

use async_trait::async_trait;
use crashlane_core::{
    traits::GroupStore, GroupKind, IngestError, IssueGroup, NewIssueGroup, Result,
};
use uuid::Uuid;

use crate::models::{CreateGroupRow, GroupRow};
use crate::repositories::Database;

// ============================================================================
// DbGroupStore - Stores exception and ANR groups in the database
// ============================================================================

#[derive(Clone)]
pub struct DbGroupStore {
    db: Database,
}

impl DbGroupStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl From<GroupRow> for IssueGroup {
    fn from(row: GroupRow) -> Self {
        IssueGroup {
            id: row.id,
            app_id: row.app_id,
            app_version: row.app_version,
            name: row.name,
            fingerprint: row.fingerprint,
            event_ids: row.event_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl GroupStore for DbGroupStore {
    async fn list_groups(
        &self,
        app_id: Uuid,
        kind: GroupKind,
        app_version: Option<&str>,
    ) -> Result<Vec<IssueGroup>> {
        let rows = self
            .db
            .list_groups(kind, app_id, app_version)
            .await
            .map_err(|e| IngestError::store(e.to_string()))?;
        Ok(rows.into_iter().map(IssueGroup::from).collect())
    }

    async fn create_group(&self, group: NewIssueGroup) -> Result<IssueGroup> {
        let row = self
            .db
            .create_group(
                group.kind,
                CreateGroupRow {
                    app_id: group.app_id,
                    app_version: group.app_version,
                    name: group.name,
                    fingerprint: group.fingerprint,
                    event_ids: group.event_ids,
                },
            )
            .await
            .map_err(|e| IngestError::store(e.to_string()))?;
        Ok(row.into())
    }

    async fn append_event(&self, kind: GroupKind, group_id: Uuid, event_id: Uuid) -> Result<bool> {
        self.db
            .append_group_event(kind, group_id, event_id)
            .await
            .map_err(|e| IngestError::store(e.to_string()))
    }
}

/// Create a database-backed group store
pub fn create_db_group_store(db: Database) -> DbGroupStore {
    DbGroupStore::new(db)
}
