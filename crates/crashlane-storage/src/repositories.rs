// Repository layer for database operations

use anyhow::Result;
use crashlane_core::GroupKind;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// Table holding groups of the given kind
fn group_table(kind: GroupKind) -> &'static str {
    match kind {
        GroupKind::Exception => "exception_groups",
        GroupKind::Anr => "anr_groups",
    }
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // ============================================
    // Sessions
    // ============================================

    pub async fn session_exists(&self, id: Uuid, app_id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM sessions WHERE id = $1 AND app_id = $2)
            "#,
        )
        .bind(id)
        .bind(app_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    pub async fn get_session(&self, id: Uuid, app_id: Uuid) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, app_id, event_count, attachment_count, bytes_in, timestamp, created_at, updated_at
            FROM sessions
            WHERE id = $1 AND app_id = $2
            "#,
        )
        .bind(id)
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert a session with its attachments and onboard the app, in one transaction.
    ///
    /// Returns `false` without writing anything when the session already exists.
    pub async fn insert_session(
        &self,
        input: CreateSessionRow,
        attachments: Vec<CreateAttachmentRow>,
        onboard: OnboardApp,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO sessions (id, event_count, attachment_count, bytes_in, timestamp, app_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            ON CONFLICT (id, app_id) DO NOTHING
            "#,
        )
        .bind(input.id)
        .bind(input.event_count)
        .bind(input.attachment_count)
        .bind(input.bytes_in)
        .bind(input.timestamp)
        .bind(input.app_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !inserted {
            tx.rollback().await?;
            return Ok(false);
        }

        for attachment in attachments {
            sqlx::query(
                r#"
                INSERT INTO session_attachments (id, session_id, app_id, name, extension, type, key, location, timestamp)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(attachment.id)
            .bind(input.id)
            .bind(input.app_id)
            .bind(&attachment.name)
            .bind(&attachment.extension)
            .bind(&attachment.kind)
            .bind(&attachment.key)
            .bind(&attachment.location)
            .bind(attachment.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE apps
            SET
                onboarded = TRUE,
                unique_identifier = $2,
                platform = $3,
                first_version = $4,
                onboarded_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND onboarded = FALSE
            "#,
        )
        .bind(input.app_id)
        .bind(&onboard.unique_identifier)
        .bind(&onboard.platform)
        .bind(&onboard.first_version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn list_attachments(&self, session_id: Uuid, app_id: Uuid) -> Result<Vec<AttachmentRow>> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT id, session_id, app_id, name, extension, type, key, location, timestamp
            FROM session_attachments
            WHERE session_id = $1 AND app_id = $2
            ORDER BY timestamp, id
            "#,
        )
        .bind(session_id)
        .bind(app_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ============================================
    // Mapping files
    // ============================================

    pub async fn get_mapping_key(
        &self,
        app_id: Uuid,
        app_unique_id: &str,
        version_name: &str,
        version_code: &str,
    ) -> Result<Option<String>> {
        let key = sqlx::query_scalar::<_, String>(
            r#"
            SELECT key
            FROM mapping_files
            WHERE app_id = $1
              AND app_unique_id = $2
              AND version_name = $3
              AND version_code = $4
              AND mapping_type = 'proguard'
            LIMIT 1
            "#,
        )
        .bind(app_id)
        .bind(app_unique_id)
        .bind(version_name)
        .bind(version_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(key)
    }

    // ============================================
    // Issue groups
    // ============================================

    /// Groups of one kind for an app, oldest first
    pub async fn list_groups(
        &self,
        kind: GroupKind,
        app_id: Uuid,
        app_version: Option<&str>,
    ) -> Result<Vec<GroupRow>> {
        let sql = format!(
            r#"
            SELECT id, app_id, app_version, name, fingerprint, event_ids, created_at, updated_at
            FROM {}
            WHERE app_id = $1 AND ($2::TEXT IS NULL OR app_version = $2)
            ORDER BY created_at, id
            "#,
            group_table(kind)
        );
        let rows = sqlx::query_as::<_, GroupRow>(&sql)
            .bind(app_id)
            .bind(app_version)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    pub async fn create_group(&self, kind: GroupKind, input: CreateGroupRow) -> Result<GroupRow> {
        let sql = format!(
            r#"
            INSERT INTO {} (id, app_id, app_version, name, fingerprint, event_ids, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING id, app_id, app_version, name, fingerprint, event_ids, created_at, updated_at
            "#,
            group_table(kind)
        );
        let row = sqlx::query_as::<_, GroupRow>(&sql)
            .bind(Uuid::now_v7())
            .bind(input.app_id)
            .bind(&input.app_version)
            .bind(&input.name)
            .bind(&input.fingerprint)
            .bind(&input.event_ids)
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    /// Append an event id unless it is already a member.
    ///
    /// Returns `false` when nothing changed.
    pub async fn append_group_event(&self, kind: GroupKind, group_id: Uuid, event_id: Uuid) -> Result<bool> {
        let sql = format!(
            r#"
            UPDATE {}
            SET event_ids = array_append(event_ids, $2), updated_at = NOW()
            WHERE id = $1 AND NOT ($2 = ANY(event_ids))
            "#,
            group_table(kind)
        );
        let result = sqlx::query(&sql)
            .bind(group_id)
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
