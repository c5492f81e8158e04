use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::database::ports::{LaunchCacheRepository, LaunchContext, NewLaunchContext};
use crate::error::{LtiError, Result};

#[derive(Debug, Clone)]
pub struct PostgresLaunchCacheRepository {
    pool: PgPool,
}

impl PostgresLaunchCacheRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<LaunchContext> {
        let source_id: String = row
            .try_get("source_id")
            .map_err(|e| LtiError::Internal(format!("Failed to read source_id: {e}")))?;
        let tool: String = row
            .try_get("tool")
            .map_err(|e| LtiError::Internal(format!("Failed to read tool: {e}")))?;
        let usr: String = row
            .try_get("usr")
            .map_err(|e| LtiError::Internal(format!("Failed to read usr: {e}")))?;
        let grp: String = row
            .try_get("grp")
            .map_err(|e| LtiError::Internal(format!("Failed to read grp: {e}")))?;
        let sub: String = row
            .try_get("sub")
            .map_err(|e| LtiError::Internal(format!("Failed to read sub: {e}")))?;
        let cid: String = row
            .try_get("cid")
            .map_err(|e| LtiError::Internal(format!("Failed to read cid: {e}")))?;
        let sid: String = row
            .try_get("sid")
            .map_err(|e| LtiError::Internal(format!("Failed to read sid: {e}")))?;
        let svc: String = row
            .try_get("svc")
            .map_err(|e| LtiError::Internal(format!("Failed to read svc: {e}")))?;
        let launch_url: String = row
            .try_get("launch_url")
            .map_err(|e| LtiError::Internal(format!("Failed to read launch_url: {e}")))?;
        let user_id: Option<i64> = row
            .try_get("user_id")
            .map_err(|e| LtiError::Internal(format!("Failed to read user_id: {e}")))?;
        let module_id: Option<i64> = row
            .try_get("module_id")
            .map_err(|e| LtiError::Internal(format!("Failed to read module_id: {e}")))?;
        let course_instance_id: Option<i64> = row
            .try_get("course_instance_id")
            .map_err(|e| LtiError::Internal(format!("Failed to read course_instance_id: {e}")))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| LtiError::Internal(format!("Failed to read created_at: {e}")))?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|e| LtiError::Internal(format!("Failed to read updated_at: {e}")))?;
        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .map_err(|e| LtiError::Internal(format!("Failed to read expires_at: {e}")))?;

        Ok(LaunchContext {
            source_id,
            tool,
            usr,
            grp,
            sub,
            cid,
            sid,
            svc,
            launch_url,
            user_id,
            module_id,
            course_instance_id,
            created_at,
            updated_at,
            expires_at,
        })
    }
}

#[async_trait]
impl LaunchCacheRepository for PostgresLaunchCacheRepository {
    async fn upsert(&self, context: NewLaunchContext) -> Result<LaunchContext> {
        let user_id = context.user_id();
        let course_instance_id = context.course_instance_id();
        let row = sqlx::query(
            r#"
            INSERT INTO lti_launch_cache (
                source_id, tool, usr, grp, sub, cid, sid, svc, launch_url,
                user_id, module_id, course_instance_id, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (source_id) DO UPDATE SET
                tool = EXCLUDED.tool,
                usr = EXCLUDED.usr,
                grp = EXCLUDED.grp,
                sub = EXCLUDED.sub,
                cid = EXCLUDED.cid,
                sid = EXCLUDED.sid,
                svc = EXCLUDED.svc,
                launch_url = EXCLUDED.launch_url,
                user_id = EXCLUDED.user_id,
                module_id = EXCLUDED.module_id,
                course_instance_id = EXCLUDED.course_instance_id,
                expires_at = EXCLUDED.expires_at,
                updated_at = now()
            RETURNING
                source_id, tool, usr, grp, sub, cid, sid, svc, launch_url,
                user_id, module_id, course_instance_id,
                created_at, updated_at, expires_at
            "#,
        )
        .bind(&context.source_id)
        .bind(&context.tool)
        .bind(&context.usr)
        .bind(&context.grp)
        .bind(&context.sub)
        .bind(&context.cid)
        .bind(&context.sid)
        .bind(&context.svc)
        .bind(&context.launch_url)
        .bind(user_id)
        .bind(context.module_id)
        .bind(course_instance_id)
        .bind(context.expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(|e| LtiError::Internal(format!("Failed to upsert launch context: {e}")))?;

        Self::map_row(&row)
    }

    async fn get_valid(
        &self,
        source_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LaunchContext>> {
        let row = sqlx::query(
            r#"
            SELECT
                source_id, tool, usr, grp, sub, cid, sid, svc, launch_url,
                user_id, module_id, course_instance_id,
                created_at, updated_at, expires_at
            FROM lti_launch_cache
            WHERE source_id = $1
            "#,
        )
        .bind(source_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| LtiError::Internal(format!("Failed to load launch context: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let context = Self::map_row(&row)?;

        if context.expires_at <= now {
            // Dropping the row on read makes a late outcome a plain miss.
            // The expiry guard keeps a concurrent re-launch's fresh row safe.
            sqlx::query("DELETE FROM lti_launch_cache WHERE source_id = $1 AND expires_at <= $2")
                .bind(source_id)
                .bind(now)
                .execute(self.pool())
                .await
                .map_err(|e| {
                    LtiError::Internal(format!("Failed to delete expired launch context: {e}"))
                })?;
            return Ok(None);
        }

        Ok(Some(context))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM lti_launch_cache WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(|e| {
                LtiError::Internal(format!("Failed to delete expired launch contexts: {e}"))
            })?;

        Ok(result.rows_affected())
    }

    async fn count_expired(&self, now: DateTime<Utc>) -> Result<i64> {
        let row =
            sqlx::query("SELECT COUNT(*) AS count FROM lti_launch_cache WHERE expires_at <= $1")
                .bind(now)
                .fetch_one(self.pool())
                .await
                .map_err(|e| {
                    LtiError::Internal(format!("Failed to count expired launch contexts: {e}"))
                })?;

        row.try_get("count")
            .map_err(|e| LtiError::Internal(format!("Failed to read count: {e}")))
    }

    async fn count_active(&self, now: DateTime<Utc>) -> Result<i64> {
        let row =
            sqlx::query("SELECT COUNT(*) AS count FROM lti_launch_cache WHERE expires_at > $1")
                .bind(now)
                .fetch_one(self.pool())
                .await
                .map_err(|e| {
                    LtiError::Internal(format!("Failed to count active launch contexts: {e}"))
                })?;

        row.try_get("count")
            .map_err(|e| LtiError::Internal(format!("Failed to read count: {e}")))
    }
}
