use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::database::ports::progress::derive_flags;
use crate::database::ports::{ProgressRepository, ProgressUpdate};
use crate::error::{LtiError, Result};

#[derive(Debug, Clone)]
pub struct PostgresProgressRepository {
    pool: PgPool,
}

impl PostgresProgressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The compare-and-update. One conditional statement, so two concurrent
    /// deliveries cannot interleave a read-then-write and regress the score.
    async fn try_update(
        &self,
        user_id: i64,
        module_id: i64,
        percentage: f64,
        progress: f64,
        is_complete: bool,
        success: bool,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE module_progress
            SET score = $3,
                progress = $4,
                is_complete = $5,
                success = $6,
                attempts = attempts + 1,
                updated_at = now()
            WHERE user_id = $1
              AND module_id = $2
              AND (score IS NULL OR score < $3)
            "#,
        )
        .bind(user_id)
        .bind(module_id)
        .bind(percentage)
        .bind(progress)
        .bind(is_complete)
        .bind(success)
        .execute(self.pool())
        .await
        .map_err(|e| LtiError::Internal(format!("Failed to update module progress: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProgressRepository for PostgresProgressRepository {
    async fn merge_score(
        &self,
        user_id: i64,
        module_id: i64,
        course_instance_id: Option<i64>,
        score: f64,
    ) -> Result<ProgressUpdate> {
        // Stored score is a percentage; the wire score is a 0..1 fraction.
        let percentage = score * 100.0;
        let (is_complete, success) = derive_flags(score);

        if self
            .try_update(user_id, module_id, percentage, score, is_complete, success)
            .await?
        {
            return Ok(ProgressUpdate::Applied);
        }

        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM module_progress WHERE user_id = $1 AND module_id = $2
            ) AS found
            "#,
        )
        .bind(user_id)
        .bind(module_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| LtiError::Internal(format!("Failed to check module progress: {e}")))?;
        let found: bool = row
            .try_get("found")
            .map_err(|e| LtiError::Internal(format!("Failed to read progress existence: {e}")))?;
        if found {
            return Ok(ProgressUpdate::NotBetter);
        }

        // Rows are created on first outcome only for enrolled launches;
        // previews have no course instance and nothing to attach to.
        let Some(course_instance_id) = course_instance_id else {
            return Ok(ProgressUpdate::Missing);
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO module_progress (
                user_id, module_id, course_instance_id,
                score, progress, is_complete, success, attempts
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
            ON CONFLICT (user_id, module_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(module_id)
        .bind(course_instance_id)
        .bind(percentage)
        .bind(score)
        .bind(is_complete)
        .bind(success)
        .execute(self.pool())
        .await
        .map_err(|e| LtiError::Internal(format!("Failed to insert module progress: {e}")))?;

        if inserted.rows_affected() > 0 {
            return Ok(ProgressUpdate::Applied);
        }

        // Lost an insert race to a concurrent delivery; one more
        // compare-and-update settles whose score stands.
        if self
            .try_update(user_id, module_id, percentage, score, is_complete, success)
            .await?
        {
            Ok(ProgressUpdate::Applied)
        } else {
            Ok(ProgressUpdate::NotBetter)
        }
    }
}
