use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::database::ports::{NewOutcomeLog, OutcomeCounts, OutcomeLogRepository};
use crate::error::{LtiError, Result};

#[derive(Debug, Clone)]
pub struct PostgresOutcomeLogRepository {
    pool: PgPool,
}

impl PostgresOutcomeLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OutcomeLogRepository for PostgresOutcomeLogRepository {
    async fn append(&self, entry: NewOutcomeLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lti_outcome_log (
                source_id, tool, score_raw, score_normalized,
                success, um_url, um_response_status, error_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&entry.source_id)
        .bind(&entry.tool)
        .bind(&entry.score_raw)
        .bind(entry.score_normalized)
        .bind(entry.success)
        .bind(&entry.um_url)
        .bind(entry.um_response_status)
        .bind(&entry.error_message)
        .execute(self.pool())
        .await
        .map_err(|e| LtiError::Internal(format!("Failed to append outcome log entry: {e}")))?;

        Ok(())
    }

    async fn counts_since(&self, cutoff: DateTime<Utc>) -> Result<OutcomeCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE success)     AS success,
                COUNT(*) FILTER (WHERE NOT success) AS failure
            FROM lti_outcome_log
            WHERE received_at >= $1
            "#,
        )
        .bind(cutoff)
        .fetch_one(self.pool())
        .await
        .map_err(|e| LtiError::Internal(format!("Failed to count outcome log entries: {e}")))?;

        let success: i64 = row
            .try_get("success")
            .map_err(|e| LtiError::Internal(format!("Failed to read success count: {e}")))?;
        let failure: i64 = row
            .try_get("failure")
            .map_err(|e| LtiError::Internal(format!("Failed to read failure count: {e}")))?;

        Ok(OutcomeCounts { success, failure })
    }
}
