use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// One audit row per outcome attempt. Fields default to empty so a row can be
/// built up as processing advances and written whatever the final state.
#[derive(Debug, Clone, Default)]
pub struct NewOutcomeLog {
    pub source_id: String,
    pub tool: String,
    /// Score exactly as the tool sent it, before any parsing.
    pub score_raw: String,
    /// Clamped to 0.0..=1.0; `None` when the raw score was not numeric.
    pub score_normalized: Option<f64>,
    pub success: bool,
    pub um_url: String,
    pub um_response_status: Option<i32>,
    pub error_message: String,
}

/// Success/failure tallies over a time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub success: i64,
    pub failure: i64,
}

impl OutcomeCounts {
    pub fn total(&self) -> i64 {
        self.success + self.failure
    }
}

#[async_trait]
pub trait OutcomeLogRepository: Send + Sync {
    /// Append one audit row. The log is append-only; rows are never updated.
    async fn append(&self, entry: NewOutcomeLog) -> Result<()>;

    /// Tallies for entries received at or after `cutoff`.
    async fn counts_since(&self, cutoff: DateTime<Utc>) -> Result<OutcomeCounts>;
}
