use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Context captured at launch time, written before the launch action is
/// returned so an outcome callback can be correlated at any point up to the
/// TTL.
#[derive(Debug, Clone)]
pub struct NewLaunchContext {
    pub source_id: String,
    pub tool: String,
    pub usr: String,
    pub grp: String,
    pub sub: String,
    pub cid: String,
    pub sid: String,
    pub svc: String,
    /// Resolved launch URL, kept for debugging only.
    pub launch_url: String,
    pub module_id: Option<i64>,
    pub expires_at: DateTime<Utc>,
}

impl NewLaunchContext {
    /// `usr` carries the LMS user id as a string for enrolled launches;
    /// preview launches may carry arbitrary labels, which map to `None`.
    pub fn user_id(&self) -> Option<i64> {
        parse_numeric_id(&self.usr)
    }

    /// `grp` carries the course instance id for enrolled launches and labels
    /// like `preview` or `default` otherwise.
    pub fn course_instance_id(&self) -> Option<i64> {
        parse_numeric_id(&self.grp)
    }
}

fn parse_numeric_id(value: &str) -> Option<i64> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().ok()
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub source_id: String,
    pub tool: String,
    pub usr: String,
    pub grp: String,
    pub sub: String,
    pub cid: String,
    pub sid: String,
    pub svc: String,
    pub launch_url: String,
    pub user_id: Option<i64>,
    pub module_id: Option<i64>,
    pub course_instance_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait LaunchCacheRepository: Send + Sync {
    /// Insert or refresh the context keyed by `source_id`. Re-launching the
    /// same activity overwrites overlapping fields and extends the expiry
    /// (last write wins).
    async fn upsert(&self, context: NewLaunchContext) -> Result<LaunchContext>;

    /// Return the context iff it exists and has not expired at `now`.
    /// Implementations should drop an expired row on read so a late outcome
    /// is a plain miss rather than a stale hit.
    async fn get_valid(
        &self,
        source_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LaunchContext>>;

    /// Bulk-delete expired rows, returning how many were removed. Safe to run
    /// concurrently with reads.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Rows `delete_expired` would remove at `now`.
    async fn count_expired(&self, now: DateTime<Utc>) -> Result<i64>;

    /// Unexpired entries, reported by the health endpoint.
    async fn count_active(&self, now: DateTime<Utc>) -> Result<i64>;
}
