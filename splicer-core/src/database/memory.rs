//! In-memory repository fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::database::ports::progress::derive_flags;
use crate::database::ports::{
    LaunchCacheRepository, LaunchContext, NewLaunchContext, NewOutcomeLog, OutcomeCounts,
    OutcomeLogRepository, ProgressRepository, ProgressUpdate,
};
use crate::error::{LtiError, Result};

#[derive(Default)]
pub(crate) struct MemoryLaunchCache {
    pub entries: Mutex<HashMap<String, LaunchContext>>,
    pub fail_writes: bool,
    pub fail_reads: bool,
}

impl MemoryLaunchCache {
    pub fn with_context(context: LaunchContext) -> Self {
        let cache = Self::default();
        cache
            .entries
            .lock()
            .unwrap()
            .insert(context.source_id.clone(), context);
        cache
    }
}

#[async_trait]
impl LaunchCacheRepository for MemoryLaunchCache {
    async fn upsert(&self, context: NewLaunchContext) -> Result<LaunchContext> {
        if self.fail_writes {
            return Err(LtiError::Internal("storage offline".to_string()));
        }
        let now = Utc::now();
        let record = LaunchContext {
            source_id: context.source_id.clone(),
            tool: context.tool.clone(),
            usr: context.usr.clone(),
            grp: context.grp.clone(),
            sub: context.sub.clone(),
            cid: context.cid.clone(),
            sid: context.sid.clone(),
            svc: context.svc.clone(),
            launch_url: context.launch_url.clone(),
            user_id: context.user_id(),
            module_id: context.module_id,
            course_instance_id: context.course_instance_id(),
            created_at: now,
            updated_at: now,
            expires_at: context.expires_at,
        };
        self.entries
            .lock()
            .unwrap()
            .insert(record.source_id.clone(), record.clone());
        Ok(record)
    }

    async fn get_valid(
        &self,
        source_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LaunchContext>> {
        if self.fail_reads {
            return Err(LtiError::Internal("storage offline".to_string()));
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(source_id)
            .filter(|c| c.expires_at > now)
            .cloned())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, c| c.expires_at > now);
        Ok((before - entries.len()) as u64)
    }

    async fn count_expired(&self, now: DateTime<Utc>) -> Result<i64> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.expires_at <= now)
            .count() as i64)
    }

    async fn count_active(&self, now: DateTime<Utc>) -> Result<i64> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.expires_at > now)
            .count() as i64)
    }
}

#[derive(Default)]
pub(crate) struct MemoryOutcomeLog {
    pub entries: Mutex<Vec<NewOutcomeLog>>,
    pub fail_appends: bool,
}

#[async_trait]
impl OutcomeLogRepository for MemoryOutcomeLog {
    async fn append(&self, entry: NewOutcomeLog) -> Result<()> {
        if self.fail_appends {
            return Err(LtiError::Internal("storage offline".to_string()));
        }
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn counts_since(&self, _cutoff: DateTime<Utc>) -> Result<OutcomeCounts> {
        let entries = self.entries.lock().unwrap();
        let success = entries.iter().filter(|e| e.success).count() as i64;
        Ok(OutcomeCounts {
            success,
            failure: entries.len() as i64 - success,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProgressRow {
    pub course_instance_id: Option<i64>,
    /// Percentage, like the stored column.
    pub score: Option<f64>,
    pub progress: f64,
    pub is_complete: bool,
    pub success: bool,
    pub attempts: i32,
}

#[derive(Default)]
pub(crate) struct MemoryProgress {
    pub rows: Mutex<HashMap<(i64, i64), ProgressRow>>,
    pub fail: bool,
}

#[async_trait]
impl ProgressRepository for MemoryProgress {
    async fn merge_score(
        &self,
        user_id: i64,
        module_id: i64,
        course_instance_id: Option<i64>,
        score: f64,
    ) -> Result<ProgressUpdate> {
        if self.fail {
            return Err(LtiError::Internal("storage offline".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let percentage = score * 100.0;
        let (is_complete, success) = derive_flags(score);
        match rows.get_mut(&(user_id, module_id)) {
            Some(row) => {
                if row.score.is_none_or(|stored| stored < percentage) {
                    row.score = Some(percentage);
                    row.progress = score;
                    row.is_complete = is_complete;
                    row.success = success;
                    row.attempts += 1;
                    Ok(ProgressUpdate::Applied)
                } else {
                    Ok(ProgressUpdate::NotBetter)
                }
            }
            None => match course_instance_id {
                Some(cid) => {
                    rows.insert(
                        (user_id, module_id),
                        ProgressRow {
                            course_instance_id: Some(cid),
                            score: Some(percentage),
                            progress: score,
                            is_complete,
                            success,
                            attempts: 1,
                        },
                    );
                    Ok(ProgressUpdate::Applied)
                }
                None => Ok(ProgressUpdate::Missing),
            },
        }
    }
}
