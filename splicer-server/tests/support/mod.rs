//! Shared fixtures for the HTTP surface tests: in-memory repositories, a
//! recording UM forwarder, and a `TestServer` wired over them.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use splicer_core::application::LtiUnitOfWork;
use splicer_core::database::ports::progress::derive_flags;
use splicer_core::database::ports::{
    LaunchCacheRepository, LaunchContext, NewLaunchContext, NewOutcomeLog, OutcomeCounts,
    OutcomeLogRepository, ProgressRepository, ProgressUpdate,
};
use splicer_core::error::Result as LtiResult;
use splicer_core::outcome::{ForwardingConfig, OutcomeProcessor, UmForwarder};
use splicer_core::tools::ToolRegistry;
use splicer_server::config::Config;
use splicer_server::infra::app_state::AppState;
use splicer_server::routes::create_router;

#[derive(Default)]
pub struct MemLaunchCache {
    pub entries: Mutex<HashMap<String, LaunchContext>>,
}

#[async_trait]
impl LaunchCacheRepository for MemLaunchCache {
    async fn upsert(&self, context: NewLaunchContext) -> LtiResult<LaunchContext> {
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
    ) -> LtiResult<Option<LaunchContext>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(source_id)
            .filter(|c| c.expires_at > now)
            .cloned())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> LtiResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, c| c.expires_at > now);
        Ok((before - entries.len()) as u64)
    }

    async fn count_expired(&self, now: DateTime<Utc>) -> LtiResult<i64> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.expires_at <= now)
            .count() as i64)
    }

    async fn count_active(&self, now: DateTime<Utc>) -> LtiResult<i64> {
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
pub struct MemOutcomeLog {
    pub entries: Mutex<Vec<NewOutcomeLog>>,
}

#[async_trait]
impl OutcomeLogRepository for MemOutcomeLog {
    async fn append(&self, entry: NewOutcomeLog) -> LtiResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn counts_since(&self, _cutoff: DateTime<Utc>) -> LtiResult<OutcomeCounts> {
        let entries = self.entries.lock().unwrap();
        let success = entries.iter().filter(|e| e.success).count() as i64;
        Ok(OutcomeCounts {
            success,
            failure: entries.len() as i64 - success,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRow {
    pub course_instance_id: Option<i64>,
    /// Percentage, like the stored column.
    pub score: Option<f64>,
    pub progress: f64,
    pub is_complete: bool,
    pub success: bool,
    pub attempts: i32,
}

#[derive(Default)]
pub struct MemProgress {
    pub rows: Mutex<HashMap<(i64, i64), ProgressRow>>,
}

#[async_trait]
impl ProgressRepository for MemProgress {
    async fn merge_score(
        &self,
        user_id: i64,
        module_id: i64,
        course_instance_id: Option<i64>,
        score: f64,
    ) -> LtiResult<ProgressUpdate> {
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

/// UM transport double: records every URL and answers a fixed status.
pub struct RecordingForwarder {
    status: u16,
    calls: Mutex<Vec<String>>,
}

impl RecordingForwarder {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UmForwarder for RecordingForwarder {
    async fn forward(&self, url: &str) -> LtiResult<u16> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok(self.status)
    }
}

/// Registry with credentials for one tool of each launch flavor: plain
/// direct (codecheck), direct with behavior hooks (ctat, dbqa), and the
/// always-configured mediated tools.
pub fn test_registry() -> ToolRegistry {
    ToolRegistry::from_lookup(|name| match name {
        "CODECHECK_KEY" => Some("codecheck_key".to_string()),
        "CODECHECK_SECRET" => Some("codecheck_secret".to_string()),
        "CODECHECK_LAUNCH" => Some("https://codecheck.example.org/lti".to_string()),
        "CTAT_KEY" => Some("ctat_key".to_string()),
        "CTAT_SECRET" => Some("ctat_secret".to_string()),
        "CTAT_LAUNCH" => Some("https://ctat.example.edu/sets/".to_string()),
        "DBQA_KEY" => Some("dbqa_key".to_string()),
        "DBQA_SECRET" => Some("dbqa_secret".to_string()),
        _ => None,
    })
}

pub fn outcome_xml(source_id: &str, score: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<imsx_POXEnvelopeRequest xmlns="http://www.imsglobal.org/services/ltiv1p1/xsd/imsoms_v1p0">
  <imsx_POXHeader>
    <imsx_POXRequestHeaderInfo>
      <imsx_version>V1.0</imsx_version>
      <imsx_messageIdentifier>msg-1</imsx_messageIdentifier>
    </imsx_POXRequestHeaderInfo>
  </imsx_POXHeader>
  <imsx_POXBody>
    <replaceResultRequest>
      <resultRecord>
        <sourcedGUID><sourcedId>{source_id}</sourcedId></sourcedGUID>
        <result><resultScore><textString>{score}</textString></resultScore></result>
      </resultRecord>
    </replaceResultRequest>
  </imsx_POXBody>
</imsx_POXEnvelopeRequest>"#
    )
}

pub struct TestApp {
    pub server: TestServer,
    pub cache: Arc<MemLaunchCache>,
    pub log: Arc<MemOutcomeLog>,
    pub progress: Arc<MemProgress>,
    pub forwarder: Arc<RecordingForwarder>,
}

pub fn build_test_app(config: Config) -> Result<TestApp> {
    build_test_app_with(config, test_registry(), RecordingForwarder::with_status(200))
}

pub fn build_test_app_with(
    config: Config,
    registry: ToolRegistry,
    forwarder: RecordingForwarder,
) -> Result<TestApp> {
    let cache = Arc::new(MemLaunchCache::default());
    let log = Arc::new(MemOutcomeLog::default());
    let progress = Arc::new(MemProgress::default());
    let forwarder = Arc::new(forwarder);
    let registry = Arc::new(registry);

    let uow = LtiUnitOfWork {
        launch_cache: cache.clone(),
        outcome_log: log.clone(),
        progress: progress.clone(),
    };
    let processor = Arc::new(OutcomeProcessor::new(
        uow.clone(),
        registry.clone(),
        forwarder.clone(),
        ForwardingConfig {
            enabled: config.forward_to_um,
            um_service_url: config.um_service_url.clone(),
        },
    ));

    let state = AppState::new(Arc::new(config), registry, uow, processor);
    let server = TestServer::new(create_router(state))?;

    Ok(TestApp {
        server,
        cache,
        log,
        progress,
        forwarder,
    })
}
