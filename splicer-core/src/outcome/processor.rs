//! The outcome pipeline: parse the POX body, normalize the score, correlate
//! with the cached launch, reconcile local progress, forward upstream, and
//! write exactly one audit row.
//!
//! Remote tools treat any non-200 as a delivery failure and retry, so every
//! path through here renders an in-band POX response; nothing escapes as an
//! error. Partial failure is ordinary: the progress and upstream legs run
//! independently and overall success is their OR.

use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::forwarder::{UmForwarder, UmOutcome, build_um_url};
use super::pox;
use crate::application::LtiUnitOfWork;
use crate::database::ports::{
    LaunchCacheRepository, LaunchContext, NewOutcomeLog, OutcomeLogRepository, ProgressRepository,
    ProgressUpdate,
};
use crate::tools::ToolRegistry;

/// Upstream forwarding switches, fixed at startup.
#[derive(Debug, Clone)]
pub struct ForwardingConfig {
    pub enabled: bool,
    pub um_service_url: String,
}

/// Drives one outcome callback end to end.
pub struct OutcomeProcessor {
    uow: LtiUnitOfWork,
    registry: Arc<ToolRegistry>,
    forwarder: Arc<dyn UmForwarder>,
    forwarding: ForwardingConfig,
}

impl fmt::Debug for OutcomeProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeProcessor")
            .field("uow", &self.uow)
            .field("forwarder", &type_name_of_val(self.forwarder.as_ref()))
            .field("forwarding", &self.forwarding)
            .finish()
    }
}

impl OutcomeProcessor {
    pub fn new(
        uow: LtiUnitOfWork,
        registry: Arc<ToolRegistry>,
        forwarder: Arc<dyn UmForwarder>,
        forwarding: ForwardingConfig,
    ) -> Self {
        Self {
            uow,
            registry,
            forwarder,
            forwarding,
        }
    }

    /// Processes one raw outcome body and returns the POX response to send
    /// back with HTTP 200.
    pub async fn process(&self, body: &[u8]) -> String {
        let mut log = NewOutcomeLog::default();

        let request = match pox::parse_outcome(body) {
            Ok(request) => request,
            Err(e) => {
                let detail = e.detail().to_string();
                error!(error = %detail, "outcome XML rejected");
                log.error_message = detail.clone();
                self.append_log(log).await;
                return pox::render_response(false, &format!("XML parse error: {detail}"), None);
            }
        };

        info!(
            source_id = %request.source_id,
            score = %request.score_raw,
            "outcome received"
        );
        log.source_id = request.source_id.clone();
        log.score_raw = request.score_raw.clone();
        let message_ref = request.message_id.as_deref();

        // Tools occasionally send garbage in textString. That degrades to a
        // zero score rather than aborting, and the normalized column stays
        // NULL so the audit log shows the raw value was not numeric.
        let score = match request.score_raw.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => {
                let clamped = parsed.clamp(0.0, 1.0);
                if clamped != parsed {
                    warn!(raw = %request.score_raw, clamped, "score clamped to [0, 1]");
                }
                log.score_normalized = Some(clamped);
                clamped
            }
            _ => {
                warn!(raw = %request.score_raw, "non-numeric score degraded to 0.0");
                0.0
            }
        };

        let lookup = self
            .uow
            .launch_cache
            .get_valid(&request.source_id, Utc::now())
            .await;
        let context = match lookup {
            Ok(Some(context)) => context,
            Ok(None) => {
                warn!(source_id = %request.source_id, "no launch context for outcome");
                log.error_message = "Launch context not found or expired".to_string();
                self.append_log(log).await;
                return pox::render_response(
                    false,
                    "Launch context not found or expired",
                    message_ref,
                );
            }
            Err(e) => {
                error!(source_id = %request.source_id, error = %e, "launch cache lookup failed");
                log.error_message = format!("Unexpected error: {e}");
                self.append_log(log).await;
                return pox::render_response(false, "Internal server error", message_ref);
            }
        };

        log.tool = context.tool.clone();
        info!(
            tool = %context.tool,
            user_id = ?context.user_id,
            module_id = ?context.module_id,
            course_instance_id = ?context.course_instance_id,
            "launch context matched"
        );

        let progress_updated = self.reconcile_progress(&context, score).await;

        let um_success = if self.forwarding.enabled {
            self.forward_upstream(&context, &request.score_raw, &mut log)
                .await
        } else {
            info!("UM forwarding disabled; upstream leg counts as delivered");
            true
        };

        let success = progress_updated || um_success;
        log.success = success;
        self.append_log(log).await;

        let description = if success {
            let mut description = format!("Score {} recorded", request.score_raw);
            if progress_updated {
                description.push_str(" (local progress updated)");
            }
            if um_success && self.forwarding.enabled {
                description.push_str(" (UM notified)");
            }
            description
        } else {
            "Failed to record score".to_string()
        };

        info!(source_id = %request.source_id, success, %description, "outcome processed");
        pox::render_response(success, &description, message_ref)
    }

    /// Progress leg. Runs only when the launch carried both a numeric user
    /// and a module id; a storage error degrades to "not updated" so the
    /// upstream leg still gets its chance.
    async fn reconcile_progress(&self, context: &LaunchContext, score: f64) -> bool {
        let (Some(user_id), Some(module_id)) = (context.user_id, context.module_id) else {
            warn!(
                source_id = %context.source_id,
                user_id = ?context.user_id,
                module_id = ?context.module_id,
                "cannot update progress without user and module ids"
            );
            return false;
        };

        let merged = self
            .uow
            .progress
            .merge_score(user_id, module_id, context.course_instance_id, score)
            .await;
        match merged {
            Ok(update) => {
                match update {
                    ProgressUpdate::Applied => {
                        info!(user_id, module_id, score, "progress updated");
                    }
                    ProgressUpdate::NotBetter => {
                        info!(user_id, module_id, score, "stored score is already better");
                    }
                    ProgressUpdate::Missing => {
                        info!(user_id, module_id, "no progress row to update");
                    }
                }
                update.applied()
            }
            Err(e) => {
                error!(user_id, module_id, error = %e, "progress update failed");
                false
            }
        }
    }

    /// Upstream leg. Failures record their detail on the audit row and report
    /// `false`; they never abort the outcome.
    ///
    /// The UM service receives the raw score string, not the normalized
    /// float, because score processors match on the tool's own notation.
    async fn forward_upstream(
        &self,
        context: &LaunchContext,
        score_raw: &str,
        log: &mut NewOutcomeLog,
    ) -> bool {
        let Some(config) = self.registry.lookup(&context.tool) else {
            error!(tool = %context.tool, "cached tool is not in the registry");
            log.error_message = format!("Failed to build UM URL: unknown tool '{}'", context.tool);
            return false;
        };

        let outcome = UmOutcome {
            score_raw,
            usr: &context.usr,
            grp: &context.grp,
            sub: &context.sub,
            sid: &context.sid,
            svc: &context.svc,
            cid: &context.cid,
        };
        let url = match build_um_url(&self.forwarding.um_service_url, config, &outcome) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "failed to build UM URL");
                log.error_message = format!("Failed to build UM URL: {}", e.detail());
                return false;
            }
        };
        log.um_url = url.clone();
        info!(url = %url, "forwarding outcome to UM service");

        match self.forwarder.forward(&url).await {
            Ok(status) => {
                log.um_response_status = Some(i32::from(status));
                if (200..300).contains(&status) {
                    info!(status, "UM service accepted score");
                    true
                } else {
                    error!(status, "UM service rejected score");
                    log.error_message = format!("UM service returned {status}");
                    false
                }
            }
            Err(e) => {
                error!(error = %e, "UM service call failed");
                log.error_message = e.detail().to_string();
                false
            }
        }
    }

    /// Audit write, best-effort. Losing a row loses history, not
    /// correctness, so a storage error only logs.
    async fn append_log(&self, entry: NewOutcomeLog) {
        if let Err(e) = self.uow.outcome_log.append(entry).await {
            error!(error = %e, "failed to write outcome log entry");
        }
    }
}
