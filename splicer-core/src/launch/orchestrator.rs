//! Launch preparation: identifier validation, source-id derivation, body
//! construction and signing, and the cache write that makes a later outcome
//! callback attributable to this launch.

use std::sync::LazyLock;

use chrono::{Duration, Utc};
use regex::Regex;
use tracing::{error, info, warn};
use url::Url;

use super::body::{BodyRequest, LaunchParams, build_body};
use super::sign;
use crate::database::ports::{LaunchCacheRepository, NewLaunchContext};
use crate::error::{LtiError, Result};
use crate::tools::{ToolConfig, ToolId, ToolRegistry};

/// Launch endpoint inputs after query parsing.
#[derive(Debug, Clone, Default)]
pub struct LaunchRequest {
    pub tool: String,
    pub sub: String,
    pub usr: String,
    pub grp: String,
    pub cid: String,
    pub sid: String,
    pub svc: String,
    pub module_id: Option<i64>,
    pub step_explanation: Option<String>,
}

/// What the client must do to reach the tool.
#[derive(Debug, Clone)]
pub enum LaunchAction {
    /// Auto-submitting POST form carrying OAuth-signed fields.
    Form {
        action: String,
        params: LaunchParams,
    },
    /// Plain redirect; the mediating platform performs the signed launch.
    Redirect { url: String },
}

#[derive(Debug, Clone)]
pub struct PreparedLaunch {
    pub source_id: String,
    pub tool: ToolId,
    pub action: LaunchAction,
}

static SAFE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w\-.@]+$").expect("safe identifier pattern should compile")
});

pub const MAX_TOOL_LEN: usize = 64;
pub const MAX_SUB_LEN: usize = 512;
pub const MAX_USR_LEN: usize = 255;
pub const MAX_GRP_LEN: usize = 255;

/// Character and length rules for launch identifiers. A violation is a client
/// error; values are never silently sanitized.
pub fn validate_identifier(value: &str, name: &str, max_length: usize) -> Result<String> {
    if value.is_empty() {
        return Err(LtiError::Validation(format!(
            "Missing required parameter: {name}"
        )));
    }

    let value = value.trim();

    if value.chars().count() > max_length {
        return Err(LtiError::Validation(format!(
            "Parameter '{name}' exceeds maximum length ({max_length})"
        )));
    }

    if !SAFE_ID.is_match(value) {
        return Err(LtiError::Validation(format!(
            "Parameter '{name}' contains invalid characters"
        )));
    }

    Ok(value.to_string())
}

/// Correlation key for a launch, echoed back by the tool as the POX
/// `sourcedId`. Deployed tools store and return it verbatim, so the format
/// is fixed even though underscore-bearing values can collide across field
/// splits.
pub fn source_id(usr: &str, grp: &str, sub: &str) -> String {
    format!("{usr}_{grp}_{sub}")
}

/// Validates the request, builds the launch action for the tool, and upserts
/// the launch context. The cache write happens before returning because an
/// outcome callback can arrive at any point up to the TTL; a failed write is
/// tolerated so a storage outage degrades outcome correlation instead of
/// blocking launches.
pub async fn prepare_launch(
    registry: &ToolRegistry,
    cache: &dyn LaunchCacheRepository,
    request: &LaunchRequest,
    outcome_service_url: &str,
    ttl_hours: i64,
) -> Result<PreparedLaunch> {
    let missing: Vec<&str> = [
        ("tool", request.tool.as_str()),
        ("sub", request.sub.as_str()),
        ("usr", request.usr.as_str()),
        ("grp", request.grp.as_str()),
    ]
    .iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(name, _)| *name)
    .collect();
    if !missing.is_empty() {
        return Err(LtiError::Validation(format!(
            "Missing required parameters: {}",
            missing.join(", ")
        )));
    }

    let tool_name = validate_identifier(&request.tool, "tool", MAX_TOOL_LEN)?;
    let sub = validate_identifier(&request.sub, "sub", MAX_SUB_LEN)?;
    let usr = validate_identifier(&request.usr, "usr", MAX_USR_LEN)?;
    let grp = validate_identifier(&request.grp, "grp", MAX_GRP_LEN)?;

    let config = match registry.lookup(&tool_name) {
        Some(config) if config.is_configured() => config,
        _ => {
            error!(
                tool = %tool_name,
                configured = ?registry.list_configured(),
                "launch requested for unconfigured tool"
            );
            let prefix = tool_name.to_uppercase();
            return Err(LtiError::Configuration(format!(
                "Tool '{tool_name}' not configured. \
                 Set env vars: {prefix}_KEY, {prefix}_SECRET, {prefix}_LAUNCH"
            )));
        }
    };

    let source_id = source_id(&usr, &grp, &sub);

    let (action, launch_url) = if config.is_paws_proxy {
        let url = mediated_url(config, &sub, &usr, &grp, request, outcome_service_url)?;
        (LaunchAction::Redirect { url: url.clone() }, url)
    } else {
        let launch_url = config.launch_url_for(&sub);
        let body = build_body(
            config,
            &BodyRequest {
                source_id: &source_id,
                usr: &usr,
                grp: &grp,
                sub: &sub,
                cid: &request.cid,
                outcome_service_url,
                step_explanation: request.step_explanation.as_deref(),
            },
        );
        let params = sign::sign(
            &body,
            &config.consumer_key,
            &config.consumer_secret,
            &launch_url,
        )?;
        (
            LaunchAction::Form {
                action: launch_url.clone(),
                params,
            },
            launch_url,
        )
    };

    let context = NewLaunchContext {
        source_id: source_id.clone(),
        tool: config.id.as_str().to_string(),
        usr,
        grp,
        sub,
        cid: request.cid.clone(),
        sid: request.sid.clone(),
        svc: request.svc.clone(),
        launch_url,
        module_id: request.module_id,
        expires_at: Utc::now() + Duration::hours(ttl_hours),
    };
    match cache.upsert(context).await {
        Ok(_) => info!(source_id = %source_id, ttl_hours, "launch context cached"),
        Err(e) => warn!(
            source_id = %source_id,
            error = %e,
            "failed to cache launch context; the outcome callback will miss"
        ),
    }

    Ok(PreparedLaunch {
        source_id,
        tool: config.id,
        action,
    })
}

/// Launch URL for a mediated tool: the platform URL with the identifiers as
/// query parameters. The platform signs the actual LTI POST itself and uses
/// `svc` to forward results back to our outcome endpoint.
fn mediated_url(
    config: &ToolConfig,
    sub: &str,
    usr: &str,
    grp: &str,
    request: &LaunchRequest,
    outcome_service_url: &str,
) -> Result<String> {
    let mut url = Url::parse(&config.launch_url).map_err(|e| {
        LtiError::Configuration(format!("invalid launch URL for '{}': {e}", config.id))
    })?;

    let paws_tool = config
        .paws_tool
        .unwrap_or_else(|| config.id.as_str().trim_start_matches("paws_"));

    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("tool", paws_tool);
        pairs.append_pair("sub", sub);
        pairs.append_pair("usr", usr);
        pairs.append_pair("grp", grp);
        if !request.cid.is_empty() {
            pairs.append_pair("cid", &request.cid);
        }
        if !request.sid.is_empty() {
            pairs.append_pair("sid", &request.sid);
        }
        let svc = if outcome_service_url.is_empty() {
            request.svc.as_str()
        } else {
            outcome_service_url
        };
        if !svc.is_empty() {
            pairs.append_pair("svc", svc);
        }
    }

    Ok(url.into())
}
