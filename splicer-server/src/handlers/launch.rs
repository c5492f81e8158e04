//! The launch endpoint: query parameters in, an auto-submitting signed form
//! (direct tools) or a redirect (mediated tools) out.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use splicer_core::launch::{LaunchAction, LaunchParams, LaunchRequest, prepare_launch};
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::infra::app_state::AppState;

/// Sent on every successful launch so the page can live in the host LMS
/// iframe but nowhere else.
const CSP_FRAME_ANCESTORS: &str = "frame-ancestors 'self'";

/// Raw query parameters. Everything is a string here; validation and typing
/// happen in `prepare_launch` so the error messages list all missing
/// parameters at once instead of failing on the first.
#[derive(Debug, Deserialize)]
pub struct LaunchQuery {
    #[serde(default)]
    tool: String,
    #[serde(default)]
    sub: String,
    #[serde(default)]
    usr: String,
    #[serde(default)]
    grp: String,
    #[serde(default)]
    cid: String,
    #[serde(default)]
    sid: String,
    #[serde(default)]
    svc: String,
    module_id: Option<String>,
    step_explanation: Option<String>,
}

pub async fn launch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LaunchQuery>,
) -> Result<Response, AppError> {
    let request = LaunchRequest {
        tool: query.tool,
        sub: query.sub,
        usr: query.usr,
        grp: query.grp,
        cid: query.cid,
        sid: query.sid,
        svc: query.svc,
        module_id: parse_module_id(query.module_id.as_deref()),
        step_explanation: query.step_explanation,
    };

    let secure = request_is_secure(&state.config, &headers);
    let outcome_url = outcome_service_url(&state.config, &headers, secure);

    let prepared = prepare_launch(
        &state.registry,
        state.uow.launch_cache.as_ref(),
        &request,
        &outcome_url,
        state.config.cache_ttl_hours,
    )
    .await?;

    info!(
        tool = %prepared.tool,
        source_id = %prepared.source_id,
        outcome_url = %outcome_url,
        "launch prepared"
    );

    let mut response = match &prepared.action {
        LaunchAction::Redirect { url } => {
            // A mediated tool on plain http inside an https page would be
            // blocked as mixed content, so route it through the deployment's
            // http proxy path instead.
            if secure && url.starts_with("http://") {
                let proxied = url.replacen("http://", "/proxy/http/", 1);
                info!(url = %proxied, "mediated tool is plain http; redirecting via proxy");
                Redirect::to(&proxied).into_response()
            } else {
                Redirect::to(url).into_response()
            }
        }
        LaunchAction::Form { action, params } => {
            if secure && action.starts_with("http://") {
                warn!(
                    action = %action,
                    "mixed content: http tool launched from https context, browser may block"
                );
            }
            Html(auto_submit_form(action, params)).into_response()
        }
    };

    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CSP_FRAME_ANCESTORS),
    );
    Ok(response)
}

/// A bad module id only disables local progress tracking, so it degrades to
/// `None` instead of failing the launch.
fn parse_module_id(raw: Option<&str>) -> Option<i64> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(module_id = %raw, "ignoring unparseable module_id");
            None
        }
    }
}

/// Effective request scheme. `X-Forwarded-Proto` counts only when the
/// operator has said there is a proxy in front; otherwise the configured
/// public base URL decides.
fn request_is_secure(config: &Config, headers: &HeaderMap) -> bool {
    if config.trust_proxy_headers {
        if let Some(proto) = headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
        {
            return proto.eq_ignore_ascii_case("https");
        }
    }
    config
        .public_base_url
        .as_deref()
        .is_some_and(|base| base.starts_with("https://"))
}

/// Absolute URL the tool will POST outcomes back to. `PUBLIC_BASE_URL` wins
/// when set; otherwise the URL is rebuilt from the request's Host header.
fn outcome_service_url(config: &Config, headers: &HeaderMap, secure: bool) -> String {
    if let Some(base) = config.public_base_url.as_deref() {
        return format!("{base}/lti/outcome");
    }
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let scheme = if secure { "https" } else { "http" };
    format!("{scheme}://{host}/lti/outcome")
}

/// Minimal page that POSTs the signed parameters the moment it loads. The
/// noscript button keeps the launch usable without JavaScript.
fn auto_submit_form(action: &str, params: &LaunchParams) -> String {
    let mut inputs = String::new();
    for (name, value) in params {
        inputs.push_str(&format!(
            "      <input type=\"hidden\" name=\"{}\" value=\"{}\">\n",
            escape_attr(name),
            escape_attr(value)
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Launching tool...</title>
  </head>
  <body onload="document.getElementById('lti-launch-form').submit()">
    <form id="lti-launch-form" action="{}" method="post">
{}      <noscript>
        <button type="submit">Press to Launch</button>
      </noscript>
    </form>
  </body>
</html>
"#,
        escape_attr(action),
        inputs
    )
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
