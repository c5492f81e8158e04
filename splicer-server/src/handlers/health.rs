use axum::{Json, extract::State};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use splicer_core::database::ports::{LaunchCacheRepository, OutcomeLogRepository};

use crate::errors::AppError;
use crate::infra::app_state::AppState;

/// Health and traffic snapshot: configured tools, live cache entries, and
/// the last day's outcome tallies.
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let now = Utc::now();
    let active = state.uow.launch_cache.count_active(now).await?;
    let outcomes = state
        .uow
        .outcome_log
        .counts_since(now - Duration::hours(24))
        .await?;

    Ok(Json(json!({
        "status": "ok",
        "configured_tools": state.registry.list_configured(),
        "active_cache_entries": active,
        "um_forwarding_enabled": state.config.forward_to_um,
        "um_service_url": state.config.um_service_url,
        "cache_ttl_hours": state.config.cache_ttl_hours,
        "outcomes_24h": {
            "success": outcomes.success,
            "failure": outcomes.failure,
            "total": outcomes.total(),
        },
    })))
}
