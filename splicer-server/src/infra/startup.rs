use std::time::Duration;

use chrono::Utc;
use splicer_core::database::ports::LaunchCacheRepository;
use tracing::{info, warn};

use crate::infra::app_state::AppState;

/// How often the background reaper sweeps expired launch contexts. Expired
/// rows are also dropped on read, so the sweep only bounds table growth.
const REAP_INTERVAL: Duration = Duration::from_secs(3600);

/// Spawns the hourly cache reaper. The first tick fires immediately, so a
/// restart clears whatever accumulated while the server was down.
pub fn spawn_cache_reaper(state: &AppState) {
    let cache = state.uow.launch_cache.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REAP_INTERVAL);
        loop {
            interval.tick().await;
            match cache.delete_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(deleted) => info!(deleted, "reaped expired launch contexts"),
                Err(e) => warn!(error = %e, "launch cache sweep failed"),
            }
        }
    });
}
