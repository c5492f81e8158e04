use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;

use sqlx::PgPool;

use crate::database::ports::{LaunchCacheRepository, OutcomeLogRepository, ProgressRepository};
use crate::database::postgres::{
    PostgresLaunchCacheRepository, PostgresOutcomeLogRepository, PostgresProgressRepository,
};

/// Aggregates the repository ports used by the launch and outcome services.
///
/// Fields are public so tests can swap individual ports for in-memory fakes
/// without a builder dance.
#[derive(Clone)]
pub struct LtiUnitOfWork {
    pub launch_cache: Arc<dyn LaunchCacheRepository>,
    pub outcome_log: Arc<dyn OutcomeLogRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl fmt::Debug for LtiUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LtiUnitOfWork")
            .field("launch_cache", &type_name_of_val(self.launch_cache.as_ref()))
            .field("outcome_log", &type_name_of_val(self.outcome_log.as_ref()))
            .field("progress", &type_name_of_val(self.progress.as_ref()))
            .finish()
    }
}

impl LtiUnitOfWork {
    /// Compose all Postgres-backed repositories over one pool.
    pub fn from_postgres(pool: PgPool) -> Self {
        Self {
            launch_cache: Arc::new(PostgresLaunchCacheRepository::new(pool.clone())),
            outcome_log: Arc::new(PostgresOutcomeLogRepository::new(pool.clone())),
            progress: Arc::new(PostgresProgressRepository::new(pool)),
        }
    }
}
