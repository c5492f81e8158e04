use std::{fmt, sync::Arc};

use splicer_core::application::LtiUnitOfWork;
use splicer_core::outcome::OutcomeProcessor;
use splicer_core::tools::ToolRegistry;

use crate::config::Config;

/// Shared handler state. Everything here is immutable after startup; the
/// mutable state (cache, log, progress) lives behind the unit of work.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<ToolRegistry>,
    pub uow: LtiUnitOfWork,
    pub processor: Arc<OutcomeProcessor>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<ToolRegistry>,
        uow: LtiUnitOfWork,
        processor: Arc<OutcomeProcessor>,
    ) -> Self {
        Self {
            config,
            registry,
            uow,
            processor,
        }
    }
}
