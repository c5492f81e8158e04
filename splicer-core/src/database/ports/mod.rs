//! Repository ports for the engine's durable state. Implementations live in
//! the Postgres adapter under [`crate::database::postgres`]; tests substitute
//! in-memory fakes.

pub mod launch_cache;
pub mod outcome_log;
pub mod progress;

pub use launch_cache::{LaunchCacheRepository, LaunchContext, NewLaunchContext};
pub use outcome_log::{NewOutcomeLog, OutcomeCounts, OutcomeLogRepository};
pub use progress::{ProgressRepository, ProgressUpdate};
