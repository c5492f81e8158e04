use async_trait::async_trait;

use crate::error::Result;

/// Result of merging a reported score into the progress store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// The score beat the stored one and the row changed.
    Applied,
    /// A row exists but already holds an equal or better score.
    NotBetter,
    /// No row to update. Preview launches never create one.
    Missing,
}

impl ProgressUpdate {
    pub fn applied(&self) -> bool {
        matches!(self, ProgressUpdate::Applied)
    }
}

/// Store of per-module progress records, keyed by (user, module, course
/// instance). The LTI engine only ever improves a record: a lower score than
/// the stored one is dropped, which makes redelivered outcomes harmless.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Merge `score` (normalized 0.0..=1.0) into the row for (`user_id`,
    /// `module_id`).
    ///
    /// With a course instance the row is created on first outcome; without
    /// one only an existing row is updated. An applied merge stores the score
    /// as a percentage, sets the progress fraction, derives completion
    /// (score >= 1.0) and success (score >= 0.7) flags, and increments the
    /// attempt counter. The compare-and-update must be a single atomic
    /// statement so concurrent deliveries cannot regress the stored score.
    async fn merge_score(
        &self,
        user_id: i64,
        module_id: i64,
        course_instance_id: Option<i64>,
        score: f64,
    ) -> Result<ProgressUpdate>;
}

/// Score threshold above which a module counts as successfully passed.
pub const SUCCESS_THRESHOLD: f64 = 0.7;

/// Derived flags for a normalized score, shared by every store implementation.
pub fn derive_flags(score: f64) -> (bool, bool) {
    (score >= 1.0, score >= SUCCESS_THRESHOLD)
}
