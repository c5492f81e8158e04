//! Named per-tool behavior hooks.
//!
//! Tool special-casing lives here as a closed set of pure functions. Tool
//! configuration refers to a hook by variant, never by embedded code, so each
//! quirk is testable in isolation and the launch/outcome paths stay generic.

/// Rewrites a tool's base launch URL for a specific activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchUrlModifier {
    /// CTAT problem sets live under a per-activity path suffix.
    CtatProblemSet,
    /// OpenDSA exercises are selected by query string.
    OpendsaExercise,
    /// DBQA picks the query type via query string.
    DbqaQueryType,
}

impl LaunchUrlModifier {
    pub fn apply(self, launch_url: &str, sub: &str) -> String {
        match self {
            Self::CtatProblemSet => {
                format!("{}/mg_{sub}", launch_url.trim_end_matches('/'))
            }
            Self::OpendsaExercise => {
                format!("{launch_url}?custom_ex_settings=%7B%7D&custom_ex_short_name={sub}")
            }
            Self::DbqaQueryType => format!("{launch_url}?queryType={sub}"),
        }
    }
}

/// Rewrites the raw score string (and possibly `sub`) before UM forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreProcessor {
    /// CTAT reports fractional mastery but its UM registration expects binary
    /// completion: any positive score forwards as `1`, everything else
    /// (including unparseable input) as `0`.
    CtatBinary,
    /// DBQA activities are registered upstream under a `-lti` suffix.
    DbqaSuffix,
}

impl ScoreProcessor {
    pub fn apply(self, score: &str, sub: &str) -> (String, String) {
        match self {
            Self::CtatBinary => {
                let binary = match score.trim().parse::<f64>() {
                    Ok(value) if value > 0.0 => "1",
                    _ => "0",
                };
                (binary.to_string(), sub.to_string())
            }
            Self::DbqaSuffix => (score.to_string(), format!("{sub}-lti")),
        }
    }
}

/// Rewrites the UM activity label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActModifier {
    /// DBQA's UM activity label carries the same `-lti` suffix as its subs.
    DbqaSuffix,
}

impl ActModifier {
    pub fn apply(self, act: &str) -> String {
        match self {
            Self::DbqaSuffix => format!("{act}-lti"),
        }
    }
}
