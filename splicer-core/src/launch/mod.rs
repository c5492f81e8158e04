//! Launch-side protocol: per-tool body construction, OAuth 1.0 signing, and
//! orchestration of a validated request into a form or redirect action.

pub mod body;
pub mod orchestrator;
pub mod sign;

pub use body::{BodyRequest, LaunchParams, base_body, build_body};
pub use orchestrator::{
    LaunchAction, LaunchRequest, PreparedLaunch, prepare_launch, source_id, validate_identifier,
};
pub use sign::sign;
