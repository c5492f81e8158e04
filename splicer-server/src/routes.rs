//! Route table and the layers around it.

use std::any::Any;

use axum::{
    Router,
    body::Body,
    http::{StatusCode, header},
    response::Response,
    routing::{get, post},
};
use splicer_core::outcome::render_response;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::error;

use crate::handlers::{health, launch, outcome};
use crate::infra::app_state::AppState;

/// Builds the application router. Unregistered methods on these paths get
/// axum's automatic 405.
///
/// Only the outcome route carries the panic layer: its contract is
/// always-200-with-POX, which even a handler panic must not break. The other
/// routes may keep the default 500 behavior.
pub fn create_router(state: AppState) -> Router {
    let outcome_routes = Router::new()
        .route("/lti/outcome", post(outcome::outcome))
        .layer(CatchPanicLayer::custom(pox_panic_response));

    Router::new()
        .route("/lti/launch", get(launch::launch))
        .route("/lti/health", get(health::health))
        .merge(outcome_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn pox_panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    error!(panic = %detail, "outcome handler panicked");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/xml")
        .body(Body::from(render_response(
            false,
            "Internal server error",
            None,
        )))
        .expect("static panic response should build")
}
