//! The outcome endpoint. Remote tools treat any non-200 as a delivery
//! failure, so this handler always answers 200 and lets the POX body carry
//! the verdict.

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::infra::app_state::AppState;

pub async fn outcome(State(state): State<AppState>, body: Bytes) -> Response {
    let xml = state.processor.process(&body).await;
    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}
