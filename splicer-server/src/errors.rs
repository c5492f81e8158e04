use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use splicer_core::LtiError;
use tracing::error;

/// Error type for the launch and health handlers.
///
/// Launch failures are reported to the browser as plain text with a 4xx
/// status; the outcome endpoint never uses this type because its contract is
/// an HTTP 200 with the failure encoded in the POX body.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

impl From<LtiError> for AppError {
    fn from(err: LtiError) -> Self {
        match &err {
            // Caller mistakes surface verbatim so the embedding page shows
            // what went wrong (unknown tool, missing parameters).
            LtiError::Validation(_) | LtiError::Configuration(_) => {
                Self::bad_request(err.detail().to_string())
            }
            _ => {
                error!(error = %err, "unexpected failure while handling request");
                Self::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_become_bad_requests() {
        let err: AppError =
            LtiError::Validation("Missing required LTI parameters: usr".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Missing required LTI parameters: usr");
    }

    #[test]
    fn configuration_errors_become_bad_requests() {
        let err: AppError =
            LtiError::Configuration("Tool 'quizgen' is not configured for LTI launch".to_string())
                .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Tool 'quizgen' is not configured for LTI launch");
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err: AppError = LtiError::Internal("pool exhausted".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }
}
