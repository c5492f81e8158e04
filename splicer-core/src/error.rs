use thiserror::Error;

#[derive(Error, Debug)]
pub enum LtiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LtiError {
    /// The variant's message without the category prefix `Display` adds.
    /// Used where the text is sent to a remote party verbatim, e.g. launch
    /// 400 bodies and POX failure descriptions.
    pub fn detail(&self) -> &str {
        match self {
            LtiError::Validation(msg)
            | LtiError::Configuration(msg)
            | LtiError::Protocol(msg)
            | LtiError::Upstream(msg)
            | LtiError::Internal(msg) => msg,
        }
    }
}

pub type Result<T> = std::result::Result<T, LtiError>;
