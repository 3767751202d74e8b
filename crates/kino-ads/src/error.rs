//! Error types for Kino Ads
//!
//! The ad state machine itself never fails; out-of-order signals are
//! absorbed as no-ops. Errors only surface at the edges: parsing signal
//! names, loading configuration and reading scenario scripts.

use thiserror::Error;

/// Result type alias for ad framework operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ad framework error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown signal: {0}")]
    UnknownSignal(String),

    #[error("Unknown ad state: {0}")]
    UnknownState(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid scenario: {0}")]
    Scenario(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a scenario error
    pub fn scenario(msg: impl Into<String>) -> Self {
        Error::Scenario(msg.into())
    }

    /// Returns the error code for logs and CLI output
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::UnknownSignal(_) => "UNKNOWN_SIGNAL",
            Error::UnknownState(_) => "UNKNOWN_STATE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Scenario(_) => "SCENARIO",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::UnknownSignal("x".into()).error_code(), "UNKNOWN_SIGNAL");
        assert_eq!(Error::scenario("bad step").error_code(), "SCENARIO");
        assert_eq!(
            Error::InvalidConfig("zero delay".into()).to_string(),
            "Invalid configuration: zero delay"
        );
    }
}
