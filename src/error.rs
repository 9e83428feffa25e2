//! Error types for the extip controller

use thiserror::Error;

/// Main error type for extip operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error for configuration or resource contents
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_carries_message() {
        let err = Error::validation("mask '42' exceeds 32 bits");
        assert!(err.to_string().contains("validation error"));
        assert!(err.to_string().contains("42"));

        match Error::validation("any message") {
            Error::Validation(msg) => assert_eq!(msg, "any message"),
            _ => panic!("Expected Validation variant"),
        }
    }

    #[test]
    fn validation_error_accepts_string_and_str() {
        let dynamic = format!("mask '{}' is not a number", "abc");
        assert!(Error::validation(dynamic).to_string().contains("abc"));
        assert!(Error::validation("static").to_string().contains("static"));
    }
}
