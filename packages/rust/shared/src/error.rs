//! Error types for keyplan.
//!
//! Library crates use [`KeyplanError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all keyplan operations.
#[derive(Debug, thiserror::Error)]
pub enum KeyplanError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure (connection refused, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// An upstream API answered with a non-success status.
    #[error("{service} responded with HTTP {status}. Message: {message}")]
    Provider {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// A response body did not have the expected shape.
    #[error("decode error: {message}")]
    Decode { message: String, raw: String },

    /// The generative collaborator produced no usable output.
    #[error("generation error: {0}")]
    Generation(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad arguments, unknown priority, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KeyplanError>;

impl KeyplanError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error, keeping the offending raw text for diagnosis.
    pub fn decode(msg: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
            raw: raw.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status carried by a provider error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = KeyplanError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = KeyplanError::validation("no group with priority 9");
        assert!(err.to_string().contains("priority 9"));
    }

    #[test]
    fn provider_error_includes_status_and_payload() {
        let err = KeyplanError::Provider {
            service: "metrics provider",
            status: 500,
            message: r#"{"code":"INTERNAL"}"#.into(),
        };
        let text = err.to_string();
        assert!(text.contains("HTTP 500"));
        assert!(text.contains("INTERNAL"));
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn decode_error_keeps_raw_text() {
        let err = KeyplanError::decode("expected a JSON array", "not json");
        match err {
            KeyplanError::Decode { raw, .. } => assert_eq!(raw, "not json"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }
}
