//! Configuration error types with diagnostic support.

#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration error with rich diagnostic information.
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    #[diagnostic(
        code(config::not_found),
        help("create a graft.json in the project directory or set GRAFT_CONFIG")
    )]
    NotFound {
        /// File path.
        path: PathBuf,
    },

    /// JSON parsing error.
    #[error("invalid JSON in {path}: {message}")]
    #[diagnostic(code(config::invalid_json))]
    InvalidJson {
        /// File path.
        path: PathBuf,
        /// Error message.
        message: String,
        /// Line number (1-based).
        line: usize,
        /// Column number (1-based).
        column: usize,
    },

    /// Invalid value for a field.
    #[error("invalid value for '{field}': {message}")]
    #[diagnostic(code(config::invalid_value), help("{hint}"))]
    InvalidValue {
        /// Field name.
        field: String,
        /// Error message.
        message: String,
        /// Hint for fixing.
        hint: String,
    },

    /// Value out of allowed range.
    #[error("value out of range for '{field}': {value} (expected {min}..={max})")]
    #[diagnostic(code(config::out_of_range))]
    OutOfRange {
        /// Field name.
        field: String,
        /// Actual value.
        value: String,
        /// Minimum allowed.
        min: String,
        /// Maximum allowed.
        max: String,
    },

    /// IO error.
    #[error("IO error reading {path}: {message}")]
    #[diagnostic(code(config::io_error))]
    Io {
        /// File path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Environment variable error.
    #[error("invalid environment variable {var}: {message}")]
    #[diagnostic(code(config::env_error))]
    EnvError {
        /// Variable name.
        var: String,
        /// Error message.
        message: String,
    },

    /// Validation error with multiple issues.
    #[error("configuration validation failed with {count} error(s)")]
    #[diagnostic(code(config::validation_failed))]
    ValidationFailed {
        /// Number of errors.
        count: usize,
        /// Individual errors.
        errors: Vec<String>,
    },

    /// Permission denied.
    #[error("permission denied: {path}")]
    #[diagnostic(code(config::permission_denied), help("check file permissions"))]
    PermissionDenied {
        /// File path.
        path: PathBuf,
    },
}

impl ConfigError {
    /// Create an IO error with context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound { path };
        }
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied { path };
        }
        Self::Io {
            path,
            message: err.to_string(),
        }
    }

    /// Create a JSON parse error with location.
    #[must_use]
    pub fn json(path: impl Into<PathBuf>, err: &sonic_rs::Error) -> Self {
        Self::InvalidJson {
            path: path.into(),
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }

    /// Create an invalid value error.
    #[must_use]
    pub fn invalid_value(
        field: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an out of range error.
    #[must_use]
    pub fn out_of_range<T: std::fmt::Display>(
        field: impl Into<String>,
        value: T,
        min: T,
        max: T,
    ) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Create an environment variable error.
    #[must_use]
    pub fn env(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvError {
            var: var.into(),
            message: message.into(),
        }
    }

    /// Check if error is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Individual messages, one per problem.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::ValidationFailed { errors, .. } => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl From<ConfigError> for graft_core::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ValidationFailed { errors, .. } => Self::config(errors.join("; ")),
            other => Self::config(other.to_string()),
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_maps_not_found() {
        let err = ConfigError::io(
            "/nope/graft.json",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn validation_failure_lists_every_issue() {
        let err = ConfigError::ValidationFailed {
            count: 2,
            errors: vec!["prefix: bad".into(), "quit: bad".into()],
        };
        assert_eq!(err.messages().len(), 2);
        let core: graft_core::Error = err.into();
        assert_eq!(core.code(), graft_core::ErrorCode::E0501);
        assert!(core.to_string().contains("prefix: bad; quit: bad"));
    }

    #[test]
    fn invalid_json_names_the_file() {
        let err = sonic_rs::from_str::<sonic_rs::Value>("{\n  \"a\": ,\n}").unwrap_err();
        match ConfigError::json("graft.json", &err) {
            ConfigError::InvalidJson { path, message, .. } => {
                assert_eq!(path, PathBuf::from("graft.json"));
                assert!(!message.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
