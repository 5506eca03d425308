//! Error types for Graft operations.
//!
//! Each error has:
//! - A unique error code (e.g., E0201) for easy reference and searching
//! - A clear error message explaining what went wrong
//! - Suggestions for how to fix the issue
//!
//! Unresolvable classes are not errors: lookups return `None`. Call sites the
//! rewriter cannot balance are not errors either: they are left untouched.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error codes for Graft errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Source errors (E01xx)
    /// Source is not valid UTF-8
    E0101,
    /// Source tree is structurally invalid
    E0102,

    // Pipeline errors (E02xx)
    /// A patcher failed while rewriting a file
    E0201,
    /// Unknown patcher name
    E0202,

    // Cache errors (E03xx)
    /// Cache directory could not be created
    E0301,
    /// Cache file could not be written
    E0302,
    /// Cache could not be cleared
    E0303,

    // IO errors (E04xx)
    /// File not found
    E0401,
    /// Permission denied
    E0402,
    /// Other IO failure
    E0403,

    // Configuration errors (E05xx)
    /// Invalid configuration
    E0501,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::E0101 => "E0101",
            Self::E0102 => "E0102",
            Self::E0201 => "E0201",
            Self::E0202 => "E0202",
            Self::E0301 => "E0301",
            Self::E0302 => "E0302",
            Self::E0303 => "E0303",
            Self::E0401 => "E0401",
            Self::E0402 => "E0402",
            Self::E0403 => "E0403",
            Self::E0501 => "E0501",
        }
    }

    /// Get a brief title for this error code.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::E0101 => "Invalid source encoding",
            Self::E0102 => "Invalid source tree",
            Self::E0201 => "Patcher failed",
            Self::E0202 => "Unknown patcher",
            Self::E0301 => "Cache directory not creatable",
            Self::E0302 => "Cache not writable",
            Self::E0303 => "Cache not clearable",
            Self::E0401 => "File not found",
            Self::E0402 => "Permission denied",
            Self::E0403 => "IO error",
            Self::E0501 => "Invalid configuration",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for Graft.
#[derive(Error, Debug)]
pub enum Error {
    /// Source could not be turned into a node tree.
    #[error("[{code}] cannot parse {}: {message}", display_path(.path.as_deref()))]
    Parse {
        /// Error code.
        code: ErrorCode,
        /// Source file, when known.
        path: Option<PathBuf>,
        /// Error message.
        message: String,
        /// Suggestions for fixing.
        suggestions: Vec<String>,
    },

    /// A patcher aborted the pipeline.
    #[error("[{code}] patcher '{patcher}' failed on {}: {message}", display_path(.path.as_deref()))]
    Patcher {
        /// Error code.
        code: ErrorCode,
        /// Registered patcher name.
        patcher: String,
        /// Source file, when known.
        path: Option<PathBuf>,
        /// Error message.
        message: String,
        /// Suggestions for fixing.
        suggestions: Vec<String>,
    },

    /// Cache error.
    #[error("[{code}] cache error at {path}: {message}")]
    Cache {
        /// Error code.
        code: ErrorCode,
        /// Cache path involved.
        path: PathBuf,
        /// Error message.
        message: String,
        /// Suggestions for fixing.
        suggestions: Vec<String>,
    },

    /// IO error.
    #[error("[{code}] io error at {path}: {message}")]
    Io {
        /// Error code.
        code: ErrorCode,
        /// File path.
        path: PathBuf,
        /// Error message.
        message: String,
        /// Suggestions for fixing.
        suggestions: Vec<String>,
    },

    /// Configuration error.
    #[error("[{code}] config error: {message}")]
    Config {
        /// Error code.
        code: ErrorCode,
        /// Error message.
        message: String,
        /// Configuration key.
        key: Option<String>,
        /// Suggestions for fixing.
        suggestions: Vec<String>,
    },
}

fn display_path(path: Option<&Path>) -> String {
    path.map_or_else(|| "<memory>".to_string(), |p| p.display().to_string())
}

impl Error {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Parse { code, .. }
            | Self::Patcher { code, .. }
            | Self::Cache { code, .. }
            | Self::Io { code, .. }
            | Self::Config { code, .. } => *code,
        }
    }

    /// Get suggestions for fixing this error.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::Parse { suggestions, .. }
            | Self::Patcher { suggestions, .. }
            | Self::Cache { suggestions, .. }
            | Self::Io { suggestions, .. }
            | Self::Config { suggestions, .. } => suggestions,
        }
    }

    /// Source file the error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Parse { path, .. } | Self::Patcher { path, .. } => path.as_deref(),
            Self::Cache { path, .. } | Self::Io { path, .. } => Some(path),
            Self::Config { .. } => None,
        }
    }

    /// Create an IO error with context.
    #[must_use]
    #[allow(clippy::needless_pass_by_value)]
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let (code, suggestions) = match err.kind() {
            std::io::ErrorKind::NotFound => (
                ErrorCode::E0401,
                vec![format!("Check if the path exists: {}", path.display())],
            ),
            std::io::ErrorKind::PermissionDenied => (
                ErrorCode::E0402,
                vec![
                    format!("Check permissions on: {}", path.display()),
                    "On Unix, check file ownership with 'ls -la'".to_string(),
                ],
            ),
            _ => (
                ErrorCode::E0403,
                vec![format!("Check the file: {}", path.display())],
            ),
        };
        Self::Io {
            code,
            path,
            message: err.to_string(),
            suggestions,
        }
    }

    /// Create a parse error.
    #[must_use]
    pub fn parse(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            code: ErrorCode::E0101,
            path,
            message: message.into(),
            suggestions: vec![
                "Make sure the file is UTF-8 encoded PHP source".to_string(),
                "Exclude the namespace from patching if the file is generated".to_string(),
            ],
        }
    }

    /// Create an error for a tree that violates the parser contract.
    #[must_use]
    pub fn invalid_tree(message: impl Into<String>) -> Self {
        Self::Parse {
            code: ErrorCode::E0102,
            path: None,
            message: message.into(),
            suggestions: vec!["Report this issue with the source file attached".to_string()],
        }
    }

    /// Create a pipeline failure for the named patcher.
    #[must_use]
    pub fn patcher(
        patcher: impl Into<String>,
        path: Option<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        let patcher = patcher.into();
        Self::Patcher {
            code: ErrorCode::E0201,
            suggestions: vec![
                format!("Remove '{patcher}' from the 'patchers' list to isolate the failure"),
                "Add the class namespace to 'exclude' to load it unpatched".to_string(),
            ],
            patcher,
            path,
            message: message.into(),
        }
    }

    /// Create an unknown patcher error.
    #[must_use]
    pub fn unknown_patcher(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Patcher {
            code: ErrorCode::E0202,
            suggestions: vec![
                "Known patchers: monkey, pointcut, rebase, quit".to_string(),
            ],
            message: format!("no patcher registered under '{name}'"),
            patcher: name,
            path: None,
        }
    }

    /// Create a cache write failure.
    #[must_use]
    pub fn cache_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::cache(ErrorCode::E0302, path, message)
    }

    /// Create a cache directory failure.
    #[must_use]
    pub fn cache_dir(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::cache(ErrorCode::E0301, path, message)
    }

    /// Create a cache clearing failure.
    #[must_use]
    pub fn cache_clear(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::cache(ErrorCode::E0303, path, message)
    }

    fn cache(code: ErrorCode, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        let path = path.into();
        Self::Cache {
            code,
            suggestions: vec![
                format!("Check permissions on the cache directory: {}", path.display()),
                "Verify disk space is available".to_string(),
                "Point 'cache-path' (or GRAFT_CACHE_DIR) to a writable directory".to_string(),
            ],
            path,
            message: message.into(),
        }
    }

    /// Create a simple config error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::E0501,
            message: message.into(),
            key: None,
            suggestions: vec!["Check your graft.json for errors".to_string()],
        }
    }

    /// Attach the source path to a pipeline or parse error that lacks one.
    #[must_use]
    pub fn with_path(mut self, source: &Path) -> Self {
        match &mut self {
            Self::Parse { path, .. } | Self::Patcher { path, .. } if path.is_none() => {
                *path = Some(source.to_path_buf());
            }
            _ => {}
        }
        self
    }

    /// Format the error with suggestions for display.
    #[must_use]
    pub fn display_with_suggestions(&self) -> String {
        let mut output = format!("{self}");
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\n\nSuggestions:");
            for suggestion in suggestions {
                output.push_str(&format!("\n  • {suggestion}"));
            }
        }
        output
    }
}

/// Result type for Graft operations.
pub type Result<T> = std::result::Result<T, Error>;
