//! Configuration validation with descriptive errors.

use crate::error::{ConfigError, Result};
use crate::types::ResolvedConfig;
use graft_core::{is_identifier, is_qualified_name};
use graft_jit::patchers::BUILTIN;

/// Validation severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Warning (may indicate issues).
    Warning,
    /// Error (must be fixed).
    Error,
}

/// Validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity level.
    pub severity: Severity,
    /// Issue code for programmatic handling.
    pub code: &'static str,
    /// Configuration key.
    pub field: String,
    /// Human-readable message.
    pub message: String,
    /// Suggested fix.
    pub hint: Option<String>,
}

impl ValidationIssue {
    /// Create a new error.
    #[must_use]
    pub fn error(code: &'static str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            field: field.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Create a new warning.
    #[must_use]
    pub fn warning(
        code: &'static str,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            field: field.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Add a hint to the issue.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Validation result containing all issues.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// All validation issues.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Check if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Get error count.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Warnings, for logging.
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Convert to result, failing if there are errors.
    pub fn into_result(self) -> Result<()> {
        if self.has_errors() {
            let errors: Vec<String> = self
                .issues
                .iter()
                .filter(|i| i.severity == Severity::Error)
                .map(|i| format!("{}: {}", i.field, i.message))
                .collect();
            return Err(ConfigError::ValidationFailed {
                count: errors.len(),
                errors,
            });
        }
        Ok(())
    }
}

/// Check a resolved configuration, collecting every issue.
#[must_use]
pub fn validate_config(config: &ResolvedConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !is_identifier(&config.prefix) {
        result.add(
            ValidationIssue::error(
                "invalid-prefix",
                "prefix",
                format!("'{}' is not a PHP identifier", config.prefix),
            )
            .with_hint("use letters, digits and underscores, not starting with a digit"),
        );
    }

    if config.max_scan_nodes == 0 {
        result.add(
            ValidationIssue::error("out-of-range", "max-scan-nodes", "must be at least 1")
                .with_hint("the default is 64"),
        );
    }

    if config.mtime_epsilon_ms == 0 {
        result.add(
            ValidationIssue::error("out-of-range", "mtime-epsilon-ms", "must be at least 1")
                .with_hint("use 1000 on filesystems with one-second timestamps"),
        );
    }

    for (field, class) in [
        ("resolver", &config.resolver),
        ("pointcut", &config.pointcut),
        ("quit", &config.quit),
    ] {
        if !is_qualified_name(class) {
            result.add(ValidationIssue::error(
                "invalid-class",
                field,
                format!("'{class}' is not a namespace-qualified class name"),
            ));
        }
    }

    let mut seen = Vec::with_capacity(config.patchers.len());
    for name in &config.patchers {
        if !BUILTIN.contains(&name.as_str()) {
            result.add(
                ValidationIssue::error(
                    "unknown-patcher",
                    "patchers",
                    format!("unknown patcher '{name}'"),
                )
                .with_hint(format!("known patchers: {}", BUILTIN.join(", "))),
            );
        } else if seen.contains(&name) {
            result.add(ValidationIssue::warning(
                "duplicate-patcher",
                "patchers",
                format!("'{name}' is listed more than once"),
            ));
        }
        seen.push(name);
    }

    for (field, prefixes) in [("include", &config.include), ("exclude", &config.exclude)] {
        for prefix in prefixes {
            if prefix != "*" && prefix.contains('/') {
                result.add(
                    ValidationIssue::error(
                        "invalid-namespace",
                        field,
                        format!("'{prefix}' looks like a path, not a namespace prefix"),
                    )
                    .with_hint("namespace prefixes use backslashes, e.g. \"App\\\\\""),
                );
            }
        }
    }
    if config.include.is_empty() {
        result.add(ValidationIssue::warning(
            "nothing-included",
            "include",
            "no namespace will be patched",
        ));
    }

    for prefix in config.psr4.keys() {
        if !prefix.is_empty() && !prefix.ends_with('\\') {
            result.add(
                ValidationIssue::error(
                    "invalid-psr4-prefix",
                    "psr-4",
                    format!("prefix '{prefix}' must end with a namespace separator"),
                )
                .with_hint(format!("use \"{prefix}\\\\\"")),
            );
        }
    }

    for path in &config.watch {
        if !path.exists() {
            result.add(ValidationIssue::warning(
                "missing-watch",
                "watch",
                format!("watched file does not exist: {}", path.display()),
            ));
        }
    }

    result
}
