//! Configuration for Graft.
//!
//! [`ConfigLoader`] merges built-in defaults, the project's `graft.json`,
//! `GRAFT_*` environment variables and command-line overrides into a
//! [`ResolvedConfig`], then validates the result.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod env;
pub mod error;
pub mod loader;
pub mod types;
pub mod validate;

pub use env::{EnvConfig, GraftEnvVar};
pub use error::{ConfigError, Result};
pub use loader::{CONFIG_FILE, CliOverrides, ConfigLoader};
pub use types::{DEFAULT_MTIME_EPSILON_MS, GraftConfig, Psr4Paths, ResolvedConfig};
pub use validate::{Severity, ValidationIssue, ValidationResult, validate_config};
