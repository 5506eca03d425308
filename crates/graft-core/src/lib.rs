//! Core types and utilities for Graft.
//!
//! This crate provides foundational types used throughout Graft:
//! - Error types with codes and suggestions
//! - PHP literal and identifier helpers shared by the patchers and the
//!   class-load interceptor

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod php;

pub use error::{Error, ErrorCode, Result};
pub use php::{export_string, is_identifier, is_qualified_name};

// Re-export commonly used types
pub use ahash::{AHashMap, AHashSet};
pub use indexmap::IndexMap;
