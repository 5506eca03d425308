//! Testing utilities for Graft.
//!
//! # Modules
//!
//! - [`fixtures`]: PHP sources for common scenarios
//! - [`assertions`]: File and cache directory assertions
//! - [`temp_project`]: Temporary project creation and management
//!
//! # Example
//!
//! ```rust,no_run
//! use graft_test_utils::temp_project::TempProject;
//!
//! let project = TempProject::new()
//!     .with_php_class("App\\Service")
//!     .with_graft_json()
//!     .build()
//!     .unwrap();
//! assert!(project.file_exists("src/Service.php"));
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod assertions;
pub mod fixtures;
pub mod temp_project;

/// Re-export commonly used testing utilities.
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::fixtures::Fixtures;
    pub use crate::temp_project::TempProject;

    pub use pretty_assertions::{assert_eq, assert_ne};
}
