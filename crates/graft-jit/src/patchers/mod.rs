//! Built-in patchers.

pub mod monkey;
pub mod pointcut;
pub mod quit;
pub mod rebase;

pub use monkey::{CallKind, Monkey, ResolutionArgs, resolve};
pub use pointcut::Pointcut;
pub use quit::Quit;
pub use rebase::Rebase;

/// Names of the built-in patchers, in their default execution order.
pub const BUILTIN: &[&str] = &["monkey", "pointcut", "rebase", "quit"];
