//! Source tree, parser and patcher pipeline for Graft.
//!
//! A PHP file goes through three steps before the host runtime loads it:
//! - [`PhpParser`] cuts the source into a [`NodeTree`]
//! - [`Patchers`] runs each registered [`Patcher`] over the tree in order
//! - the tree is rendered back to text
//!
//! The built-in patchers live in [`patchers`]: call-site redirection
//! ([`Monkey`]), method entry hooks ([`Pointcut`]), path constant rebasing
//! ([`Rebase`]) and `exit`/`die` interception ([`Quit`]).

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod node;
pub mod parser;
pub mod patcher;
pub mod patchers;
pub mod scan;

pub use node::{Node, NodeId, NodeKind, NodeTree, Uses};
pub use parser::{PhpParser, SourceParser};
pub use patcher::{BacktraceOptions, ClassLocator, Frame, Patcher, Patchers};
pub use patchers::{Monkey, Pointcut, Quit, Rebase};
pub use scan::{BalanceScanner, ScanState};
