//! Class-load interception for Graft.
//!
//! [`ClassLoadInterceptor`] answers class requests from the host runtime:
//! it resolves the declaring file, applies the namespace rules, and hands
//! back either the original file or a patched copy from the [`CacheStore`].
//!
//! ```rust,no_run
//! use graft_config::ConfigLoader;
//! use graft_interceptor::ClassLoadInterceptor;
//!
//! let config = ConfigLoader::new(".")?.resolve()?;
//! let mut interceptor = ClassLoadInterceptor::from_config(&config)?;
//! interceptor.install();
//! if let Some(outcome) = interceptor.load_class("App\\Service")? {
//!     println!("{} ({})", outcome.loaded.display(), outcome.status);
//! }
//! # Ok::<(), graft_core::Error>(())
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod filter;
pub mod interceptor;
pub mod locator;
pub mod watch;

pub use cache::{CacheStatus, CacheStore};
pub use filter::NamespaceFilter;
pub use interceptor::{ClassLoadInterceptor, LoadOutcome, LoadStatus, build_patchers};
pub use locator::Psr4Locator;
pub use watch::WatchSet;
