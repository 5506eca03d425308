//! Execution context shared by all commands.

use anyhow::{Context as _, Result};
use graft_config::{CliOverrides, ConfigLoader, ResolvedConfig};
use std::path::PathBuf;
use tracing::debug;

/// Global arguments that shape the context.
#[derive(Debug, Clone, Default)]
pub struct ContextArgs {
    pub working_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub cache_path: Option<PathBuf>,
    pub clear_cache: bool,
    pub prefix: Option<String>,
}

/// Resolved project directory and configuration.
#[derive(Debug)]
pub struct Context {
    pub project_dir: PathBuf,
    pub config: ResolvedConfig,
}

impl Context {
    /// Load the configuration for the selected project.
    pub fn new(args: &ContextArgs) -> Result<Self> {
        let project_dir = match &args.working_dir {
            Some(dir) => dir
                .canonicalize()
                .with_context(|| format!("Working directory not found: {}", dir.display()))?,
            None => std::env::current_dir().context("Cannot determine current directory")?,
        };

        let overrides = CliOverrides {
            config_file: args.config.clone(),
            cache_path: args.cache_path.clone(),
            clear_cache: args.clear_cache.then_some(true),
            persistent: None,
            prefix: args.prefix.clone(),
        };
        let config = ConfigLoader::new(&project_dir)?
            .with_overrides(overrides)
            .resolve()?;

        debug!(project = %project_dir.display(), "context ready");
        Ok(Self {
            project_dir,
            config,
        })
    }

    /// Resolve a user-supplied path against the project directory.
    pub fn resolve(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}
