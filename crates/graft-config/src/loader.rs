//! Configuration loader with layered merging.

use crate::env::EnvConfig;
use crate::error::{ConfigError, Result};
use crate::types::{GraftConfig, ResolvedConfig};
use crate::validate::validate_config;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default configuration file name, looked up in the project directory.
pub const CONFIG_FILE: &str = "graft.json";

/// Values given on the command line. They win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Explicit configuration file.
    pub config_file: Option<PathBuf>,
    /// Cache root.
    pub cache_path: Option<PathBuf>,
    /// Clear the cache on start.
    pub clear_cache: Option<bool>,
    /// Keep the cache on exit.
    pub persistent: Option<bool>,
    /// Variable prefix.
    pub prefix: Option<String>,
}

/// Configuration loader.
#[derive(Debug)]
pub struct ConfigLoader {
    project_dir: PathBuf,
    env: EnvConfig,
    cli: CliOverrides,
}

impl ConfigLoader {
    /// Loader for `project_dir` reading the process environment.
    pub fn new(project_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::with_env(project_dir, EnvConfig::from_env()?))
    }

    /// Loader using an explicit environment layer.
    #[must_use]
    pub fn with_env(project_dir: impl Into<PathBuf>, env: EnvConfig) -> Self {
        Self {
            project_dir: project_dir.into(),
            env,
            cli: CliOverrides::default(),
        }
    }

    /// Apply command-line overrides on top of everything else.
    #[must_use]
    pub fn with_overrides(mut self, cli: CliOverrides) -> Self {
        self.cli = cli;
        self
    }

    /// Project directory.
    #[must_use]
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Configuration file to read and whether it was named explicitly.
    #[must_use]
    pub fn config_path(&self) -> (PathBuf, bool) {
        match self.cli.config_file.as_ref().or(self.env.config.as_ref()) {
            Some(path) => (self.resolve_path(path), true),
            None => (self.project_dir.join(CONFIG_FILE), false),
        }
    }

    /// Read a configuration file.
    pub fn load_file(path: &Path) -> Result<GraftConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        sonic_rs::from_str(&content).map_err(|e| ConfigError::json(path, &e))
    }

    /// Project layer. A missing default file is not an error, a missing
    /// explicitly named one is.
    fn load_project(&self) -> Result<Option<GraftConfig>> {
        let (path, explicit) = self.config_path();
        match Self::load_file(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded configuration file");
                Ok(Some(config))
            }
            Err(e) if e.is_not_found() && !explicit => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Build resolved configuration by merging all sources, then validate it.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let mut resolved = ResolvedConfig::for_project(&self.project_dir);

        if let Some(project) = self.load_project()? {
            self.apply_config(&mut resolved, &project);
        }
        self.apply_env(&mut resolved);
        self.apply_cli(&mut resolved);

        let validation = validate_config(&resolved);
        for issue in validation.warnings() {
            warn!(field = %issue.field, code = issue.code, "{}", issue.message);
        }
        validation.into_result()?;

        debug!(
            cache = %resolved.cache_path.display(),
            patchers = ?resolved.patchers,
            "configuration resolved"
        );
        Ok(resolved)
    }

    /// Apply a configuration file layer.
    pub fn apply_config(&self, resolved: &mut ResolvedConfig, config: &GraftConfig) {
        if let Some(ref include) = config.include {
            resolved.include = include.clone();
        }
        if let Some(ref exclude) = config.exclude {
            resolved.exclude = exclude.clone();
        }
        if let Some(ref cache) = config.cache_path {
            resolved.cache_path = self.resolve_path(Path::new(cache));
        }
        if let Some(clear) = config.clear_cache {
            resolved.clear_cache = clear;
        }
        if let Some(ref watch) = config.watch {
            resolved.watch = watch
                .iter()
                .map(|p| self.resolve_path(Path::new(p)))
                .collect();
        }
        if let Some(persistent) = config.persistent {
            resolved.persistent = persistent;
        }
        if let Some(ref prefix) = config.prefix {
            resolved.prefix = prefix.clone();
        }
        if let Some(max) = config.max_scan_nodes {
            resolved.max_scan_nodes = max;
        }
        if let Some(epsilon) = config.mtime_epsilon_ms {
            resolved.mtime_epsilon_ms = epsilon;
        }
        if let Some(ref resolver) = config.resolver {
            resolved.resolver = resolver.clone();
        }
        if let Some(ref pointcut) = config.pointcut {
            resolved.pointcut = pointcut.clone();
        }
        if let Some(ref quit) = config.quit {
            resolved.quit = quit.clone();
        }
        if let Some(ref psr4) = config.psr4 {
            resolved.psr4 = psr4
                .iter()
                .map(|(prefix, dirs)| {
                    let dirs = dirs
                        .to_vec()
                        .iter()
                        .map(|d| self.resolve_path(Path::new(d)))
                        .collect();
                    (prefix.clone(), dirs)
                })
                .collect();
        }
        if let Some(ref patchers) = config.patchers {
            resolved.patchers = patchers.clone();
        }
    }

    fn apply_env(&self, resolved: &mut ResolvedConfig) {
        if let Some(ref cache) = self.env.cache_dir {
            resolved.cache_path = self.resolve_path(cache);
        }
        if let Some(clear) = self.env.clear_cache {
            resolved.clear_cache = clear;
        }
        if let Some(persistent) = self.env.persistent {
            resolved.persistent = persistent;
        }
        if let Some(ref prefix) = self.env.prefix {
            resolved.prefix = prefix.clone();
        }
        if let Some(ref include) = self.env.include {
            resolved.include = include.clone();
        }
        if let Some(ref exclude) = self.env.exclude {
            resolved.exclude = exclude.clone();
        }
    }

    fn apply_cli(&self, resolved: &mut ResolvedConfig) {
        if let Some(ref cache) = self.cli.cache_path {
            resolved.cache_path = self.resolve_path(cache);
        }
        if let Some(clear) = self.cli.clear_cache {
            resolved.clear_cache = clear;
        }
        if let Some(persistent) = self.cli.persistent {
            resolved.persistent = persistent;
        }
        if let Some(ref prefix) = self.cli.prefix {
            resolved.prefix = prefix.clone();
        }
    }

    /// Resolve `path` against the project directory.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn project(json: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), json).unwrap();
        dir
    }

    #[test]
    fn missing_default_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::with_env(dir.path(), EnvConfig::default())
            .resolve()
            .unwrap();
        assert_eq!(config.project_dir, dir.path());
        assert_eq!(config.include, vec!["*"]);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let env = EnvConfig {
            config: Some("custom.json".into()),
            ..EnvConfig::default()
        };
        let err = ConfigLoader::with_env(dir.path(), env).resolve().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn project_file_resolves_relative_paths() {
        let dir = project(
            r#"{ "cache-path": "var/graft", "watch": ["graft.json"], "psr-4": { "App\\": "src" } }"#,
        );
        let config = ConfigLoader::with_env(dir.path(), EnvConfig::default())
            .resolve()
            .unwrap();
        assert_eq!(config.cache_path, dir.path().join("var/graft"));
        assert_eq!(config.watch, vec![dir.path().join("graft.json")]);
        assert_eq!(config.psr4["App\\"], vec![dir.path().join("src")]);
    }

    #[test]
    fn layers_override_in_order() {
        let dir = project(r#"{ "prefix": "FILE", "persistent": false, "include": ["App\\"] }"#);
        let env = EnvConfig {
            prefix: Some("ENV".into()),
            include: Some(vec!["Lib\\".into()]),
            ..EnvConfig::default()
        };
        let cli = CliOverrides {
            prefix: Some("CLI".into()),
            ..CliOverrides::default()
        };
        let config = ConfigLoader::with_env(dir.path(), env)
            .with_overrides(cli)
            .resolve()
            .unwrap();
        assert_eq!(config.prefix, "CLI");
        assert_eq!(config.include, vec!["Lib\\"]);
        assert!(!config.persistent);
    }

    #[test]
    fn cli_config_file_wins_over_env() {
        let dir = project(r#"{ "prefix": "DEFAULT" }"#);
        std::fs::write(dir.path().join("env.json"), r#"{ "prefix": "FROM_ENV" }"#).unwrap();
        std::fs::write(dir.path().join("cli.json"), r#"{ "prefix": "FROM_CLI" }"#).unwrap();
        let env = EnvConfig {
            config: Some("env.json".into()),
            ..EnvConfig::default()
        };
        let loader = ConfigLoader::with_env(dir.path(), env.clone());
        assert_eq!(loader.resolve().unwrap().prefix, "FROM_ENV");

        let loader = ConfigLoader::with_env(dir.path(), env).with_overrides(CliOverrides {
            config_file: Some(dir.path().join("cli.json")),
            ..CliOverrides::default()
        });
        assert_eq!(loader.resolve().unwrap().prefix, "FROM_CLI");
    }

    #[test]
    fn invalid_values_fail_resolution() {
        let dir = project(r#"{ "max-scan-nodes": 0, "patchers": ["monkey", "nope"] }"#);
        let err = ConfigLoader::with_env(dir.path(), EnvConfig::default())
            .resolve()
            .unwrap_err();
        assert_matches!(err, ConfigError::ValidationFailed { count: 2, .. });
        assert_eq!(err.messages().len(), 2);
    }

    #[test]
    fn malformed_json_is_reported() {
        let dir = project("{ not json");
        let err = ConfigLoader::with_env(dir.path(), EnvConfig::default())
            .resolve()
            .unwrap_err();
        assert_matches!(err, ConfigError::InvalidJson { .. });
    }
}
