//! Configuration types.

use graft_jit::patchers::{BUILTIN, monkey, pointcut, quit};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default cache mtime bump, in milliseconds.
pub const DEFAULT_MTIME_EPSILON_MS: u64 = 1000;

/// Directory list for one PSR-4 prefix: `"src/"` or `["src/", "lib/"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Psr4Paths {
    /// Single directory.
    One(String),
    /// Several directories, searched in order.
    Many(Vec<String>),
}

impl Psr4Paths {
    /// Directories in search order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(path) => vec![path.clone()],
            Self::Many(paths) => paths.clone(),
        }
    }
}

/// Contents of a `graft.json` file. Absent keys keep the lower layer's value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GraftConfig {
    /// Namespace prefixes to patch (`["*"]` for all).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,

    /// Namespace prefixes never patched. Checked before `include`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,

    /// Root directory of the patched file cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,

    /// Empty the cache when the interceptor starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clear_cache: Option<bool>,

    /// Extra files whose mtime invalidates the whole cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<Vec<String>>,

    /// Keep the cache after the interceptor is dropped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,

    /// Indirection variable prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Sibling nodes a `new` argument list may span.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_scan_nodes: Option<usize>,

    /// Amount added to the newest input mtime when stamping cache files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime_epsilon_ms: Option<u64>,

    /// Runtime resolver class used by the call-site patcher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver: Option<String>,

    /// Hook class used by the method entry patcher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointcut: Option<String>,

    /// Class receiving intercepted `exit`/`die` calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quit: Option<String>,

    /// PSR-4 namespace prefix to directory map.
    #[serde(rename = "psr-4", skip_serializing_if = "Option::is_none")]
    pub psr4: Option<IndexMap<String, Psr4Paths>>,

    /// Patchers to run, in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patchers: Option<Vec<String>>,
}

/// Fully resolved configuration with every layer applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Directory relative paths are resolved against.
    pub project_dir: PathBuf,
    /// Namespace prefixes to patch.
    pub include: Vec<String>,
    /// Namespace prefixes never patched.
    pub exclude: Vec<String>,
    /// Cache root.
    pub cache_path: PathBuf,
    /// Empty the cache on start.
    pub clear_cache: bool,
    /// Watched files.
    pub watch: Vec<PathBuf>,
    /// Keep the cache on drop.
    pub persistent: bool,
    /// Indirection variable prefix.
    pub prefix: String,
    /// `new` scan horizon.
    pub max_scan_nodes: usize,
    /// Cache mtime bump in milliseconds.
    pub mtime_epsilon_ms: u64,
    /// Runtime resolver class.
    pub resolver: String,
    /// Method hook class.
    pub pointcut: String,
    /// Quit class.
    pub quit: String,
    /// PSR-4 map with resolved directories.
    pub psr4: IndexMap<String, Vec<PathBuf>>,
    /// Patcher names in execution order.
    pub patchers: Vec<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            include: vec!["*".to_string()],
            exclude: Vec::new(),
            cache_path: std::env::temp_dir().join("graft"),
            clear_cache: false,
            watch: Vec::new(),
            persistent: true,
            prefix: monkey::DEFAULT_PREFIX.to_string(),
            max_scan_nodes: monkey::DEFAULT_MAX_SCAN_NODES,
            mtime_epsilon_ms: DEFAULT_MTIME_EPSILON_MS,
            resolver: monkey::DEFAULT_RESOLVER.to_string(),
            pointcut: pointcut::DEFAULT_POINTCUT.to_string(),
            quit: quit::DEFAULT_QUIT.to_string(),
            psr4: IndexMap::new(),
            patchers: BUILTIN.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl ResolvedConfig {
    /// Cache mtime bump as a duration.
    #[must_use]
    pub const fn mtime_epsilon(&self) -> Duration {
        Duration::from_millis(self.mtime_epsilon_ms)
    }

    /// Defaults rooted at `project_dir`.
    #[must_use]
    pub fn for_project(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_documented_values() {
        let config = ResolvedConfig::default();
        assert_eq!(config.include, vec!["*"]);
        assert!(config.exclude.is_empty());
        assert!(config.persistent);
        assert!(!config.clear_cache);
        assert_eq!(config.prefix, "GRAFT");
        assert_eq!(config.max_scan_nodes, 64);
        assert_eq!(config.mtime_epsilon(), Duration::from_secs(1));
        assert_eq!(config.patchers, vec!["monkey", "pointcut", "rebase", "quit"]);
        assert!(config.cache_path.ends_with("graft"));
    }

    #[test]
    fn file_config_uses_kebab_case_keys() {
        let json = r#"{
            "cache-path": "var/cache",
            "clear-cache": true,
            "max-scan-nodes": 8,
            "mtime-epsilon-ms": 10,
            "psr-4": { "App\\": "src/", "Lib\\": ["lib/", "vendor/lib/"] }
        }"#;
        let config: GraftConfig = sonic_rs::from_str(json).unwrap();
        assert_eq!(config.cache_path.as_deref(), Some("var/cache"));
        assert_eq!(config.clear_cache, Some(true));
        assert_eq!(config.max_scan_nodes, Some(8));
        assert_eq!(config.mtime_epsilon_ms, Some(10));
        let psr4 = config.psr4.unwrap();
        assert_eq!(psr4["App\\"].to_vec(), vec!["src/"]);
        assert_eq!(psr4["Lib\\"].to_vec(), vec!["lib/", "vendor/lib/"]);
        assert!(config.include.is_none());
    }

    #[test]
    fn empty_file_is_valid() {
        let config: GraftConfig = sonic_rs::from_str("{}").unwrap();
        assert!(config.prefix.is_none());
        assert!(config.patchers.is_none());
    }
}
