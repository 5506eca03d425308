//! Environment variable configuration support.

use crate::error::{ConfigError, Result};
use std::path::PathBuf;

/// Environment variables read by Graft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraftEnvVar {
    /// `GRAFT_CONFIG` - path to the configuration file.
    Config,
    /// `GRAFT_CACHE_DIR` - cache root.
    CacheDir,
    /// `GRAFT_CLEAR_CACHE` - empty the cache on start.
    ClearCache,
    /// `GRAFT_PERSISTENT` - keep the cache on exit.
    Persistent,
    /// `GRAFT_PREFIX` - indirection variable prefix.
    Prefix,
    /// `GRAFT_INCLUDE` - comma-separated namespace prefixes to patch.
    Include,
    /// `GRAFT_EXCLUDE` - comma-separated namespace prefixes to skip.
    Exclude,
}

impl GraftEnvVar {
    /// Every variable, in documentation order.
    pub const ALL: [Self; 7] = [
        Self::Config,
        Self::CacheDir,
        Self::ClearCache,
        Self::Persistent,
        Self::Prefix,
        Self::Include,
        Self::Exclude,
    ];

    /// Get the environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "GRAFT_CONFIG",
            Self::CacheDir => "GRAFT_CACHE_DIR",
            Self::ClearCache => "GRAFT_CLEAR_CACHE",
            Self::Persistent => "GRAFT_PERSISTENT",
            Self::Prefix => "GRAFT_PREFIX",
            Self::Include => "GRAFT_INCLUDE",
            Self::Exclude => "GRAFT_EXCLUDE",
        }
    }
}

/// Values taken from the environment. Unset variables are `None`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    /// Configuration file override.
    pub config: Option<PathBuf>,
    /// Cache root.
    pub cache_dir: Option<PathBuf>,
    /// Clear the cache on start.
    pub clear_cache: Option<bool>,
    /// Keep the cache on exit.
    pub persistent: Option<bool>,
    /// Variable prefix.
    pub prefix: Option<String>,
    /// Include list.
    pub include: Option<Vec<String>>,
    /// Exclude list.
    pub exclude: Option<Vec<String>>,
}

impl EnvConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: GraftEnvVar| lookup(var.as_str()).filter(|v| !v.is_empty());
        Ok(Self {
            config: get(GraftEnvVar::Config).map(PathBuf::from),
            cache_dir: get(GraftEnvVar::CacheDir).map(PathBuf::from),
            clear_cache: get(GraftEnvVar::ClearCache)
                .map(|v| parse_bool(GraftEnvVar::ClearCache, &v))
                .transpose()?,
            persistent: get(GraftEnvVar::Persistent)
                .map(|v| parse_bool(GraftEnvVar::Persistent, &v))
                .transpose()?,
            prefix: get(GraftEnvVar::Prefix),
            include: get(GraftEnvVar::Include).map(|v| parse_list(&v)),
            exclude: get(GraftEnvVar::Exclude).map(|v| parse_list(&v)),
        })
    }

    /// Whether no variable was set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Parse a boolean flag (`1/true/yes/on`, `0/false/no/off`).
pub fn parse_bool(var: GraftEnvVar, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::env(
            var.as_str(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

/// Split a comma-separated list, dropping empty entries.
#[must_use]
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn reads_every_variable() {
        let env = EnvConfig::from_lookup(lookup(&[
            ("GRAFT_CONFIG", "/etc/graft.json"),
            ("GRAFT_CACHE_DIR", "/tmp/g"),
            ("GRAFT_CLEAR_CACHE", "yes"),
            ("GRAFT_PERSISTENT", "0"),
            ("GRAFT_PREFIX", "KAHLAN"),
            ("GRAFT_INCLUDE", "App\\, Lib\\"),
            ("GRAFT_EXCLUDE", "App\\Gen\\"),
        ]))
        .unwrap();
        assert_eq!(env.config, Some(PathBuf::from("/etc/graft.json")));
        assert_eq!(env.cache_dir, Some(PathBuf::from("/tmp/g")));
        assert_eq!(env.clear_cache, Some(true));
        assert_eq!(env.persistent, Some(false));
        assert_eq!(env.prefix.as_deref(), Some("KAHLAN"));
        assert_eq!(env.include, Some(vec!["App\\".to_string(), "Lib\\".to_string()]));
        assert_eq!(env.exclude, Some(vec!["App\\Gen\\".to_string()]));
    }

    #[test]
    fn unset_and_empty_are_none() {
        let env = EnvConfig::from_lookup(lookup(&[("GRAFT_PREFIX", "")])).unwrap();
        assert!(env.is_empty());
    }

    #[rstest]
    #[case("1", true)]
    #[case("TRUE", true)]
    #[case("on", true)]
    #[case("no", false)]
    #[case(" off ", false)]
    fn booleans(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(parse_bool(GraftEnvVar::Persistent, value).unwrap(), expected);
    }

    #[test]
    fn bad_boolean_names_the_variable() {
        let err = EnvConfig::from_lookup(lookup(&[("GRAFT_CLEAR_CACHE", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("GRAFT_CLEAR_CACHE"));
    }

    #[test]
    fn variable_names_are_unique() {
        let mut names: Vec<_> = GraftEnvVar::ALL.iter().map(|v| v.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), GraftEnvVar::ALL.len());
    }
}
