//! Class file lookup.

use graft_config::ResolvedConfig;
use graft_jit::ClassLocator;
use std::path::PathBuf;
use tracing::trace;

/// PSR-4 class locator.
///
/// Prefixes are tried longest first; within a prefix, directories are tried
/// in registration order. Only existing files are returned.
#[derive(Debug, Clone, Default)]
pub struct Psr4Locator {
    prefixes: Vec<(String, Vec<PathBuf>)>,
}

impl Psr4Locator {
    /// Empty locator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator built from the `psr-4` configuration map.
    #[must_use]
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let mut locator = Self::new();
        for (prefix, dirs) in &config.psr4 {
            locator.add(prefix, dirs.iter().cloned());
        }
        locator
    }

    /// Map `prefix` to `dirs`. Adding a known prefix appends directories.
    pub fn add<I, P>(&mut self, prefix: &str, dirs: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let prefix = prefix.trim_start_matches('\\').to_string();
        let dirs = dirs.into_iter().map(Into::into);
        match self.prefixes.iter_mut().find(|(p, _)| *p == prefix) {
            Some((_, existing)) => existing.extend(dirs),
            None => {
                self.prefixes.push((prefix, dirs.collect()));
                self.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
            }
        }
        self
    }

    /// Registered prefixes, longest first.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(|(p, _)| p.as_str())
    }
}

impl ClassLocator for Psr4Locator {
    fn find_file(&self, class: &str) -> Option<PathBuf> {
        let class = class.trim_start_matches('\\');
        for (prefix, dirs) in &self.prefixes {
            let Some(rest) = class.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let relative = format!("{}.php", rest.replace('\\', "/"));
            for dir in dirs {
                let candidate = dir.join(&relative);
                if candidate.is_file() {
                    trace!(class, file = %candidate.display(), "class located");
                    return Some(candidate);
                }
            }
        }
        None
    }
}
