//! Class-load interception.

use crate::cache::CacheStore;
use crate::filter::NamespaceFilter;
use crate::locator::Psr4Locator;
use crate::watch::WatchSet;
use graft_config::ResolvedConfig;
use graft_core::{Error, Result};
use graft_jit::{
    BacktraceOptions, ClassLocator, Frame, Monkey, Patchers, PhpParser, Pointcut, Quit, Rebase,
    SourceParser,
};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a class request was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Interceptor not installed; the original file was used.
    Passthrough,
    /// Class filtered out; the original file was used.
    Excluded,
    /// A valid cached copy was used.
    CacheHit,
    /// The file was patched and cached.
    Patched,
}

impl LoadStatus {
    /// Short label for display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Excluded => "excluded",
            Self::CacheHit => "cache-hit",
            Self::Patched => "patched",
        }
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a served class request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Requested class.
    pub class: String,
    /// File declaring the class.
    pub source: PathBuf,
    /// File the host runtime should include.
    pub loaded: PathBuf,
    /// How the request was served.
    pub status: LoadStatus,
}

/// Build the patcher pipeline named by `config.patchers`.
pub fn build_patchers(config: &ResolvedConfig) -> Result<Patchers> {
    let mut patchers = Patchers::new();
    for name in &config.patchers {
        match name.as_str() {
            "monkey" => patchers.add(
                name.as_str(),
                Monkey::new()
                    .with_prefix(config.prefix.clone())
                    .with_resolver(&config.resolver)
                    .with_max_scan_nodes(config.max_scan_nodes)
                    .with_ignored_class(&config.pointcut)
                    .with_ignored_class(&config.quit),
            ),
            "pointcut" => patchers.add(
                name.as_str(),
                Pointcut::new()
                    .with_class(&config.pointcut)
                    .with_prefix(config.prefix.clone()),
            ),
            "rebase" => patchers.add(name.as_str(), Rebase::new()),
            "quit" => patchers.add(name.as_str(), Quit::new().with_class(&config.quit)),
            _ => return Err(Error::unknown_patcher(name.as_str())),
        };
    }
    Ok(patchers)
}

/// Serves class requests from patched, cached copies of their files.
pub struct ClassLoadInterceptor {
    locator: Box<dyn ClassLocator>,
    parser: Box<dyn SourceParser>,
    patchers: Patchers,
    filter: NamespaceFilter,
    cache: CacheStore,
    watched: WatchSet,
    persistent: bool,
    installed: bool,
}

impl fmt::Debug for ClassLoadInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassLoadInterceptor")
            .field("cache", &self.cache.root())
            .field("patchers", &self.patchers)
            .field("filter", &self.filter)
            .field("watched", &self.watched.len())
            .field("installed", &self.installed)
            .finish()
    }
}

impl ClassLoadInterceptor {
    /// Interceptor for `config` resolving classes through `locator`.
    ///
    /// Clears the cache when `clear-cache` is set and registers the initial
    /// watch list. The interceptor starts uninstalled.
    pub fn new(config: &ResolvedConfig, locator: impl ClassLocator + 'static) -> Result<Self> {
        let interceptor = Self {
            locator: Box::new(locator),
            parser: Box::new(PhpParser::new()),
            patchers: build_patchers(config)?,
            filter: NamespaceFilter::new(&config.include, &config.exclude),
            cache: CacheStore::new(&config.cache_path, config.mtime_epsilon()),
            watched: {
                let mut watched = WatchSet::new();
                watched.watch(config.watch.iter().cloned());
                watched
            },
            persistent: config.persistent,
            installed: false,
        };
        if config.clear_cache {
            interceptor.clear_cache()?;
        }
        debug!(
            cache = %interceptor.cache.root().display(),
            patchers = interceptor.patchers.len(),
            "interceptor created"
        );
        Ok(interceptor)
    }

    /// Interceptor using the configured PSR-4 map.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        Self::new(config, Psr4Locator::from_config(config))
    }

    /// Replace the source parser.
    #[must_use]
    pub fn with_parser(mut self, parser: impl SourceParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Start intercepting.
    pub fn install(&mut self) {
        self.installed = true;
        info!(cache = %self.cache.root().display(), "interceptor installed");
    }

    /// Stop intercepting; requests pass straight through.
    pub fn uninstall(&mut self) {
        self.installed = false;
        info!("interceptor uninstalled");
    }

    /// Whether requests are intercepted.
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        self.installed
    }

    /// The patcher pipeline.
    #[must_use]
    pub const fn patchers(&self) -> &Patchers {
        &self.patchers
    }

    /// The patcher pipeline, for registering custom patchers.
    pub fn patchers_mut(&mut self) -> &mut Patchers {
        &mut self.patchers
    }

    /// The cache store.
    #[must_use]
    pub const fn cache_store(&self) -> &CacheStore {
        &self.cache
    }

    /// The watched files.
    #[must_use]
    pub const fn watched(&self) -> &WatchSet {
        &self.watched
    }

    /// Serve a request for `class`. `None` when no file declares it.
    pub fn load_class(&mut self, class: &str) -> Result<Option<LoadOutcome>> {
        if !self.installed {
            return Ok(self.locator.find_file(class).map(|source| LoadOutcome {
                class: class.to_string(),
                loaded: source.clone(),
                source,
                status: LoadStatus::Passthrough,
            }));
        }

        let Some(source) = self.find_file(class) else {
            debug!(class, "class not found");
            return Ok(None);
        };

        if !self.patchable(class) {
            debug!(class, file = %source.display(), "class excluded from patching");
            return Ok(Some(LoadOutcome {
                class: class.to_string(),
                loaded: source.clone(),
                source,
                status: LoadStatus::Excluded,
            }));
        }

        let (loaded, status) = self.patch_or_reuse(&source)?;
        info!(class, file = %loaded.display(), status = %status, "class loaded");
        Ok(Some(LoadOutcome {
            class: class.to_string(),
            source,
            loaded,
            status,
        }))
    }

    /// Patch `path`, or reuse its cached copy, regardless of class filters.
    /// Returns the file to include and whether the cache was hit.
    pub fn load_file(&mut self, path: &Path) -> Result<(PathBuf, LoadStatus)> {
        self.patch_or_reuse(path)
    }

    fn patch_or_reuse(&mut self, source: &Path) -> Result<(PathBuf, LoadStatus)> {
        if let Some(cached) = self.cached(source) {
            debug!(file = %source.display(), "cache hit");
            return Ok((cached, LoadStatus::CacheHit));
        }
        debug!(file = %source.display(), "cache miss");
        let patched = self.patch(source)?;
        let cached = self.cache(source, &patched)?;
        Ok((cached, LoadStatus::Patched))
    }

    /// Read and patch `source` without touching the cache.
    pub fn patch(&mut self, source: &Path) -> Result<String> {
        let bytes = std::fs::read(source).map_err(|e| Error::io(source, e))?;
        let mut tree = self.parser.parse_bytes(&bytes, Some(source))?;
        self.patchers.process(&mut tree, Some(source))?;
        Ok(self.parser.unparse(&tree))
    }

    /// File declaring `class`, after every patcher had its say.
    #[must_use]
    pub fn find_file(&self, class: &str) -> Option<PathBuf> {
        self.patchers.find_file(self.locator.as_ref(), class)
    }

    /// Whether `class` passes the namespace rules.
    #[must_use]
    pub fn allowed(&self, class: &str) -> bool {
        self.filter.allowed(class)
    }

    /// Whether `class` would be patched.
    #[must_use]
    pub fn patchable(&self, class: &str) -> bool {
        self.allowed(class) && self.patchers.patchable(class)
    }

    /// Store patched `content` for `source` and return the cached path.
    pub fn cache(&self, source: &Path, content: &str) -> Result<PathBuf> {
        self.cache.write(source, content, self.watched.timestamp())
    }

    /// Valid cached copy of `source`.
    #[must_use]
    pub fn cached(&self, source: &Path) -> Option<PathBuf> {
        self.cache.cached(source, self.watched.timestamp())
    }

    /// Remove every cached file.
    pub fn clear_cache(&self) -> Result<()> {
        info!(root = %self.cache.root().display(), "clearing cache");
        self.cache.clear()
    }

    /// Watch more files.
    pub fn watch<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.watched.watch(paths);
    }

    /// Stop watching files.
    pub fn unwatch<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.watched.unwatch(paths);
    }

    /// Drop synthetic frames injected by the patchers.
    #[must_use]
    pub fn process_backtrace(&self, options: &BacktraceOptions, frames: Vec<Frame>) -> Vec<Frame> {
        self.patchers.process_backtrace(options, frames)
    }
}

impl Drop for ClassLoadInterceptor {
    fn drop(&mut self) {
        if self.persistent {
            return;
        }
        if let Err(e) = self.cache.clear() {
            warn!(error = %e, "failed to remove non-persistent cache");
        }
    }
}
