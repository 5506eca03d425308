//! On-disk cache of patched files.
//!
//! The cache mirrors the source tree under its root. An entry is trusted only
//! while its mtime is strictly newer than the source file and the newest
//! watched file; anything else is a miss.

use graft_core::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Summary of the cache contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatus {
    /// Number of cached files.
    pub files: usize,
    /// Total size in bytes.
    pub bytes: u64,
}

/// Patched file cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    epsilon: Duration,
}

impl CacheStore {
    /// Cache under `root`, stamping entries `epsilon` past their newest input.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, epsilon: Duration) -> Self {
        Self {
            root: root.into(),
            epsilon,
        }
    }

    /// Cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Timestamp bump applied to fresh entries.
    #[must_use]
    pub const fn epsilon(&self) -> Duration {
        self.epsilon
    }

    /// Location of the entry for `source`: the root joined with the
    /// normalized source path, drive colons stripped. The result never
    /// leaves the root.
    #[must_use]
    pub fn cache_path(&self, source: &Path) -> PathBuf {
        let mut relative = PathBuf::new();
        for component in normalize(source).components() {
            match component {
                Component::Prefix(prefix) => {
                    relative.push(prefix.as_os_str().to_string_lossy().replace(':', ""));
                }
                Component::Normal(part) => {
                    let part = part.to_string_lossy().replace(':', "");
                    relative.push(part.trim_start_matches(['/', '\\']));
                }
                _ => {}
            }
        }
        self.root.join(relative)
    }

    /// The entry for `source` if it is still valid.
    #[must_use]
    pub fn cached(&self, source: &Path, watched: Option<SystemTime>) -> Option<PathBuf> {
        let cache = self.cache_path(source);
        let cached_mtime = modified(&cache)?;
        let source_mtime = modified(source)?;
        let fresh = cached_mtime > source_mtime && watched.is_none_or(|w| cached_mtime > w);
        if fresh {
            trace!(source = %source.display(), cache = %cache.display(), "cache entry valid");
            Some(cache)
        } else {
            debug!(source = %source.display(), "cache entry stale");
            None
        }
    }

    /// Store `content` as the entry for `source`.
    ///
    /// The entry is written to a temporary file next to its final location,
    /// stamped with `max(source mtime, watched) + epsilon` and renamed into
    /// place. On failure nothing is left behind.
    pub fn write(
        &self,
        source: &Path,
        content: &str,
        watched: Option<SystemTime>,
    ) -> Result<PathBuf> {
        let target = self.cache_path(source);
        let base = modified(source).unwrap_or_else(SystemTime::now);
        let stamp = watched.map_or(base, |w| base.max(w)) + self.epsilon;

        let parent = target
            .parent()
            .ok_or_else(|| Error::cache_write(&target, "cache path has no parent directory"))?;
        fs::create_dir_all(parent).map_err(|e| Error::cache_dir(parent, e.to_string()))?;

        let mut temp =
            NamedTempFile::new_in(parent).map_err(|e| Error::cache_write(&target, e.to_string()))?;
        temp.write_all(content.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .and_then(|()| temp.as_file().set_modified(stamp))
            .map_err(|e| Error::cache_write(&target, e.to_string()))?;
        temp.persist(&target)
            .map_err(|e| Error::cache_write(&target, e.error.to_string()))?;

        debug!(
            source = %source.display(),
            cache = %target.display(),
            bytes = content.len(),
            "cache entry written"
        );
        Ok(target)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        if self.root.parent().is_none() {
            return Err(Error::cache_clear(
                &self.root,
                "refusing to clear a filesystem root",
            ));
        }
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {
                debug!(root = %self.root.display(), "cache cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::cache_clear(&self.root, e.to_string())),
        }
    }

    /// Count the cached files and their size.
    pub fn status(&self) -> Result<CacheStatus> {
        let mut status = CacheStatus::default();
        if !self.root.exists() {
            return Ok(status);
        }
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(self.root.as_path()).to_path_buf();
                Error::io(path, std::io::Error::other(e.to_string()))
            })?;
            if entry.file_type().is_file() {
                status.files += 1;
                status.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
        Ok(status)
    }
}

/// Resolve `.` and `..` in `path` without touching the filesystem.
///
/// `..` at the root is dropped; leading `..` of a relative path is kept.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else if !out.has_root() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Modification time of `path`, if it exists.
#[must_use]
pub fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_test_utils::assertions::{assert_no_artifacts, assert_tree_file_count};
    use graft_test_utils::temp_project::TempProject;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    const T: Duration = Duration::from_secs(1_700_000_000);

    fn at(offset_ms: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + T + Duration::from_millis(offset_ms)
    }

    fn setup() -> (TempProject, PathBuf, CacheStore) {
        let project = TempProject::new()
            .with_file("src/A.php", "<?php class A {}\n")
            .build()
            .unwrap();
        let source = project.join("src/A.php");
        TempProject::set_mtime(&source, at(0)).unwrap();
        let store = CacheStore::new(project.cache_path(), Duration::from_secs(1));
        (project, source, store)
    }

    #[test_case("/var/www/src/A.php", "cache/var/www/src/A.php" ; "unix absolute")]
    #[test_case("C:\\www\\A.php", "cache/C\\www\\A.php" ; "drive letter")]
    #[test_case("src/A.php", "cache/src/A.php" ; "relative")]
    #[test_case("/p/../p/./A.php", "cache/p/A.php" ; "dot segments")]
    #[test_case("/../../etc/A.php", "cache/etc/A.php" ; "parent of root")]
    #[test_case("../../etc/A.php", "cache/etc/A.php" ; "relative escape")]
    fn cache_path_mirrors_source(source: &str, expected: &str) {
        let store = CacheStore::new("cache", Duration::from_secs(1));
        assert_eq!(store.cache_path(Path::new(source)), PathBuf::from(expected));
    }

    #[test_case("/a/b/../c", "/a/c")]
    #[test_case("a/./b/", "a/b")]
    #[test_case("../x/../y", "../y")]
    #[test_case("../../z", "../../z")]
    #[test_case("/..", "/")]
    fn normalize_is_lexical(input: &str, expected: &str) {
        assert_eq!(normalize(Path::new(input)), PathBuf::from(expected));
    }

    #[test]
    fn spellings_of_one_file_share_an_entry() {
        let (project, source, store) = setup();
        let detour = project.join("src/../src/A.php");
        let path = store.write(&detour, "x", None).unwrap();
        assert_eq!(path, store.cache_path(&source));
        assert_eq!(store.cached(&source, None), Some(path));
        assert_tree_file_count(store.root(), 1).unwrap();
    }

    #[test]
    fn entry_is_valid_until_source_changes() {
        let (_project, source, store) = setup();
        assert_eq!(store.cached(&source, None), None);

        let path = store.write(&source, "<?php // patched\n", None).unwrap();
        assert_eq!(modified(&path), Some(at(1000)));
        assert_eq!(store.cached(&source, None), Some(path));

        TempProject::set_mtime(&source, at(1_000_000)).unwrap();
        assert_eq!(store.cached(&source, None), None);
    }

    #[test]
    fn watched_timestamp_invalidates_entry() {
        let (project, source, _) = setup();
        let store = CacheStore::new(project.cache_path(), Duration::from_millis(500));
        store.write(&source, "x", None).unwrap();
        assert!(store.cached(&source, Some(at(0))).is_some());
        assert_eq!(store.cached(&source, Some(at(1000))), None);
    }

    #[test]
    fn stamp_uses_newest_input() {
        let (_project, source, store) = setup();
        let path = store.write(&source, "x", Some(at(5000))).unwrap();
        assert_eq!(modified(&path), Some(at(6000)));
        assert!(store.cached(&source, Some(at(5000))).is_some());
    }

    #[test]
    fn rewrite_replaces_content() {
        let (_project, source, store) = setup();
        store.write(&source, "first", None).unwrap();
        let path = store.write(&source, "second", None).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "second");
        assert_tree_file_count(store.root(), 1).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn failed_write_leaves_nothing_behind() {
        let (project, source, _) = setup();
        let blocker = project.create_file("blocked", "not a directory").unwrap();
        let store = CacheStore::new(blocker.join("cache"), Duration::from_secs(1));
        let err = store.write(&source, "x", None).unwrap_err();
        assert_eq!(err.code(), graft_core::ErrorCode::E0301);
        assert_eq!(store.cached(&source, None), None);
        assert_no_artifacts(&project.cache_path()).unwrap();
    }

    #[test]
    fn clear_and_status() {
        let (project, source, store) = setup();
        assert_eq!(store.status().unwrap(), CacheStatus::default());
        store.write(&source, "12345", None).unwrap();
        let other = project.create_file("src/B.php", "<?php").unwrap();
        store.write(&other, "678", None).unwrap();
        assert_eq!(store.status().unwrap(), CacheStatus { files: 2, bytes: 8 });

        store.clear().unwrap();
        assert!(!store.root().exists());
        store.clear().unwrap();
    }

    #[test]
    fn refuses_to_clear_filesystem_root() {
        let store = CacheStore::new("/", Duration::from_secs(1));
        assert!(store.clear().is_err());
    }
}
