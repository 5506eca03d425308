//! Files whose modification invalidates the whole cache.

use crate::cache::{modified, normalize};
use ahash::AHashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Watched files and the newest mtime among them.
#[derive(Debug, Default, Clone)]
pub struct WatchSet {
    files: AHashSet<PathBuf>,
    timestamp: Option<SystemTime>,
}

impl WatchSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `paths` and recompute the timestamp.
    pub fn watch<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            let path: PathBuf = path.into();
            self.files.insert(canonical(&path));
        }
        self.refresh();
    }

    /// Remove `paths` and recompute the timestamp.
    pub fn unwatch<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            self.files.remove(&canonical(path.as_ref()));
        }
        self.refresh();
    }

    /// Recompute the newest mtime from scratch. Missing files are ignored.
    pub fn refresh(&mut self) {
        self.timestamp = self.files.iter().filter_map(|p| modified(p)).max();
        debug!(files = self.files.len(), timestamp = ?self.timestamp, "watch set updated");
    }

    /// Newest mtime among the watched files.
    #[must_use]
    pub const fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    /// Watched files, sorted.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = self.files.iter().cloned().collect();
        files.sort();
        files
    }

    /// Whether `path` is watched.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains(&canonical(path))
    }

    /// Number of watched files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Key a watched file: its canonical path, or the lexically normalized path
/// while it does not exist.
fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| normalize(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_test_utils::temp_project::TempProject;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    #[test]
    fn timestamp_is_the_newest_mtime() {
        let project = TempProject::new()
            .with_file("a.json", "{}")
            .with_file("b.json", "{}")
            .build()
            .unwrap();
        let (a, b) = (project.join("a.json"), project.join("b.json"));
        TempProject::set_mtime(&a, at(10)).unwrap();
        TempProject::set_mtime(&b, at(20)).unwrap();

        let mut set = WatchSet::new();
        assert_eq!(set.timestamp(), None);
        set.watch([&a]);
        assert_eq!(set.timestamp(), Some(at(10)));
        set.watch([&b]);
        assert_eq!(set.timestamp(), Some(at(20)));
        set.unwatch([&b]);
        assert_eq!(set.timestamp(), Some(at(10)));
        assert_eq!(set.files(), vec![a.canonicalize().unwrap()]);
    }

    #[test]
    fn missing_files_do_not_count() {
        let mut set = WatchSet::new();
        set.watch(["/no/such/file.json"]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.timestamp(), None);
        set.unwatch(["/no/such/file.json"]);
        assert!(set.is_empty());
    }

    #[test]
    fn one_file_under_two_spellings() {
        let project = TempProject::new().with_file("cfg/a.json", "{}").build().unwrap();
        let mut set = WatchSet::new();
        set.watch([project.join("cfg/../cfg/a.json")]);
        assert!(set.contains(&project.join("cfg/a.json")));
        set.watch([project.join("cfg/./a.json")]);
        assert_eq!(set.len(), 1);
        assert!(set.timestamp().is_some());

        set.unwatch([project.join("cfg/a.json")]);
        assert!(set.is_empty());
        assert_eq!(set.timestamp(), None);
    }

    #[test]
    fn missing_files_are_normalized() {
        let mut set = WatchSet::new();
        set.watch(["/no/such/../such/file.json"]);
        set.unwatch(["/no/such/file.json"]);
        assert!(set.is_empty());
    }

    #[test]
    fn refresh_picks_up_changes() {
        let project = TempProject::new().with_file("a.json", "{}").build().unwrap();
        let a = project.join("a.json");
        TempProject::set_mtime(&a, at(1)).unwrap();
        let mut set = WatchSet::new();
        set.watch([a.clone()]);
        TempProject::set_mtime(&a, at(2)).unwrap();
        assert_eq!(set.timestamp(), Some(at(1)));
        set.refresh();
        assert_eq!(set.timestamp(), Some(at(2)));
    }
}
