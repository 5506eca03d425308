//! Temporary project creation and management for integration tests.
//!
//! A project holds PHP classes laid out by PSR-4 under `src/`, an optional
//! `graft.json`, and a `cache/` directory the interceptor may write to.

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use crate::fixtures::Fixtures;

/// Namespace prefix mapped to `src/` when no other mapping is given.
pub const DEFAULT_PREFIX: &str = "App\\";

/// A temporary project directory for testing.
///
/// The project is automatically cleaned up when this struct is dropped.
#[derive(Debug)]
pub struct TempProject {
    dir: TempDir,
    psr4: Vec<(String, String)>,
}

impl TempProject {
    /// Create a new temporary project builder.
    #[must_use]
    pub fn new() -> TempProjectBuilder {
        TempProjectBuilder::default()
    }

    /// Get the root directory of the project.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Source directory for the default namespace prefix.
    #[must_use]
    pub fn src_path(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    /// Cache directory used by the project's configuration.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Path to `graft.json`.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("graft.json")
    }

    /// Absolute path of a project-relative path.
    #[must_use]
    pub fn join(&self, relative_path: &str) -> PathBuf {
        self.dir.path().join(relative_path)
    }

    /// File a class is stored in according to the project's PSR-4 map.
    #[must_use]
    pub fn class_path(&self, class: &str) -> PathBuf {
        let class = class.trim_start_matches('\\');
        let (prefix, dir) = self
            .psr4
            .iter()
            .filter(|(prefix, _)| class.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(("", "src"), |(p, d)| (p.as_str(), d.as_str()));
        let relative = class[prefix.len()..].replace('\\', "/");
        self.dir.path().join(dir).join(format!("{relative}.php"))
    }

    /// Create a file in the project directory.
    pub fn create_file(&self, relative_path: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(relative_path);
        write(&path, content)?;
        Ok(path)
    }

    /// Write a class file at its PSR-4 location.
    pub fn create_class(&self, class: &str, content: &str) -> Result<PathBuf> {
        let path = self.class_path(class);
        write(&path, content)?;
        Ok(path)
    }

    /// Check if a file exists in the project.
    #[must_use]
    pub fn file_exists(&self, relative_path: &str) -> bool {
        self.dir.path().join(relative_path).exists()
    }

    /// Read a file from the project.
    pub fn read_file(&self, relative_path: &str) -> Result<String> {
        let path = self.dir.path().join(relative_path);
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {relative_path}"))
    }

    /// Modification time of `path`.
    pub fn mtime(path: &Path) -> Result<SystemTime> {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", path.display()))
    }

    /// Set the modification time of `path`.
    pub fn set_mtime(path: &Path, time: SystemTime) -> Result<()> {
        File::options()
            .write(true)
            .open(path)
            .and_then(|f| f.set_modified(time))
            .with_context(|| format!("Failed to set mtime of {}", path.display()))
    }

    /// Move the modification time of `path` forward by `by`.
    pub fn age_forward(path: &Path, by: Duration) -> Result<SystemTime> {
        let time = Self::mtime(path)? + by;
        Self::set_mtime(path, time)?;
        Ok(time)
    }
}

fn write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Builder for creating temporary projects.
#[derive(Debug, Default)]
pub struct TempProjectBuilder {
    psr4: Vec<(String, String)>,
    config: Map<String, Value>,
    write_config: bool,
    files: Vec<(String, String)>,
    classes: Vec<(String, Option<String>)>,
}

impl TempProjectBuilder {
    /// Map `prefix` to the project-relative `dir`.
    #[must_use]
    pub fn with_psr4(mut self, prefix: impl Into<String>, dir: impl Into<String>) -> Self {
        self.psr4.push((prefix.into(), dir.into()));
        self
    }

    /// Set a `graft.json` key. Any call makes the builder write the file.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self.write_config = true;
        self
    }

    /// Write a `graft.json` holding the PSR-4 map and the project cache.
    #[must_use]
    pub fn with_graft_json(mut self) -> Self {
        self.write_config = true;
        self
    }

    /// Add a file to be created.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    /// Add an empty class.
    #[must_use]
    pub fn with_php_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push((class.into(), None));
        self
    }

    /// Add a class with custom content.
    #[must_use]
    pub fn with_php_class_content(
        mut self,
        class: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.classes.push((class.into(), Some(content.into())));
        self
    }

    /// Build the project.
    pub fn build(self) -> Result<TempProject> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        let mut psr4 = self.psr4;
        if psr4.is_empty() {
            psr4.push((DEFAULT_PREFIX.to_string(), "src".to_string()));
        }
        let project = TempProject { dir, psr4 };
        fs::create_dir_all(project.src_path())?;

        for (path, content) in &self.files {
            project.create_file(path, content)?;
        }

        for (class, content) in &self.classes {
            let content = content.clone().unwrap_or_else(|| {
                let class = class.trim_start_matches('\\');
                let (namespace, name) = class.rsplit_once('\\').unwrap_or(("", class));
                Fixtures::php_class_content(namespace, name)
            });
            project.create_class(class, &content)?;
        }

        if self.write_config {
            let mut config = Map::new();
            let map: Map<String, Value> = project
                .psr4
                .iter()
                .map(|(prefix, dir)| (prefix.clone(), json!(dir)))
                .collect();
            config.insert("psr-4".into(), Value::Object(map));
            config.insert("cache-path".into(), json!("cache"));
            config.extend(self.config);
            let json = serde_json::to_string_pretty(&Value::Object(config))?;
            write(&project.config_path(), &json)?;
        }

        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_psr4_layout() {
        let project = TempProject::new()
            .with_psr4("App\\", "src")
            .with_psr4("App\\Legacy\\", "legacy")
            .with_php_class("App\\Models\\User")
            .with_php_class("App\\Legacy\\Old")
            .build()
            .unwrap();
        assert!(project.file_exists("src/Models/User.php"));
        assert!(project.file_exists("legacy/Old.php"));
        let content = project.read_file("src/Models/User.php").unwrap();
        assert!(content.contains("namespace App\\Models;"));
    }

    #[test]
    fn graft_json_contains_map_and_overrides() {
        let project = TempProject::new()
            .with_config("prefix", json!("TEST"))
            .build()
            .unwrap();
        let config: Value = serde_json::from_str(&project.read_file("graft.json").unwrap()).unwrap();
        assert_eq!(config["psr-4"]["App\\"], json!("src"));
        assert_eq!(config["cache-path"], json!("cache"));
        assert_eq!(config["prefix"], json!("TEST"));
    }

    #[test]
    fn no_config_unless_asked() {
        let project = TempProject::new().build().unwrap();
        assert!(!project.file_exists("graft.json"));
    }

    #[test]
    fn mtime_can_be_moved() {
        let project = TempProject::new().with_file("a.txt", "x").build().unwrap();
        let path = project.join("a.txt");
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        TempProject::set_mtime(&path, base).unwrap();
        assert_eq!(TempProject::mtime(&path).unwrap(), base);
        let later = TempProject::age_forward(&path, Duration::from_secs(1000)).unwrap();
        assert_eq!(later, base + Duration::from_secs(1000));
        assert_eq!(TempProject::mtime(&path).unwrap(), later);
    }
}
