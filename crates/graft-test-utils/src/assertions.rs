//! Assertion helpers for patched output and cache directories.

use anyhow::{Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Assert file exists and contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) -> Result<()> {
    if !path.exists() {
        bail!("File not found: {}", path.display());
    }

    let content = fs::read_to_string(path)?;

    if !content.contains(expected) {
        bail!(
            "File {} does not contain expected content: {expected}",
            path.display()
        );
    }

    Ok(())
}

/// Assert that file matches expected content exactly.
pub fn assert_file_equals(path: &Path, expected: &str) -> Result<()> {
    if !path.exists() {
        bail!("File not found: {}", path.display());
    }

    let content = fs::read_to_string(path)?;

    if content != expected {
        bail!(
            "File {} content mismatch.\nExpected:\n{expected}\n\nActual:\n{content}",
            path.display()
        );
    }

    Ok(())
}

/// Every regular file below `dir`, sorted.
pub fn files_under(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Assert that a directory tree contains the expected number of files.
pub fn assert_tree_file_count(dir: &Path, expected: usize) -> Result<()> {
    let count = files_under(dir)?.len();
    if count != expected {
        bail!(
            "Directory {} has {count} files, expected {expected}",
            dir.display()
        );
    }
    Ok(())
}

/// Assert that `dir` holds no cache artifacts at all.
pub fn assert_no_artifacts(dir: &Path) -> Result<()> {
    let files = files_under(dir)?;
    if !files.is_empty() {
        bail!(
            "Expected no files below {}, found: {files:?}",
            dir.display()
        );
    }
    Ok(())
}
