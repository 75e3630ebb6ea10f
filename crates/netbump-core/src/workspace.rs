//! Workspace discovery: the deterministic file inventory upgraders select from.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

use crate::error::BumpError;

/// Directory names never descended into.
const EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "bin",
    "obj",
    "node_modules",
    ".vs",
    "artifacts",
    "packages",
    "TestResults",
];

/// Build a GlobSet from a list of patterns. `*` never crosses a `/`.
pub fn build_glob_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet, BumpError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| BumpError::invalid_args(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| BumpError::invalid_args(format!("invalid glob set: {}", e)))
}

/// Files under a workspace root, as sorted `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    files: Vec<String>,
}

impl Workspace {
    /// Walk `root`, skipping build output and VCS directories plus anything
    /// matching `excludes`.
    pub fn discover<S: AsRef<str>>(root: &Path, excludes: &[S]) -> Result<Self, BumpError> {
        let workspace_err = |message: String| BumpError::Workspace {
            path: root.to_path_buf(),
            message,
        };
        if !root.is_dir() {
            return Err(workspace_err("not a directory".to_string()));
        }
        let excluded = build_glob_set(excludes)?;

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !is_excluded_dir(e))
        {
            let entry = entry.map_err(|e| workspace_err(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| workspace_err(e.to_string()))?
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            if excluded.is_match(&relative) {
                continue;
            }
            files.push(relative);
        }
        files.sort();

        Ok(Workspace {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Absolute path of a relative workspace file.
    pub fn path_of(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Files matching `patterns`, in inventory order.
    pub fn matching<'w>(&'w self, patterns: &GlobSet) -> Vec<&'w str> {
        self.files
            .iter()
            .filter(|f| patterns.is_match(f.as_str()))
            .map(String::as_str)
            .collect()
    }
}

fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDE_DIRS.contains(&name))
}
