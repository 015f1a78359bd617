//! Source discovery and output writing.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::AssetError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A set of files under a base directory selected by glob patterns.
///
/// Patterns are matched against the path relative to `base`, so `*.js` only
/// selects files directly inside it while `**/*.js` selects every depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    /// Directory the patterns are relative to
    pub base: PathBuf,

    /// Patterns a file must match at least one of
    pub include: Vec<String>,

    /// Patterns that remove a file from the set
    pub exclude: Vec<String>,
}

impl SourceSet {
    /// Create a source set with no exclusions.
    pub fn new(base: impl Into<PathBuf>, include: &[&str]) -> Self {
        Self {
            base: base.into(),
            include: include.iter().map(|p| p.to_string()).collect(),
            exclude: Vec::new(),
        }
    }

    /// Add exclusion patterns.
    pub fn excluding(mut self, exclude: &[&str]) -> Self {
        self.exclude.extend(exclude.iter().map(|p| p.to_string()));
        self
    }

    /// Whether a path relative to `base` belongs to the set.
    pub fn matches_relative(&self, relative: &Path) -> Result<bool, AssetError> {
        let included = any_match(&self.include, relative)?;
        Ok(included && !any_match(&self.exclude, relative)?)
    }

    /// List matching files, sorted. A missing base yields an empty list.
    pub fn files(&self) -> Result<Vec<PathBuf>, AssetError> {
        if !self.base.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(&self.base)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(&self.base).unwrap_or(path);
            if self.matches_relative(relative)? {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Path of `file` relative to `base`, used to mirror it into an output dir.
    pub fn relative<'a>(&self, file: &'a Path) -> &'a Path {
        file.strip_prefix(&self.base).unwrap_or(file)
    }
}

fn any_match(patterns: &[String], relative: &Path) -> Result<bool, AssetError> {
    for raw in patterns {
        let pattern = Pattern::new(raw).map_err(|e| AssetError::Pattern {
            pattern: raw.clone(),
            message: e.to_string(),
        })?;
        if pattern.matches_path_with(relative, MATCH_OPTIONS) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Write `contents` to `path` unless the file already holds exactly those bytes.
///
/// Parent directories are created as needed. Returns whether a write happened.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> Result<bool, AssetError> {
    if let Ok(existing) = fs::read(path) {
        if existing == contents {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
    }

    fs::write(path, contents).map_err(|e| AssetError::io(path, e))?;
    Ok(true)
}
