//! Source file discovery.
//!
//! Walks the scan root with `ignore`, pruning hidden directories, the
//! configured skip directories and any path matching an exclude glob before
//! descent. Entries are visited in path order so a fixed tree always yields
//! the same sequence.

use crate::errors::ScanError;
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-directory ignore file honoured in addition to `.gitignore`.
pub const IGNORE_FILE: &str = ".tenantlintignore";

/// Which paths the walker yields.
#[derive(Debug, Clone)]
pub struct WalkFilter {
    pub extensions: Vec<String>,
    pub skip_dirs: Vec<String>,
    pub exclude: Vec<String>,
    pub respect_gitignore: bool,
}

/// Compiled exclusion rules, shared with the walker's entry filter.
struct Exclusions {
    root: PathBuf,
    skip_dirs: Vec<String>,
    globs: Vec<Pattern>,
}

impl Exclusions {
    fn excludes(&self, path: &Path, is_dir: bool) -> bool {
        if path == self.root {
            return false;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if is_dir && (name.starts_with('.') || self.skip_dirs.iter().any(|d| d == name)) {
            return true;
        }
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let opts = MatchOptions::new();
        self.globs.iter().any(|g| {
            g.matches_path_with(rel, opts)
                // `dir/**` should prune `dir` itself.
                || (is_dir && g.matches_path_with(&rel.join("_"), opts) && g.as_str().ends_with("/**"))
        })
    }
}

/// Lazy sequence of source files under a root.
pub struct SourceFiles {
    inner: ignore::Walk,
    extensions: Vec<String>,
    root: PathBuf,
}

impl Iterator for SourceFiles {
    type Item = Result<PathBuf, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        for entry in self.inner.by_ref() {
            let entry = match entry {
                Ok(e) => e,
                Err(err) if err.is_partial() => {
                    tracing::warn!(error = %err, "ignore rules partially loaded");
                    continue;
                }
                Err(err) => {
                    let path = walk_error_path(&err).unwrap_or_else(|| self.root.clone());
                    return Some(Err(ScanError::Walk {
                        path,
                        message: err.to_string(),
                    }));
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.into_path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if self.extensions.iter().any(|x| x == ext) {
                return Some(Ok(path));
            }
        }
        None
    }
}

fn walk_error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        _ => None,
    }
}

/// Start walking `root`. Fails when `root` is missing or not a directory,
/// or when an exclude glob does not compile.
pub fn walk(root: &Path, filter: &WalkFilter) -> Result<SourceFiles, ScanError> {
    if !root.exists() {
        return Err(ScanError::RootNotFound {
            path: root.to_path_buf(),
        });
    }
    if !root.is_dir() {
        return Err(ScanError::RootNotDirectory {
            path: root.to_path_buf(),
        });
    }
    let globs = filter
        .exclude
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| ScanError::InvalidGlob {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let exclusions = Arc::new(Exclusions {
        root: root.to_path_buf(),
        skip_dirs: filter.skip_dirs.clone(),
        globs,
    });

    let mut builder = ignore::WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .git_ignore(filter.respect_gitignore)
        .git_exclude(filter.respect_gitignore)
        .require_git(true)
        .add_custom_ignore_filename(IGNORE_FILE)
        .follow_links(false)
        .sort_by_file_path(|a, b| a.cmp(b));
    builder.filter_entry(move |entry| {
        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
        !exclusions.excludes(entry.path(), is_dir)
    });

    Ok(SourceFiles {
        inner: builder.build(),
        extensions: filter.extensions.clone(),
        root: root.to_path_buf(),
    })
}
