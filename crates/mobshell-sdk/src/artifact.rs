//! Build artifact discovery.
//!
//! Toolchain versions disagree about where packaged apps land, so lookup is
//! two-phase: the known candidate paths in priority order, then a recursive
//! search of the build output tree that stops at the first match.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::types::ShellError;

/// Finds an installable artifact for one platform.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    candidates: Vec<PathBuf>,
    search_root: PathBuf,
    extension: String,
}

impl ArtifactLocator {
    /// # Arguments
    ///
    /// * `search_root` - Build output tree searched when no candidate exists
    /// * `extension` - Package extension without the dot (`apk`, `app`)
    pub fn new(search_root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            candidates: Vec::new(),
            search_root: search_root.into(),
            extension: extension.into(),
        }
    }

    /// Adds a candidate path. Candidates are probed in insertion order.
    pub fn candidate(mut self, path: impl Into<PathBuf>) -> Self {
        self.candidates.push(path.into());
        self
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Returns the first existing candidate, else the first match under the search root.
    pub fn locate(&self) -> Result<PathBuf, ShellError> {
        if let Some(found) = self.candidates.iter().find(|path| path.exists()) {
            debug!(artifact = %found.display(), "found artifact at known location");
            return Ok(found.clone());
        }

        info!(
            "Searching for .{} in {}",
            self.extension,
            self.search_root.display()
        );
        match self.search() {
            Some(found) => {
                info!("Found artifact at {}", found.display());
                Ok(found)
            }
            None => Err(ShellError::ArtifactNotFound {
                extension: format!(".{}", self.extension),
                searched: self.search_root.clone(),
            }),
        }
    }

    fn search(&self) -> Option<PathBuf> {
        if !self.search_root.is_dir() {
            return None;
        }

        WalkDir::new(&self.search_root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(error = %e, "skipping unreadable path during artifact search");
                    None
                }
            })
            .find(|entry| self.matches(entry.path()))
            .map(walkdir::DirEntry::into_path)
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension() == Some(OsStr::new(&self.extension))
    }
}
