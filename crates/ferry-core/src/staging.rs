//! Ephemeral workspace for a single pipeline run.
//!
//! A [`StagingArea`] is created at the start of a run and removed when the run
//! ends. Removal is idempotent, never fails loudly, and also happens on drop,
//! so every exit path tears the tree down.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{PipelineError, Result};

/// Name of the single package directory inside the staging root.
pub const MODULE_DIR: &str = "tempModule";

const ROOT_PREFIX: &str = "ferry-staging.";

/// Disposable directory tree owned by one pipeline run.
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
    dir: Option<TempDir>,
    destroyed: bool,
}

impl StagingArea {
    /// Create `<base>/<unique root>/tempModule/main/default`.
    ///
    /// The root is claimed with an exclusive `mkdir`, so no two areas can
    /// share one, even across threads or processes.
    pub fn create(base: &Path) -> Result<Self> {
        std::fs::create_dir_all(base).map_err(|source| PipelineError::Staging {
            path: base.to_path_buf(),
            source,
        })?;
        let dir = tempfile::Builder::new()
            .prefix(ROOT_PREFIX)
            .tempdir_in(base)
            .map_err(|source| PipelineError::Staging {
                path: base.to_path_buf(),
                source,
            })?;
        // Own the root before creating anything, so a partial create is still cleaned up.
        let area = Self {
            root: dir.path().to_path_buf(),
            dir: Some(dir),
            destroyed: false,
        };
        let default_dir = area.default_dir();
        std::fs::create_dir_all(&default_dir).map_err(|source| PipelineError::Staging {
            path: default_dir.clone(),
            source,
        })?;
        tracing::debug!(root = %area.root.display(), "created staging area");
        Ok(area)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/tempModule`
    pub fn module_root(&self) -> PathBuf {
        self.root.join(MODULE_DIR)
    }

    /// `<root>/tempModule/main/default`
    pub fn default_dir(&self) -> PathBuf {
        self.module_root().join("main").join("default")
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Recursively remove the staging root.
    ///
    /// Safe to call any number of times. A failure to remove is logged and
    /// swallowed so it can never mask the error that ended the run.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        let result = match self.dir.take() {
            Some(dir) => dir.close().or_else(ignore_missing),
            None => remove_tree(&self.root),
        };
        match result {
            Ok(()) => {
                tracing::debug!(root = %self.root.display(), "removed staging area");
                self.destroyed = true;
            }
            Err(err) => {
                tracing::warn!(
                    root = %self.root.display(),
                    error = %err,
                    "failed to remove staging area"
                );
            }
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn remove_tree(path: &Path) -> io::Result<()> {
    std::fs::remove_dir_all(path).or_else(ignore_missing)
}

fn ignore_missing(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(err)
    }
}
