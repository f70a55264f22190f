//! Post-processing of a retrieved metadata archive.
//!
//! Extracts the archive, drops the request manifest it echoes back, locates
//! the single component-type directory, renames its members into source
//! format, and copies the result to the target directory.

use std::io;
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;

use crate::aggregate::with_meta_suffix;
use crate::error::{PipelineError, Result};
use crate::fs::copy_path;
use crate::manifest::PACKAGE_MANIFEST_FILE;

/// Top-level directory inside a retrieved archive.
pub const ARCHIVE_ROOT: &str = "unpackaged";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackOptions {
    /// Copy the component-type directory itself, not just its contents.
    pub include_dir: bool,
    /// Keep metadata-API file names instead of appending `-meta.xml`.
    pub mdapi_format: bool,
}

/// Extracted archive with its single component-type directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedTree {
    pub root: PathBuf,
    pub type_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RetrievalUnpacker {
    options: UnpackOptions,
}

impl RetrievalUnpacker {
    pub fn new(options: UnpackOptions) -> Self {
        Self { options }
    }

    /// Unpack `archive` inside `work_dir` and place the result in `target_dir`.
    ///
    /// Returns every file written under `target_dir`.
    pub async fn unpack(
        &self,
        archive: &Path,
        work_dir: &Path,
        target_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let tree = self.open(archive, work_dir).await?;

        if !self.options.mdapi_format {
            let renamed = rename_members(&tree.type_dir)?;
            tracing::debug!(count = renamed.len(), "renamed members to source format");
        }

        let source = if self.options.include_dir {
            &tree.root
        } else {
            &tree.type_dir
        };
        copy_path(source, target_dir).map_err(|e| PipelineError::unpack(target_dir.display(), e))
    }

    /// Extract and validate the archive layout without touching the target.
    pub async fn open(&self, archive: &Path, work_dir: &Path) -> Result<RetrievedTree> {
        extract_archive(archive, work_dir)?;
        remove_file_if_present(archive)?;

        let root = work_dir.join(ARCHIVE_ROOT);
        if !root.is_dir() {
            return Err(PipelineError::Unpack(format!(
                "archive has no top-level '{}' directory",
                ARCHIVE_ROOT
            )));
        }
        remove_file_if_present(&root.join(PACKAGE_MANIFEST_FILE))?;

        let directories = list_directories(&root).await?;
        let type_dir = single_type_dir(&root, directories)?;
        Ok(RetrievedTree { root, type_dir })
    }
}

/// Extract a zip archive into `dest`, skipping entries with unsafe paths.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(archive)
        .map_err(|e| PipelineError::unpack(archive.display(), e))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| PipelineError::unpack(archive.display(), e))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| PipelineError::unpack(format!("zip entry {}", i), e))?;

        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => {
                tracing::warn!(entry = %entry.name(), "skipping archive entry with unsafe path");
                continue;
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| PipelineError::unpack(outpath.display(), e))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::unpack(parent.display(), e))?;
        }
        let mut outfile = std::fs::File::create(&outpath)
            .map_err(|e| PipelineError::unpack(outpath.display(), e))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|e| PipelineError::unpack(outpath.display(), e))?;
    }

    Ok(())
}

/// Immediate subdirectories of `dir`.
///
/// One metadata check per entry runs concurrently; results are sorted so the
/// output does not depend on completion order.
pub async fn list_directories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::unpack(dir.display(), e))?;

    let mut checks = JoinSet::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::unpack(dir.display(), e))?
    {
        let path = entry.path();
        checks.spawn(async move {
            let meta = tokio::fs::metadata(&path).await;
            (path, meta)
        });
    }

    let mut directories = Vec::new();
    while let Some(joined) = checks.join_next().await {
        let (path, meta) =
            joined.map_err(|e| PipelineError::unpack("directory check did not complete", e))?;
        let meta = meta.map_err(|e| PipelineError::unpack(path.display(), e))?;
        if meta.is_dir() {
            directories.push(path);
        }
    }
    directories.sort();
    Ok(directories)
}

/// Require exactly one component-type directory.
fn single_type_dir(root: &Path, mut directories: Vec<PathBuf>) -> Result<PathBuf> {
    match directories.len() {
        1 => Ok(directories.remove(0)),
        0 => Err(PipelineError::Unpack(format!(
            "no component-type directory found in {}",
            root.display()
        ))),
        _ => {
            let names: Vec<String> = directories
                .iter()
                .filter_map(|dir| dir.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect();
            Err(PipelineError::Unpack(format!(
                "expected one component-type directory in {}, found {}: {}",
                root.display(),
                names.len(),
                names.join(", ")
            )))
        }
    }
}

/// Append `-meta.xml` to every regular file directly inside `dir`.
///
/// Nested directories and their contents are left alone.
pub fn rename_members(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::unpack(dir.display(), e))?;
    let mut renamed = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::unpack(dir.display(), e))?;
        let ty = entry
            .file_type()
            .map_err(|e| PipelineError::unpack(entry.path().display(), e))?;
        if !ty.is_file() {
            continue;
        }
        let from = entry.path();
        let to = dir.join(with_meta_suffix(&entry.file_name()));
        std::fs::rename(&from, &to).map_err(|e| PipelineError::unpack(from.display(), e))?;
        renamed.push(to);
    }
    Ok(renamed)
}

fn remove_file_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(PipelineError::unpack(path.display(), err)),
    }
}
