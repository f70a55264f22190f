//! Copy requested source subsets into a staging area.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::fs::{copy_path, list_files};
use crate::project::ModuleDescriptor;
use crate::staging::StagingArea;

/// Suffix of the descriptor file paired with a source-format component.
pub const META_SUFFIX: &str = "-meta.xml";

/// How files from several modules combine when staged into one tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// A later module's file replaces an earlier module's file at the same path.
    #[default]
    LastWriteWins,
    /// Two modules providing the same path abort the run.
    FailOnConflict,
}

impl MergePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            MergePolicy::LastWriteWins => "last-write-wins",
            MergePolicy::FailOnConflict => "fail-on-conflict",
        }
    }
}

/// Stages project source into a [`StagingArea`].
///
/// All request paths are relative to the project root.
#[derive(Debug, Clone)]
pub struct SourceAggregator {
    project_root: PathBuf,
    policy: MergePolicy,
}

impl SourceAggregator {
    pub fn new(project_root: PathBuf, policy: MergePolicy) -> Self {
        Self {
            project_root,
            policy,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Copy one component to the same relative position under the module root.
    ///
    /// A file's `-meta.xml` sibling travels with it when present.
    pub fn stage_component(&self, staging: &StagingArea, path: &Path) -> Result<Vec<PathBuf>> {
        let src = self.project_root.join(path);
        let dst = staging.module_root().join(path);
        let mut written =
            copy_path(&src, &dst).map_err(|e| PipelineError::aggregation(path.display(), e))?;

        if src.is_file()
            && let Some(meta_src) = meta_sibling(&src)
            && meta_src.is_file()
            && let Some(meta_dst) = meta_sibling(&dst)
        {
            written.extend(
                copy_path(&meta_src, &meta_dst)
                    .map_err(|e| PipelineError::aggregation(meta_src.display(), e))?,
            );
        }

        tracing::debug!(path = %path.display(), files = written.len(), "staged component");
        Ok(written)
    }

    /// Copy a directory's contents into `tempModule/main/default`.
    pub fn stage_directory(&self, staging: &StagingArea, path: &Path) -> Result<Vec<PathBuf>> {
        let src = self.project_root.join(path);
        if !src.is_dir() {
            return Err(PipelineError::Aggregation(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        let written = copy_path(&src, &staging.default_dir())
            .map_err(|e| PipelineError::aggregation(path.display(), e))?;
        tracing::debug!(path = %path.display(), files = written.len(), "staged directory");
        Ok(written)
    }

    /// Merge each module's `main/default` into the shared staging tree, in order.
    pub fn stage_modules(
        &self,
        staging: &StagingArea,
        modules: &[ModuleDescriptor],
    ) -> Result<Vec<PathBuf>> {
        let dst = staging.default_dir();
        let mut owners: HashMap<PathBuf, &str> = HashMap::new();
        let mut written = Vec::new();

        for module in modules {
            let src = self.module_default_dir(module);
            let files =
                list_files(&src).map_err(|e| PipelineError::aggregation(&module.path, e))?;

            for relative in &files {
                if let Some(previous) = owners.get(relative) {
                    match self.policy {
                        MergePolicy::FailOnConflict => {
                            return Err(PipelineError::Aggregation(format!(
                                "{} is provided by both module '{}' and module '{}'",
                                relative.display(),
                                previous,
                                module.path
                            )));
                        }
                        MergePolicy::LastWriteWins => {
                            tracing::debug!(
                                file = %relative.display(),
                                from = %previous,
                                to = %module.path,
                                "module overrides staged file"
                            );
                        }
                    }
                }
            }

            written.extend(
                copy_path(&src, &dst).map_err(|e| PipelineError::aggregation(&module.path, e))?,
            );
            for relative in files {
                owners.insert(relative, module.path.as_str());
            }
            tracing::debug!(module = %module.path, "staged module");
        }

        Ok(written)
    }

    /// Source paths for a one-by-one deploy, in dependency order.
    pub fn sequential_targets(&self, modules: &[ModuleDescriptor]) -> Vec<PathBuf> {
        modules
            .iter()
            .map(|module| self.project_root.join(&module.path))
            .collect()
    }

    fn module_default_dir(&self, module: &ModuleDescriptor) -> PathBuf {
        self.project_root
            .join(&module.path)
            .join("main")
            .join("default")
    }
}

fn meta_sibling(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    if name.as_encoded_bytes().ends_with(META_SUFFIX.as_bytes()) {
        return None;
    }
    Some(path.with_file_name(with_meta_suffix(name)))
}

/// `name` followed by `-meta.xml`, without re-encoding the original bytes.
pub(crate) fn with_meta_suffix(name: &OsStr) -> OsString {
    let mut renamed = name.to_os_string();
    renamed.push(META_SUFFIX);
    renamed
}
