//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::paths::default_global_dir;
use crate::config::{ConfigScope, ConfigStore, FerryConfig, load_merged};
use crate::error::{PipelineError, Result};
use crate::pipeline::{PipelineRunner, RunnerSettings};
use crate::project::{ModuleDescriptor, find_project_root, load_dependency_file, relative_to_root};
use crate::tool::SfdxTool;

/// Resolved paths and configuration for one invocation.
///
/// Frontends create this once and use it to build runners and resolve
/// user-supplied paths.
#[derive(Debug, Clone)]
pub struct AppContext {
    cwd: PathBuf,
    project_root: PathBuf,
    global_config_dir: PathBuf,
    config: FerryConfig,
}

impl AppContext {
    /// Discover the project containing `cwd` and load its configuration.
    pub fn discover(cwd: PathBuf) -> anyhow::Result<Self> {
        let global_config_dir = default_global_dir()?;
        Self::with_global_config_dir(cwd, global_config_dir)
    }

    /// Same as [`AppContext::discover`] with an explicit global config directory (for testing).
    pub fn with_global_config_dir(cwd: PathBuf, global_config_dir: PathBuf) -> anyhow::Result<Self> {
        let project_root = find_project_root(&cwd).ok_or_else(|| {
            PipelineError::Project(format!(
                "no sfdx-project.json found in {} or any parent directory",
                cwd.display()
            ))
        })?;
        let config = load_merged(&global_config_dir, &project_root)
            .context("Failed to load ferry configuration")?;
        config.validate().context("Invalid ferry configuration")?;
        tracing::debug!(project_root = %project_root.display(), "resolved project");

        Ok(Self {
            cwd,
            project_root,
            global_config_dir,
            config,
        })
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn global_config_dir(&self) -> &Path {
        &self.global_config_dir
    }

    pub fn config(&self) -> &FerryConfig {
        &self.config
    }

    /// Get a ConfigStore for the given scope.
    pub fn config_store(&self, scope: ConfigScope) -> ConfigStore {
        ConfigStore::from_paths(scope, &self.global_config_dir, &self.project_root)
    }

    /// Command-line values win over both config layers.
    pub fn apply_overrides(&mut self, target_username: Option<String>, api_version: Option<String>) {
        if target_username.is_some() {
            self.config.org.target_username = target_username;
        }
        if api_version.is_some() {
            self.config.org.api_version = api_version;
        }
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        let mut settings = RunnerSettings::from_config(&self.config, self.project_root.clone());
        if settings.staging_base.is_relative() {
            settings.staging_base = self.project_root.join(&settings.staging_base);
        }
        settings
    }

    /// Runner backed by the configured `sfdx` executable.
    pub fn runner(&self) -> PipelineRunner<SfdxTool> {
        PipelineRunner::new(SfdxTool::new(self.config.program()), self.runner_settings())
    }

    /// Absolute form of a user-supplied path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// A user-supplied path expressed relative to the project root.
    pub fn project_relative(&self, path: &Path) -> Result<PathBuf> {
        relative_to_root(path, &self.project_root, &self.cwd)
    }

    /// Read the ordered module list from a dependency file.
    pub fn load_modules(&self, dependency_file: &Path) -> Result<Vec<ModuleDescriptor>> {
        load_dependency_file(&self.resolve(dependency_file))
    }
}
