//! Deploy and retrieve runs.
//!
//! A run walks a fixed sequence of [`Stage`]s. Staged runs own a
//! [`StagingArea`] that is destroyed before the result is returned, whether
//! the run succeeded or not.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::aggregate::{MergePolicy, SourceAggregator};
use crate::collect::{ArtifactDescriptor, collect};
use crate::config::FerryConfig;
use crate::error::{PipelineError, Result};
use crate::manifest::{build_package_manifest, build_project_descriptor};
use crate::project::ModuleDescriptor;
use crate::staging::StagingArea;
use crate::tool::{
    MdapiDeploy, MdapiRetrieve, MetadataTool, SourceDeploy, SourceRetrieve, TargetOrg,
};
use crate::unpack::{RetrievalUnpacker, UnpackOptions};

/// Component types retrieved through a source-format project instead of a
/// package manifest.
pub const SOURCE_RETRIEVE_TYPES: &[&str] = &[
    "CustomObject",
    "CustomField",
    "ListView",
    "ValidationRule",
    "RecordType",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Stage,
    Describe,
    Convert,
    Execute,
    Collect,
    Cleanup,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Stage => "stage",
            Stage::Describe => "describe",
            Stage::Convert => "convert",
            Stage::Execute => "execute",
            Stage::Collect => "collect",
            Stage::Cleanup => "cleanup",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a deploy run pushes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployMode {
    /// One file or directory, relative to the project root.
    Component(PathBuf),
    /// A directory whose contents become the module's `main/default`.
    Directory(PathBuf),
    /// Modules in dependency order.
    Modules {
        modules: Vec<ModuleDescriptor>,
        /// Deploy each module on its own instead of merging them.
        sequential: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub mode: DeployMode,
    pub validate_only: bool,
    /// Where the converted package is copied; the project root when unset.
    pub package_location: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub type_name: String,
    /// Empty means every component of the type.
    pub names: Vec<String>,
    pub target_dir: PathBuf,
    pub include_dir: bool,
    pub mdapi_format: bool,
}

impl RetrievalRequest {
    pub fn uses_source_retrieve(&self) -> bool {
        SOURCE_RETRIEVE_TYPES.contains(&self.type_name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployOutcome {
    /// Converted package and its copy; absent for one-by-one module deploys.
    pub package: Option<ArtifactDescriptor>,
    /// Collected package copy, or each module path in deploy order.
    pub deployed: Vec<PathBuf>,
    pub validate_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrieveOutcome {
    pub target_dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Resolved inputs shared by every run.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub project_root: PathBuf,
    pub staging_base: PathBuf,
    pub target: TargetOrg,
    /// Fixed API version; asked of the tool when unset.
    pub api_version: Option<String>,
    pub login_url: String,
    pub deploy_wait: u32,
    pub retrieve_wait: u32,
    pub merge_policy: MergePolicy,
}

impl RunnerSettings {
    pub fn from_config(config: &FerryConfig, project_root: PathBuf) -> Self {
        Self {
            project_root,
            staging_base: config.staging_base(),
            target: TargetOrg::new(config.org.target_username.clone()),
            api_version: config.org.api_version.clone(),
            login_url: config.login_url().to_string(),
            deploy_wait: config.deploy_wait(),
            retrieve_wait: config.retrieve_wait(),
            merge_policy: config.merge_policy(),
        }
    }
}

/// Logs stage transitions for one run.
struct StageTracker {
    operation: &'static str,
    current: Stage,
}

impl StageTracker {
    fn new(operation: &'static str) -> Self {
        tracing::debug!(operation, stage = %Stage::Init, "pipeline stage");
        Self {
            operation,
            current: Stage::Init,
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(
            operation = self.operation,
            from = %self.current,
            stage = %stage,
            "pipeline stage"
        );
        self.current = stage;
    }

    fn current(&self) -> Stage {
        self.current
    }

    /// Record the terminal state and hand the result back unchanged.
    fn finish<T>(mut self, failed_at: Stage, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.enter(Stage::Done),
            Err(err) => {
                self.enter(Stage::Failed);
                tracing::debug!(
                    operation = self.operation,
                    failed_at = %failed_at,
                    kind = err.kind(),
                    "pipeline failed"
                );
            }
        }
        result
    }
}

/// Sequences deploy and retrieve runs against a [`MetadataTool`].
#[derive(Debug)]
pub struct PipelineRunner<T> {
    tool: T,
    settings: RunnerSettings,
}

impl<T: MetadataTool> PipelineRunner<T> {
    pub fn new(tool: T, settings: RunnerSettings) -> Self {
        Self { tool, settings }
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub async fn deploy(&self, request: &DeploymentRequest) -> Result<DeployOutcome> {
        if let DeployMode::Modules {
            modules,
            sequential: true,
        } = &request.mode
        {
            return self.deploy_sequential(modules, request).await;
        }

        let mut stages = StageTracker::new("deploy");
        let mut staging = StagingArea::create(&self.settings.staging_base)?;
        tracing::info!(
            root = %staging.root().display(),
            validate_only = request.validate_only,
            "deploy started"
        );

        let result = self.deploy_staged(&staging, request, &mut stages).await;
        let failed_at = stages.current();

        stages.enter(Stage::Cleanup);
        staging.destroy();

        let outcome = stages.finish(failed_at, result)?;
        tracing::info!(deployed = outcome.deployed.len(), "deploy finished");
        Ok(outcome)
    }

    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrieveOutcome> {
        let mut stages = StageTracker::new("retrieve");
        let mut staging = StagingArea::create(&self.settings.staging_base)?;
        tracing::info!(
            type_name = %request.type_name,
            names = request.names.len(),
            target = %request.target_dir.display(),
            "retrieve started"
        );

        let result = if request.uses_source_retrieve() {
            self.retrieve_source_format(&staging, request, &mut stages)
                .await
        } else {
            self.retrieve_archive(&staging, request, &mut stages).await
        };
        let failed_at = stages.current();

        stages.enter(Stage::Cleanup);
        staging.destroy();

        let outcome = stages.finish(failed_at, result)?;
        tracing::info!(files = outcome.files.len(), "retrieve finished");
        Ok(outcome)
    }

    async fn deploy_staged(
        &self,
        staging: &StagingArea,
        request: &DeploymentRequest,
        stages: &mut StageTracker,
    ) -> Result<DeployOutcome> {
        stages.enter(Stage::Stage);
        let aggregator = SourceAggregator::new(
            self.settings.project_root.clone(),
            self.settings.merge_policy,
        );
        match &request.mode {
            DeployMode::Component(path) => aggregator.stage_component(staging, path)?,
            DeployMode::Directory(path) => aggregator.stage_directory(staging, path)?,
            DeployMode::Modules { modules, .. } => aggregator.stage_modules(staging, modules)?,
        };

        stages.enter(Stage::Describe);
        let api_version = self.api_version().await?;
        build_project_descriptor(&api_version, &self.settings.login_url)
            .write_to(staging.root())?;

        stages.enter(Stage::Convert);
        let package = self
            .tool
            .convert(staging.root())
            .await
            .map_err(PipelineError::Conversion)?;
        tracing::info!(package = %package.display(), "source converted");

        stages.enter(Stage::Execute);
        self.tool
            .deploy(&MdapiDeploy {
                deploy_dir: &package,
                validate_only: request.validate_only,
                target: &self.settings.target,
                wait: self.settings.deploy_wait,
                cwd: &self.settings.project_root,
            })
            .await
            .map_err(PipelineError::Deployment)?;

        stages.enter(Stage::Collect);
        let destination = request
            .package_location
            .as_deref()
            .unwrap_or(&self.settings.project_root);
        let descriptor = collect(&package, destination)?;

        Ok(DeployOutcome {
            deployed: vec![descriptor.destination_path.clone()],
            package: Some(descriptor),
            validate_only: request.validate_only,
        })
    }

    /// One source deploy per module, in order; nothing is staged.
    async fn deploy_sequential(
        &self,
        modules: &[ModuleDescriptor],
        request: &DeploymentRequest,
    ) -> Result<DeployOutcome> {
        if request.validate_only {
            tracing::warn!("validate-only is not supported for one-by-one module deploys; ignoring");
        }
        if let Some(location) = &request.package_location {
            tracing::warn!(
                location = %location.display(),
                "package location is not used for one-by-one module deploys; ignoring"
            );
        }

        let mut stages = StageTracker::new("deploy");
        stages.enter(Stage::Execute);
        let aggregator = SourceAggregator::new(
            self.settings.project_root.clone(),
            self.settings.merge_policy,
        );

        let mut deployed = Vec::new();
        let mut result = Ok(());
        for target in aggregator.sequential_targets(modules) {
            tracing::info!(module = %target.display(), "deploying module");
            let request = SourceDeploy {
                source_path: &target,
                target: &self.settings.target,
                wait: self.settings.deploy_wait,
                cwd: &self.settings.project_root,
            };
            if let Err(err) = self.tool.deploy_source(&request).await {
                result = Err(PipelineError::Deployment(err));
                break;
            }
            deployed.push(target);
        }

        stages.finish(Stage::Execute, result)?;
        tracing::info!(deployed = deployed.len(), "deploy finished");
        Ok(DeployOutcome {
            package: None,
            deployed,
            validate_only: false,
        })
    }

    async fn retrieve_archive(
        &self,
        staging: &StagingArea,
        request: &RetrievalRequest,
        stages: &mut StageTracker,
    ) -> Result<RetrieveOutcome> {
        stages.enter(Stage::Describe);
        let api_version = self.api_version().await?;
        let manifest_path =
            build_package_manifest(&request.type_name, &request.names, &api_version)
                .write_to(staging.root())?;

        stages.enter(Stage::Execute);
        let archive = self
            .tool
            .retrieve(&MdapiRetrieve {
                manifest: &manifest_path,
                output_dir: staging.root(),
                target: &self.settings.target,
                wait: self.settings.retrieve_wait,
                cwd: &self.settings.project_root,
            })
            .await
            .map_err(PipelineError::Retrieval)?;

        stages.enter(Stage::Collect);
        let unpacker = RetrievalUnpacker::new(UnpackOptions {
            include_dir: request.include_dir,
            mdapi_format: request.mdapi_format,
        });
        let files = unpacker
            .unpack(&archive, staging.root(), &request.target_dir)
            .await?;

        Ok(RetrieveOutcome {
            target_dir: request.target_dir.clone(),
            files,
        })
    }

    async fn retrieve_source_format(
        &self,
        staging: &StagingArea,
        request: &RetrievalRequest,
        stages: &mut StageTracker,
    ) -> Result<RetrieveOutcome> {
        if request.include_dir || request.mdapi_format {
            tracing::warn!(
                type_name = %request.type_name,
                "include-dir and mdapi-format do not apply to this type; ignoring"
            );
        }

        stages.enter(Stage::Describe);
        let api_version = self.api_version().await?;
        build_project_descriptor(&api_version, &self.settings.login_url)
            .write_to(staging.root())?;

        stages.enter(Stage::Execute);
        let retrieved = self
            .tool
            .retrieve_source(&SourceRetrieve {
                type_name: &request.type_name,
                names: &request.names,
                target: &self.settings.target,
                wait: self.settings.retrieve_wait,
                cwd: staging.root(),
            })
            .await
            .map_err(PipelineError::Retrieval)?;

        stages.enter(Stage::Collect);
        let descriptor = collect(&retrieved, &request.target_dir)?;

        Ok(RetrieveOutcome {
            target_dir: request.target_dir.clone(),
            files: vec![descriptor.destination_path],
        })
    }

    async fn api_version(&self) -> Result<String> {
        if let Some(version) = &self.settings.api_version {
            return Ok(version.clone());
        }
        let version = self
            .tool
            .api_version(&self.settings.target, &self.settings.project_root)
            .await
            .map_err(|e| PipelineError::descriptor("failed to determine API version", e))?;
        tracing::debug!(api_version = %version, "resolved API version");
        Ok(version)
    }
}
