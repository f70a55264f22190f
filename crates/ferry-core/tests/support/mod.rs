//! Shared fixtures for pipeline tests: a recording fake tool and project helpers.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ferry_core::aggregate::MergePolicy;
use ferry_core::error::{ToolError, ToolFailure};
use ferry_core::fs::list_files;
use ferry_core::pipeline::RunnerSettings;
use ferry_core::tool::{
    MdapiDeploy, MdapiRetrieve, MetadataTool, SourceDeploy, SourceRetrieve, TargetOrg,
};

pub const PACKAGE_NAME: &str = "metadataPackage_1700000000000";
pub const ORG_API_VERSION: &str = "58.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ApiVersion {
        username: Option<String>,
    },
    Convert {
        project_dir: PathBuf,
        /// Files under `tempModule`, relative to it, at conversion time.
        staged: Vec<PathBuf>,
        descriptor: String,
    },
    Deploy {
        deploy_dir: PathBuf,
        validate_only: bool,
        username: Option<String>,
        wait: u32,
    },
    DeploySource {
        source_path: PathBuf,
        wait: u32,
    },
    Retrieve {
        manifest: String,
        output_dir: PathBuf,
        wait: u32,
    },
    RetrieveSource {
        metadata: String,
        cwd: PathBuf,
    },
}

/// Tool operation that should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    ApiVersion,
    Convert,
    Deploy,
    /// Fail the n-th source deploy (0-based).
    DeploySource(usize),
    Retrieve,
    RetrieveSource,
}

/// Records every call and fakes the tool's filesystem effects.
#[derive(Debug, Default)]
pub struct FakeTool {
    calls: Mutex<Vec<Call>>,
    fail_on: Option<FailOn>,
    archive_entries: Vec<(String, String)>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(fail_on: FailOn) -> Self {
        Self {
            fail_on: Some(fail_on),
            ..Self::default()
        }
    }

    /// Entries of the archive written by `retrieve`.
    pub fn with_archive(mut self, entries: &[(&str, &str)]) -> Self {
        self.archive_entries = entries
            .iter()
            .map(|(name, content)| (name.to_string(), content.to_string()))
            .collect();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: FailOn, command: &str) -> Result<(), ToolError> {
        if self.fail_on == Some(op) {
            return Err(failure(command));
        }
        Ok(())
    }
}

pub fn failure(command: &str) -> ToolError {
    ToolFailure {
        command: format!("sfdx {}", command),
        status: Some(1),
        stdout: String::new(),
        stderr: format!("ERROR running {}: INVALID_SESSION_ID", command),
    }
    .into()
}

impl MetadataTool for FakeTool {
    async fn api_version(&self, target: &TargetOrg, _cwd: &Path) -> Result<String, ToolError> {
        self.record(Call::ApiVersion {
            username: target.username.clone(),
        });
        self.check(FailOn::ApiVersion, "force:org:display")?;
        Ok(ORG_API_VERSION.to_string())
    }

    async fn convert(&self, project_dir: &Path) -> Result<PathBuf, ToolError> {
        let staged = list_files(&project_dir.join("tempModule")).unwrap_or_default();
        let descriptor =
            std::fs::read_to_string(project_dir.join("sfdx-project.json")).unwrap_or_default();
        self.record(Call::Convert {
            project_dir: project_dir.to_path_buf(),
            staged,
            descriptor,
        });
        self.check(FailOn::Convert, "force:source:convert")?;

        let package = project_dir.join(PACKAGE_NAME);
        std::fs::create_dir_all(&package).unwrap();
        std::fs::write(package.join("package.xml"), "<Package/>").unwrap();
        Ok(package)
    }

    async fn deploy(&self, request: &MdapiDeploy<'_>) -> Result<(), ToolError> {
        self.record(Call::Deploy {
            deploy_dir: request.deploy_dir.to_path_buf(),
            validate_only: request.validate_only,
            username: request.target.username.clone(),
            wait: request.wait,
        });
        self.check(FailOn::Deploy, "force:mdapi:deploy")
    }

    async fn deploy_source(&self, request: &SourceDeploy<'_>) -> Result<(), ToolError> {
        let index = self
            .calls()
            .iter()
            .filter(|call| matches!(call, Call::DeploySource { .. }))
            .count();
        self.record(Call::DeploySource {
            source_path: request.source_path.to_path_buf(),
            wait: request.wait,
        });
        self.check(FailOn::DeploySource(index), "force:source:deploy")
    }

    async fn retrieve(&self, request: &MdapiRetrieve<'_>) -> Result<PathBuf, ToolError> {
        self.record(Call::Retrieve {
            manifest: std::fs::read_to_string(request.manifest).unwrap_or_default(),
            output_dir: request.output_dir.to_path_buf(),
            wait: request.wait,
        });
        self.check(FailOn::Retrieve, "force:mdapi:retrieve")?;

        let archive = request.output_dir.join("unpackaged.zip");
        let entries: Vec<(&str, &str)> = self
            .archive_entries
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_str()))
            .collect();
        write_zip(&archive, &entries);
        Ok(archive)
    }

    async fn retrieve_source(&self, request: &SourceRetrieve<'_>) -> Result<PathBuf, ToolError> {
        self.record(Call::RetrieveSource {
            metadata: request.metadata_arg(),
            cwd: request.cwd.to_path_buf(),
        });
        self.check(FailOn::RetrieveSource, "force:source:retrieve")?;

        let name = request.names.first().map(String::as_str).unwrap_or("Account");
        let file = request
            .cwd
            .join("tempModule/main/default/objects")
            .join(name)
            .join(format!("{}.object-meta.xml", name));
        write(&file, "<CustomObject/>");
        Ok(file)
    }
}

/// A temporary project with a staging base next to it.
pub struct Fixture {
    pub tmp: tempfile::TempDir,
    pub project: PathBuf,
    pub staging_base: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        let staging_base = tmp.path().join("staging");
        write(&project.join("sfdx-project.json"), "{}");
        std::fs::create_dir_all(&staging_base).unwrap();
        Self {
            tmp,
            project,
            staging_base,
        }
    }

    pub fn settings(&self) -> RunnerSettings {
        RunnerSettings {
            project_root: self.project.clone(),
            staging_base: self.staging_base.clone(),
            target: TargetOrg::new(Some("ci@example.com".to_string())),
            api_version: None,
            login_url: "https://login.salesforce.com".to_string(),
            deploy_wait: 20,
            retrieve_wait: 30,
            merge_policy: MergePolicy::LastWriteWins,
        }
    }

    pub fn write(&self, relative: &str, content: &str) {
        write(&self.project.join(relative), content);
    }

    /// Nothing left under the staging base.
    pub fn staging_is_clean(&self) -> bool {
        std::fs::read_dir(&self.staging_base)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

pub fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = std::fs::File::create(path).expect("Failed to create zip");
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        zip.start_file(*name, options)
            .expect("Failed to start zip entry");
        zip.write_all(content.as_bytes())
            .expect("Failed to write zip entry");
    }
    zip.finish().expect("Failed to finish zip");
}
