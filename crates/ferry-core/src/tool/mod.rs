//! External conversion/deploy/retrieve tool.
//!
//! The pipeline talks to the tool only through [`MetadataTool`], so tests and
//! alternative CLIs can stand in for the real [`SfdxTool`].

mod sfdx;

use std::path::{Path, PathBuf};

pub use sfdx::SfdxTool;

use crate::error::ToolError;

/// Identity of the remote environment, passed through verbatim.
///
/// `None` lets the tool fall back to its own default target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetOrg {
    pub username: Option<String>,
}

impl TargetOrg {
    pub fn new(username: Option<String>) -> Self {
        Self { username }
    }
}

/// Deploy a converted metadata package.
#[derive(Debug, Clone, Copy)]
pub struct MdapiDeploy<'a> {
    pub deploy_dir: &'a Path,
    pub validate_only: bool,
    pub target: &'a TargetOrg,
    pub wait: u32,
    pub cwd: &'a Path,
}

/// Deploy a source-format path directly.
#[derive(Debug, Clone, Copy)]
pub struct SourceDeploy<'a> {
    pub source_path: &'a Path,
    pub target: &'a TargetOrg,
    pub wait: u32,
    pub cwd: &'a Path,
}

/// Retrieve the components declared in a package manifest as an archive.
#[derive(Debug, Clone, Copy)]
pub struct MdapiRetrieve<'a> {
    pub manifest: &'a Path,
    pub output_dir: &'a Path,
    pub target: &'a TargetOrg,
    pub wait: u32,
    pub cwd: &'a Path,
}

/// Retrieve components by `type:names` into a source-format project.
#[derive(Debug, Clone, Copy)]
pub struct SourceRetrieve<'a> {
    pub type_name: &'a str,
    pub names: &'a [String],
    pub target: &'a TargetOrg,
    pub wait: u32,
    pub cwd: &'a Path,
}

impl SourceRetrieve<'_> {
    /// `Type` or `Type:a,b` as the tool expects it.
    pub fn metadata_arg(&self) -> String {
        if self.names.is_empty() {
            self.type_name.to_string()
        } else {
            format!("{}:{}", self.type_name, self.names.join(","))
        }
    }
}

/// Operations the pipeline needs from the external tool.
///
/// Each call blocks the run until the tool exits; nothing is retried.
#[allow(async_fn_in_trait)]
pub trait MetadataTool {
    /// Highest API version supported by the target environment.
    async fn api_version(&self, target: &TargetOrg, cwd: &Path) -> Result<String, ToolError>;

    /// Convert the project rooted at `project_dir`; returns the produced package directory.
    async fn convert(&self, project_dir: &Path) -> Result<PathBuf, ToolError>;

    async fn deploy(&self, request: &MdapiDeploy<'_>) -> Result<(), ToolError>;

    async fn deploy_source(&self, request: &SourceDeploy<'_>) -> Result<(), ToolError>;

    /// Returns the path of the written archive.
    async fn retrieve(&self, request: &MdapiRetrieve<'_>) -> Result<PathBuf, ToolError>;

    /// Returns the first retrieved file, relative paths resolved against `cwd`.
    async fn retrieve_source(&self, request: &SourceRetrieve<'_>) -> Result<PathBuf, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_arg_with_and_without_names() {
        let target = TargetOrg::default();
        let names = vec!["Account".to_string(), "Lead".to_string()];
        let mut request = SourceRetrieve {
            type_name: "CustomObject",
            names: &names,
            target: &target,
            wait: 30,
            cwd: Path::new("."),
        };
        assert_eq!(request.metadata_arg(), "CustomObject:Account,Lead");

        request.names = &[];
        assert_eq!(request.metadata_arg(), "CustomObject");
    }
}
