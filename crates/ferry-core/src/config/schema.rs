//! Configuration schema for ferry.toml
//!
//! The same structure is used for both layers:
//! - Global: ~/.config/ferry/ferry.toml
//! - Project: <project root>/ferry.toml
//!
//! Every key is optional so a layer only states what it overrides.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::aggregate::MergePolicy;
use crate::manifest::DEFAULT_LOGIN_URL;

pub const DEFAULT_PROGRAM: &str = "sfdx";
pub const DEFAULT_DEPLOY_WAIT: u32 = 20;
pub const DEFAULT_RETRIEVE_WAIT: u32 = 30;

/// Root configuration structure for ferry.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FerryConfig {
    #[serde(default)]
    pub tool: ToolConfig,

    #[serde(default)]
    pub org: OrgConfig,

    #[serde(default)]
    pub staging: StagingConfig,
}

/// External tool invocation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Executable name or path (defaults to `sfdx`)
    pub program: Option<String>,

    /// Wait budget, in minutes, for deploy calls
    pub deploy_wait: Option<u32>,

    /// Wait budget, in minutes, for retrieve calls
    pub retrieve_wait: Option<u32>,
}

/// Target environment settings passed through to the tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrgConfig {
    pub target_username: Option<String>,

    /// Skip asking the tool for the org's API version
    pub api_version: Option<String>,

    pub login_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StagingConfig {
    /// Parent directory for staging areas (defaults to the OS temp dir)
    pub base_dir: Option<PathBuf>,

    pub merge_policy: Option<MergePolicy>,
}

impl FerryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(&self) -> &str {
        self.tool.program.as_deref().unwrap_or(DEFAULT_PROGRAM)
    }

    pub fn deploy_wait(&self) -> u32 {
        self.tool.deploy_wait.unwrap_or(DEFAULT_DEPLOY_WAIT)
    }

    pub fn retrieve_wait(&self) -> u32 {
        self.tool.retrieve_wait.unwrap_or(DEFAULT_RETRIEVE_WAIT)
    }

    pub fn login_url(&self) -> &str {
        self.org.login_url.as_deref().unwrap_or(DEFAULT_LOGIN_URL)
    }

    pub fn staging_base(&self) -> PathBuf {
        self.staging
            .base_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.staging.merge_policy.unwrap_or_default()
    }

    /// Validate values that parse but cannot work.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tool.deploy_wait == Some(0) {
            anyhow::bail!("tool.deploy_wait must be greater than zero");
        }
        if self.tool.retrieve_wait == Some(0) {
            anyhow::bail!("tool.retrieve_wait must be greater than zero");
        }
        if let Some(program) = &self.tool.program
            && program.trim().is_empty()
        {
            anyhow::bail!("tool.program must not be empty");
        }
        Ok(())
    }
}
