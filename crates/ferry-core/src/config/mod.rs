//! Configuration management for the global and project scopes
//!
//! - Global: user-wide defaults (~/.config/ferry/ferry.toml)
//! - Project: per-project settings (<project root>/ferry.toml)

pub mod merge;
pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use merge::merge_configs;
pub use parser::{parse_ferry_toml, parse_ferry_toml_str};
pub use paths::{CONFIG_FILE, config_path_for_scope};
pub use schema::{FerryConfig, OrgConfig, StagingConfig, ToolConfig};
pub use store::ConfigStore;

/// Configuration scope levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigScope {
    /// User-wide configuration
    Global,
    /// Project configuration, usually committed with the project
    Project,
}

/// Load and merge both layers.
pub fn load_merged(global_dir: &Path, project_root: &Path) -> anyhow::Result<FerryConfig> {
    let global = ConfigStore::from_paths(ConfigScope::Global, global_dir, project_root).load()?;
    let project = ConfigStore::from_paths(ConfigScope::Project, global_dir, project_root).load()?;
    Ok(merge_configs(global, project))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_merged_reads_both_layers() {
        let tmp = tempfile::tempdir().unwrap();
        let global_dir = tmp.path().join("config");
        let project = tmp.path().join("project");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(global_dir.join(CONFIG_FILE), "[tool]\nretrieve_wait = 5\n").unwrap();
        std::fs::write(project.join(CONFIG_FILE), "[org]\napi_version = \"59.0\"\n").unwrap();

        let config = load_merged(&global_dir, &project).unwrap();

        assert_eq!(config.retrieve_wait(), 5);
        assert_eq!(config.org.api_version.as_deref(), Some("59.0"));
    }

    #[test]
    fn load_merged_without_files_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_merged(&tmp.path().join("none"), tmp.path()).unwrap();
        assert_eq!(config, FerryConfig::default());
    }
}
