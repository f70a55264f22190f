//! Layered merge of global and project configuration.
//!
//! Keys set in the project layer replace the global value; unset keys fall
//! through to the global layer.

use super::schema::{FerryConfig, OrgConfig, StagingConfig, ToolConfig};

pub fn merge_configs(global: Option<FerryConfig>, project: Option<FerryConfig>) -> FerryConfig {
    let mut merged = global.unwrap_or_default();
    if let Some(layer) = project {
        merge_tool(&mut merged.tool, layer.tool);
        merge_org(&mut merged.org, layer.org);
        merge_staging(&mut merged.staging, layer.staging);
    }
    merged
}

fn merge_tool(base: &mut ToolConfig, layer: ToolConfig) {
    override_with(&mut base.program, layer.program);
    override_with(&mut base.deploy_wait, layer.deploy_wait);
    override_with(&mut base.retrieve_wait, layer.retrieve_wait);
}

fn merge_org(base: &mut OrgConfig, layer: OrgConfig) {
    override_with(&mut base.target_username, layer.target_username);
    override_with(&mut base.api_version, layer.api_version);
    override_with(&mut base.login_url, layer.login_url);
}

fn merge_staging(base: &mut StagingConfig, layer: StagingConfig) {
    override_with(&mut base.base_dir, layer.base_dir);
    override_with(&mut base.merge_policy, layer.merge_policy);
}

fn override_with<T>(base: &mut Option<T>, layer: Option<T>) {
    if layer.is_some() {
        *base = layer;
    }
}
