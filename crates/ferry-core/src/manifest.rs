//! Descriptor documents consumed by the external tool.
//!
//! - [`ProjectDescriptor`] (`sfdx-project.json`) turns the staging tree into a
//!   deployable project.
//! - [`PackageManifest`] (`package.xml`) declares what a retrieval pulls.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::staging::MODULE_DIR;

pub const PROJECT_DESCRIPTOR_FILE: &str = "sfdx-project.json";
pub const PACKAGE_MANIFEST_FILE: &str = "package.xml";
pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";
pub const METADATA_XMLNS: &str = "http://soap.sforce.com/2006/04/metadata";

const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDirectory {
    pub path: String,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    pub package_directories: Vec<PackageDirectory>,
    pub namespace: String,
    pub sfdc_login_url: String,
    pub source_api_version: String,
}

/// Build the descriptor for a staging tree: one default package directory
/// pointing at the module subtree.
pub fn build_project_descriptor(api_version: &str, login_url: &str) -> ProjectDescriptor {
    ProjectDescriptor {
        package_directories: vec![PackageDirectory {
            path: MODULE_DIR.to_string(),
            default: true,
        }],
        namespace: String::new(),
        sfdc_login_url: login_url.to_string(),
        source_api_version: api_version.to_string(),
    }
}

impl ProjectDescriptor {
    /// Write `sfdx-project.json` into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(PROJECT_DESCRIPTOR_FILE);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::descriptor("failed to serialize project descriptor", e))?;
        std::fs::write(&path, content)
            .map_err(|e| PipelineError::descriptor(path.display(), e))?;
        Ok(path)
    }
}

/// Which instances of a component type to retrieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Members {
    /// Every instance of the type.
    All,
    Named(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    pub type_name: String,
    pub members: Members,
    pub api_version: String,
}

/// Build a single-type manifest. No names means all instances.
///
/// Names are kept exactly as given: same order, duplicates preserved, no
/// existence check.
pub fn build_package_manifest(
    type_name: &str,
    names: &[String],
    api_version: &str,
) -> PackageManifest {
    let members = if names.is_empty() {
        Members::All
    } else {
        Members::Named(names.to_vec())
    };
    PackageManifest {
        type_name: type_name.to_string(),
        members,
        api_version: api_version.to_string(),
    }
}

impl PackageManifest {
    pub fn member_names(&self) -> Vec<&str> {
        match &self.members {
            Members::All => vec![WILDCARD],
            Members::Named(names) => names.iter().map(String::as_str).collect(),
        }
    }

    /// Render the `package.xml` document.
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(xml, "<Package xmlns=\"{}\">", METADATA_XMLNS);
        xml.push_str("    <types>\n");
        for member in self.member_names() {
            let _ = writeln!(xml, "        <members>{}</members>", escape_xml(member));
        }
        let _ = writeln!(xml, "        <name>{}</name>", escape_xml(&self.type_name));
        xml.push_str("    </types>\n");
        let _ = writeln!(xml, "    <version>{}</version>", escape_xml(&self.api_version));
        xml.push_str("</Package>\n");
        xml
    }

    /// Write `package.xml` into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(PACKAGE_MANIFEST_FILE);
        std::fs::write(&path, self.to_xml())
            .map_err(|e| PipelineError::descriptor(path.display(), e))?;
        Ok(path)
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
