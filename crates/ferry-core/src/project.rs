//! Project root discovery and dependency file parsing.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::manifest::PROJECT_DESCRIPTOR_FILE;

/// One module in a dependency file, as a path relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleDescriptor {
    pub path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencyFile {
    package_directories: Vec<ModuleDescriptor>,
}

/// Nearest ancestor of `start` (inclusive) that holds a project descriptor.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(PROJECT_DESCRIPTOR_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Read the ordered module list from a dependency file.
///
/// Order is preserved exactly; it is the caller's dependency order.
pub fn load_dependency_file(path: &Path) -> Result<Vec<ModuleDescriptor>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::Project(format!(
            "failed to read dependency file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_dependency_file(&content).map_err(|e| {
        PipelineError::Project(format!(
            "failed to parse dependency file {}: {}",
            path.display(),
            e
        ))
    })
}

fn parse_dependency_file(content: &str) -> anyhow::Result<Vec<ModuleDescriptor>> {
    let file: DependencyFile = serde_json::from_str(content)?;
    for module in &file.package_directories {
        ensure_relative_path(Path::new(&module.path))?;
    }
    Ok(file.package_directories)
}

/// Express `path` relative to `root`, resolving relative inputs against `cwd`.
pub fn relative_to_root(path: &Path, root: &Path, cwd: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let absolute = normalize(&absolute);
    absolute
        .strip_prefix(normalize(root))
        .map(Path::to_path_buf)
        .map_err(|_| {
            PipelineError::Project(format!(
                "{} is outside the project root {}",
                path.display(),
                root.display()
            ))
        })
}

fn ensure_relative_path(path: &Path) -> anyhow::Result<()> {
    if path.is_absolute() {
        anyhow::bail!("Module path must be relative: {}", path.display());
    }
    for component in path.components() {
        if let Component::ParentDir = component {
            anyhow::bail!("Path traversal not allowed in module path: {}", path.display());
        }
    }
    Ok(())
}

/// Lexically drop `.` and resolve `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_root_from_nested_dir() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        std::fs::write(tmp.path().join("sfdx-project.json"), "{}").expect("write");
        let nested = tmp.path().join("app").join("main");
        std::fs::create_dir_all(&nested).expect("create_dir_all");

        assert_eq!(find_project_root(&nested), Some(tmp.path().to_path_buf()));
    }

    #[test]
    fn no_root_without_descriptor() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let nested = tmp.path().join("a");
        std::fs::create_dir_all(&nested).expect("create_dir_all");
        // The temp dir's ancestors are not expected to be projects.
        assert!(
            find_project_root(&nested)
                .map(|root| !root.starts_with(tmp.path()))
                .unwrap_or(true)
        );
    }

    #[test]
    fn dependency_order_is_preserved() {
        let modules = parse_dependency_file(
            r#"{"packageDirectories":[{"path":"core","default":false},{"path":"app"},{"path":"core"}]}"#,
        )
        .expect("parse should succeed");

        let paths: Vec<&str> = modules.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["core", "app", "core"]);
    }

    #[test]
    fn dependency_file_rejects_traversal() {
        let result = parse_dependency_file(r#"{"packageDirectories":[{"path":"../elsewhere"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_dependency_file_is_project_error() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let err = load_dependency_file(&tmp.path().join("nope.json")).expect_err("should fail");
        assert_eq!(err.kind(), "project");
    }

    #[test]
    fn relative_to_root_handles_relative_and_absolute() {
        let root = Path::new("/work/proj");
        let cwd = Path::new("/work/proj/app");

        assert_eq!(
            relative_to_root(Path::new("main/default/classes/A.cls"), root, cwd).expect("ok"),
            PathBuf::from("app/main/default/classes/A.cls")
        );
        assert_eq!(
            relative_to_root(Path::new("/work/proj/lib/x"), root, cwd).expect("ok"),
            PathBuf::from("lib/x")
        );
        assert!(relative_to_root(Path::new("../../other"), root, cwd).is_err());
    }
}
