//! Place a produced artifact at its destination.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::fs::{base_name, copy_path};

/// Where an artifact came from and where it was copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
}

/// Copy `artifact` (directory tree or file) to `<destination_dir>/<artifact name>`.
pub fn collect(artifact: &Path, destination_dir: &Path) -> Result<ArtifactDescriptor> {
    let name = base_name(artifact).map_err(|e| PipelineError::collection(artifact.display(), e))?;
    let destination_path = destination_dir.join(name);

    copy_path(artifact, &destination_path)
        .map_err(|e| PipelineError::collection(destination_path.display(), e))?;

    tracing::info!(
        artifact = %artifact.display(),
        destination = %destination_path.display(),
        "collected artifact"
    );
    Ok(ArtifactDescriptor {
        source_path: artifact.to_path_buf(),
        destination_path,
    })
}
