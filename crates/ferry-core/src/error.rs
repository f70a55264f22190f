//! Pipeline error taxonomy.
//!
//! Every stage of a run maps its failures onto one [`PipelineError`] variant.
//! Errors are fatal to the run; the runner reports them unchanged after the
//! staging area has been cleaned up.

use std::fmt;
use std::path::PathBuf;

/// Captured output of an external tool invocation that exited unsuccessfully.
///
/// `Display` prints the tool's own diagnostic so it reaches the user intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    /// The command line that was executed.
    pub command: String,
    /// Exit code, if the process exited normally.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolFailure {
    /// Best available diagnostic: stderr, then stdout.
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr;
        }
        self.stdout.trim()
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "`{}` exited with status {}", self.command, code)?,
            None => write!(f, "`{}` was terminated by a signal", self.command)?,
        }
        let diagnostic = self.diagnostic();
        if !diagnostic.is_empty() {
            write!(f, ": {}", diagnostic)?;
        }
        Ok(())
    }
}

impl std::error::Error for ToolFailure {}

/// Failure of a single external tool call.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Failed(#[from] ToolFailure),

    /// The tool succeeded but its output did not have the expected shape.
    #[error("unexpected output from `{command}`: {reason}")]
    Output { command: String, reason: String },
}

/// Categorized error for a single deploy or retrieve run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The invocation is not inside a project, or the dependency file is unusable.
    #[error("project error: {0}")]
    Project(String),

    /// Workspace creation failed.
    #[error("failed to create staging area at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying source into the staging area failed.
    #[error("failed to stage source: {0}")]
    Aggregation(String),

    /// Writing a descriptor or resolving its inputs failed.
    #[error("failed to write descriptor: {0}")]
    Descriptor(String),

    #[error("source conversion failed: {0}")]
    Conversion(#[source] ToolError),

    #[error("deployment failed: {0}")]
    Deployment(#[source] ToolError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] ToolError),

    /// Copying the produced package to its destination failed.
    #[error("failed to collect artifact: {0}")]
    Collection(String),

    /// Archive extraction, layout check, or rename failed.
    #[error("failed to unpack retrieved archive: {0}")]
    Unpack(String),
}

impl PipelineError {
    pub(crate) fn aggregation(context: impl fmt::Display, err: impl fmt::Display) -> Self {
        Self::Aggregation(format!("{}: {}", context, err))
    }

    pub(crate) fn descriptor(context: impl fmt::Display, err: impl fmt::Display) -> Self {
        Self::Descriptor(format!("{}: {}", context, err))
    }

    pub(crate) fn collection(context: impl fmt::Display, err: impl fmt::Display) -> Self {
        Self::Collection(format!("{}: {}", context, err))
    }

    pub(crate) fn unpack(context: impl fmt::Display, err: impl fmt::Display) -> Self {
        Self::Unpack(format!("{}: {}", context, err))
    }

    /// Short stage label used in logs and machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Project(_) => "project",
            Self::Staging { .. } => "staging",
            Self::Aggregation(_) => "aggregation",
            Self::Descriptor(_) => "descriptor",
            Self::Conversion(_) => "conversion",
            Self::Deployment(_) => "deployment",
            Self::Retrieval(_) => "retrieval",
            Self::Collection(_) => "collection",
            Self::Unpack(_) => "unpack",
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
