//! Ferry Core Library
//!
//! Stages arbitrary subsets of a source-format project into a disposable
//! deployable unit, drives the external metadata tool through it, and
//! unpacks retrieved components back into source format.

pub mod aggregate;
pub mod collect;
pub mod config;
pub mod context;
pub mod error;
pub mod fs;
pub mod manifest;
pub mod pipeline;
pub mod project;
pub mod staging;
pub mod tool;
pub mod unpack;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigScope, FerryConfig};
    pub use crate::context::AppContext;

    // Errors
    pub use crate::error::{PipelineError, ToolError, ToolFailure};

    // Pipeline
    pub use crate::aggregate::MergePolicy;
    pub use crate::collect::ArtifactDescriptor;
    pub use crate::pipeline::{
        DeployMode, DeployOutcome, DeploymentRequest, PipelineRunner, RetrievalRequest,
        RetrieveOutcome, RunnerSettings,
    };
    pub use crate::project::ModuleDescriptor;

    // Tool
    pub use crate::tool::{MetadataTool, SfdxTool, TargetOrg};
}
