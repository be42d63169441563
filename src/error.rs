//! Error types for the batch generation pipeline.

use crate::types::ElementId;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Queue element not found: {0}")]
    ElementNotFound(ElementId),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Pipeline-level errors
///
/// Lock failures are fatal for the invocation that hit them; render and
/// artifact failures carry enough context to tell which plugin misbehaved.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Lock '{0}' is held by another worker or rebuild")]
    LockHeld(String),

    #[error("No item renderer registered for id '{0}'")]
    RendererNotFound(String),

    #[error("No artifact writer registered for id '{0}'")]
    WriterNotFound(String),

    #[error("Item renderer failed: {0}")]
    RenderFailed(String),

    #[error("Artifact writer failed: {0}")]
    ArtifactFailed(String),

    #[error("Stash snapshot has unsupported schema version {0}")]
    StashVersion(u32),

    #[error("Stash snapshot is corrupt: {0}")]
    StashCorrupt(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::ConfigError(err.to_string())
    }
}
