//! Artifact writers
//!
//! Pluggable strategies that persist accumulated output records, one
//! implementation per output format. A writer receives bounded chunks of
//! records, then an index covering every chunk, then a publish call that makes
//! the variant live.

pub mod json;

pub use json::JsonArtifactWriter;

use crate::error::PipelineError;
use crate::types::OutputRecord;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Reference to one persisted chunk, as reported back by the writer.
///
/// Refs are collected by the worker across invocations and handed to
/// `write_index` when the variant completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// 1-based ordinal within the variant, in emission order.
    pub ordinal: u32,
    /// Writer-defined location (file name, key, ...).
    pub location: String,
    /// Number of records in the chunk.
    pub records: u64,
}

/// Strategy that persists a variant's records.
pub trait ArtifactWriter: Send + Sync {
    /// Persist one chunk of records for `variant` and return its reference.
    fn write_chunk(
        &self,
        variant: &str,
        records: &[OutputRecord],
    ) -> Result<ChunkRef, PipelineError>;

    /// Persist the index/manifest referencing every emitted chunk.
    fn write_index(&self, variant: &str, chunks: &[ChunkRef]) -> Result<(), PipelineError>;

    /// Make the variant visible, replacing any previously published state.
    fn publish(&self, variant: &str) -> Result<(), PipelineError>;
}

/// Registry of artifact writers by id
#[derive(Default)]
pub struct WriterRegistry {
    writers: RwLock<HashMap<String, Arc<dyn ArtifactWriter>>>,
}

impl WriterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: impl Into<String>, writer: Arc<dyn ArtifactWriter>) {
        self.writers.write().insert(id.into(), writer);
    }

    pub fn get_or_error(&self, id: &str) -> Result<Arc<dyn ArtifactWriter>, PipelineError> {
        self.writers
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::WriterNotFound(id.to_string()))
    }
}
