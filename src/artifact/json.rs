//! JSON artifact writer
//!
//! Writes each chunk as a JSON file and the variant index as a manifest file,
//! staged under `staging/<variant>/` until publish swaps the whole directory
//! into `published/<variant>/`. Chunk and index writes go to a temp file first
//! and are renamed into place, so a crashed invocation never leaves a
//! half-written artifact at its final path.

use crate::artifact::{ArtifactWriter, ChunkRef};
use crate::error::PipelineError;
use crate::types::OutputRecord;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const INDEX_FILE: &str = "index.json";

/// Index manifest persisted alongside the chunks.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexManifest {
    pub variant: String,
    pub chunks: Vec<ChunkRef>,
    pub total_records: u64,
    pub generated_at: chrono::DateTime<Utc>,
}

/// Filesystem JSON writer
pub struct JsonArtifactWriter {
    root: PathBuf,
}

impl JsonArtifactWriter {
    /// Create a writer rooted at `root`; `staging/` and `published/` live
    /// underneath it.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, PipelineError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("staging"))
            .and_then(|_| fs::create_dir_all(root.join("published")))
            .map_err(|e| {
                PipelineError::ArtifactFailed(format!(
                    "Failed to create artifact directories under {:?}: {}",
                    root, e
                ))
            })?;
        Ok(Self { root })
    }

    pub fn staging_dir(&self, variant: &str) -> PathBuf {
        self.root.join("staging").join(variant)
    }

    pub fn published_dir(&self, variant: &str) -> PathBuf {
        self.root.join("published").join(variant)
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes).map_err(|e| {
            PipelineError::ArtifactFailed(format!("Failed to write {:?}: {}", temp_path, e))
        })?;
        fs::rename(&temp_path, path).map_err(|e| {
            PipelineError::ArtifactFailed(format!("Failed to move {:?} into place: {}", path, e))
        })?;
        Ok(())
    }

    fn next_ordinal(&self, variant: &str) -> Result<u32, PipelineError> {
        let dir = self.staging_dir(variant);
        let mut highest = 0u32;
        if dir.exists() {
            let entries = fs::read_dir(&dir).map_err(|e| {
                PipelineError::ArtifactFailed(format!("Failed to list {:?}: {}", dir, e))
            })?;
            for entry in entries {
                let entry = entry.map_err(|e| {
                    PipelineError::ArtifactFailed(format!("Failed to list {:?}: {}", dir, e))
                })?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if let Some(num) = name
                    .strip_prefix("chunk-")
                    .and_then(|rest| rest.strip_suffix(".json"))
                {
                    if let Ok(n) = num.parse::<u32>() {
                        highest = highest.max(n);
                    }
                }
            }
        }
        Ok(highest + 1)
    }
}

impl ArtifactWriter for JsonArtifactWriter {
    fn write_chunk(
        &self,
        variant: &str,
        records: &[OutputRecord],
    ) -> Result<ChunkRef, PipelineError> {
        let dir = self.staging_dir(variant);
        fs::create_dir_all(&dir).map_err(|e| {
            PipelineError::ArtifactFailed(format!("Failed to create {:?}: {}", dir, e))
        })?;

        let ordinal = self.next_ordinal(variant)?;
        let file_name = format!("chunk-{:05}.json", ordinal);
        let bodies: Vec<&serde_json::Value> = records.iter().map(|r| &r.body).collect();
        let bytes = serde_json::to_vec_pretty(&bodies)
            .map_err(|e| PipelineError::ArtifactFailed(format!("Failed to encode chunk: {}", e)))?;
        Self::write_atomic(&dir.join(&file_name), &bytes)?;

        debug!(variant, file = %file_name, records = records.len(), "Wrote chunk");
        Ok(ChunkRef {
            ordinal,
            location: file_name,
            records: records.len() as u64,
        })
    }

    fn write_index(&self, variant: &str, chunks: &[ChunkRef]) -> Result<(), PipelineError> {
        let dir = self.staging_dir(variant);
        fs::create_dir_all(&dir).map_err(|e| {
            PipelineError::ArtifactFailed(format!("Failed to create {:?}: {}", dir, e))
        })?;

        let manifest = IndexManifest {
            variant: variant.to_string(),
            chunks: chunks.to_vec(),
            total_records: chunks.iter().map(|c| c.records).sum(),
            generated_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| PipelineError::ArtifactFailed(format!("Failed to encode index: {}", e)))?;
        Self::write_atomic(&dir.join(INDEX_FILE), &bytes)
    }

    fn publish(&self, variant: &str) -> Result<(), PipelineError> {
        let staging = self.staging_dir(variant);
        let published = self.published_dir(variant);

        if published.exists() {
            fs::remove_dir_all(&published).map_err(|e| {
                PipelineError::ArtifactFailed(format!(
                    "Failed to remove stale {:?}: {}",
                    published, e
                ))
            })?;
        }
        fs::rename(&staging, &published).map_err(|e| {
            PipelineError::ArtifactFailed(format!(
                "Failed to publish {:?} -> {:?}: {}",
                staging, published, e
            ))
        })?;

        info!(variant, path = %published.display(), "Published variant");
        Ok(())
    }
}
