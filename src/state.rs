//! Durable pipeline counters
//!
//! Holds the element count recorded by the last queue build. Used only for
//! progress reporting (`processed = initial - remaining`), never for control
//! flow.

use crate::error::StorageError;
use crate::queue::persistence::{to_storage_data, to_storage_io};
use sled::{Db, Tree};

const TREE_STATE: &str = "pipeline_state";
const KEY_INITIAL_COUNT: &str = "initial_element_count";

/// Sled-backed counter store
pub struct PipelineState {
    tree: Tree,
}

impl PipelineState {
    pub fn new(db: &Db) -> Result<Self, StorageError> {
        let tree = db.open_tree(TREE_STATE).map_err(to_storage_io)?;
        Ok(Self { tree })
    }

    pub fn set_initial_count(&self, count: u64) -> Result<(), StorageError> {
        let value = serde_json::to_vec(&count).map_err(to_storage_data)?;
        self.tree
            .insert(KEY_INITIAL_COUNT, value)
            .map_err(to_storage_io)?;
        self.tree.flush().map_err(to_storage_io)?;
        Ok(())
    }

    pub fn initial_count(&self) -> Result<u64, StorageError> {
        let Some(raw) = self.tree.get(KEY_INITIAL_COUNT).map_err(to_storage_io)? else {
            return Ok(0);
        };
        serde_json::from_slice(&raw).map_err(to_storage_data)
    }
}
