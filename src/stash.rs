//! Stash Store
//!
//! Durable single-slot store for in-flight generation progress. The worker
//! serializes its whole run state here when a time budget pauses a drain, and
//! consumes it (read + delete) at the start of the next invocation. The stash
//! is the only channel by which progress survives between invocations; the
//! queue never stores rendered-but-unpublished data.

use crate::error::StorageError;
use crate::queue::persistence::to_storage_io;
use sled::{Db, Tree};

const TREE_STASH: &str = "generation_stash";
const STASH_KEY: &str = "slot";

/// Single-slot blob store interface
pub trait Stash {
    fn get(&self) -> Result<Option<Vec<u8>>, StorageError>;
    fn set(&self, blob: &[u8]) -> Result<(), StorageError>;
    fn delete(&self) -> Result<(), StorageError>;
}

/// Sled-backed stash slot
pub struct SledStash {
    tree: Tree,
}

impl SledStash {
    pub fn new(db: &Db) -> Result<Self, StorageError> {
        let tree = db.open_tree(TREE_STASH).map_err(to_storage_io)?;
        Ok(Self { tree })
    }
}

impl Stash for SledStash {
    fn get(&self) -> Result<Option<Vec<u8>>, StorageError> {
        let value = self.tree.get(STASH_KEY).map_err(to_storage_io)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn set(&self, blob: &[u8]) -> Result<(), StorageError> {
        self.tree.insert(STASH_KEY, blob).map_err(to_storage_io)?;
        self.tree.flush().map_err(to_storage_io)?;
        Ok(())
    }

    fn delete(&self) -> Result<(), StorageError> {
        self.tree.remove(STASH_KEY).map_err(to_storage_io)?;
        self.tree.flush().map_err(to_storage_io)?;
        Ok(())
    }
}
