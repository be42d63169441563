//! Persistence layer for the work queue

use crate::error::StorageError;
use crate::queue::{Queue, QueueElement};
use crate::types::ElementId;
use sled::{Db, Tree};
use std::io;

const TREE_QUEUE: &str = "queue_elements";
const ELEMENT_KEY_PAD: usize = 20;

/// Sled-backed implementation of the work queue
///
/// Element ids come from `sled::Db::generate_id()`, which is monotonic across
/// restarts. Keys are zero-padded decimal ids so lexicographic key order equals
/// ascending id order; values are bincode-encoded elements.
pub struct SledQueue {
    db: Db,
    tree: Tree,
}

impl SledQueue {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let tree = db.open_tree(TREE_QUEUE).map_err(to_storage_io)?;
        Ok(Self { db, tree })
    }

    fn encode_key(id: ElementId) -> String {
        format!("{:0>width$}", id, width = ELEMENT_KEY_PAD)
    }
}

impl Queue for SledQueue {
    fn enqueue(&self, batch: Vec<QueueElement>) -> Result<Vec<ElementId>, StorageError> {
        let mut ids = Vec::with_capacity(batch.len());
        let mut writes = sled::Batch::default();
        for mut element in batch {
            let id = self.db.generate_id().map_err(to_storage_io)?;
            element.id = id;
            let value = bincode::serialize(&element).map_err(to_storage_data)?;
            writes.insert(Self::encode_key(id).as_bytes(), value);
            ids.push(id);
        }
        self.tree.apply_batch(writes).map_err(to_storage_io)?;
        self.tree.flush().map_err(to_storage_io)?;
        Ok(ids)
    }

    fn iterate(&self) -> Box<dyn Iterator<Item = Result<QueueElement, StorageError>> + '_> {
        Box::new(self.tree.iter().map(|item| {
            let (_, value) = item.map_err(to_storage_io)?;
            bincode::deserialize(&value).map_err(to_storage_data)
        }))
    }

    fn delete(&self, id: ElementId) -> Result<(), StorageError> {
        let removed = self
            .tree
            .remove(Self::encode_key(id).as_bytes())
            .map_err(to_storage_io)?;
        if removed.is_none() {
            return Err(StorageError::ElementNotFound(id));
        }
        Ok(())
    }

    fn delete_all(&self) -> Result<(), StorageError> {
        self.tree.clear().map_err(to_storage_io)?;
        self.tree.flush().map_err(to_storage_io)?;
        Ok(())
    }

    fn count(&self) -> Result<usize, StorageError> {
        Ok(self.tree.len())
    }
}

pub(crate) fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

pub(crate) fn to_storage_data<E: std::fmt::Display>(err: E) -> StorageError {
    StorageError::IoError(io::Error::new(
        io::ErrorKind::InvalidData,
        err.to_string(),
    ))
}
