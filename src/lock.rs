//! Named locks
//!
//! Timed mutual exclusion for the pipeline: at most one worker drain or queue
//! rebuild may run at a time. Acquisition fails fast when a live lease exists
//! rather than blocking; a crashed holder is fenced out only until its lease
//! expires.

use crate::error::StorageError;
use crate::queue::persistence::to_storage_io;
use crate::types::now_millis;
use sled::{Db, Tree};
use std::time::Duration;
use tracing::warn;

const TREE_LOCKS: &str = "named_locks";

/// Named timed lock interface
pub trait Lock {
    /// Try to claim `name` for `ttl`. Returns false if a live lease exists.
    fn acquire(&self, name: &str, ttl: Duration) -> Result<bool, StorageError>;

    /// Release `name` unconditionally.
    fn release(&self, name: &str) -> Result<(), StorageError>;
}

/// Sled-backed lease lock
///
/// The lease value is the expiry wall-clock in milliseconds. Claims go through
/// `compare_and_swap` so two racing acquirers cannot both succeed: one sees the
/// other's write and loses the swap.
pub struct SledLock {
    tree: Tree,
}

impl SledLock {
    pub fn new(db: &Db) -> Result<Self, StorageError> {
        let tree = db.open_tree(TREE_LOCKS).map_err(to_storage_io)?;
        Ok(Self { tree })
    }

    fn decode_expiry(raw: &[u8]) -> u64 {
        raw.try_into().map(u64::from_be_bytes).unwrap_or(0)
    }
}

impl Lock for SledLock {
    fn acquire(&self, name: &str, ttl: Duration) -> Result<bool, StorageError> {
        let now = now_millis();
        let lease = (now + ttl.as_millis() as u64).to_be_bytes().to_vec();
        let current = self.tree.get(name.as_bytes()).map_err(to_storage_io)?;

        if let Some(raw) = &current {
            if Self::decode_expiry(raw) > now {
                return Ok(false);
            }
        }

        let swapped = self
            .tree
            .compare_and_swap(name.as_bytes(), current, Some(lease))
            .map_err(to_storage_io)?;
        if swapped.is_err() {
            // Someone else claimed or refreshed the lease between read and swap.
            return Ok(false);
        }
        self.tree.flush().map_err(to_storage_io)?;
        Ok(true)
    }

    fn release(&self, name: &str) -> Result<(), StorageError> {
        self.tree.remove(name.as_bytes()).map_err(to_storage_io)?;
        self.tree.flush().map_err(to_storage_io)?;
        Ok(())
    }
}

/// Releases the held name on drop.
///
/// Drop cannot propagate a release failure, so it is logged and the lease is
/// left to expire on its own.
pub struct LockGuard<'a> {
    lock: &'a dyn Lock,
    name: String,
}

impl<'a> LockGuard<'a> {
    /// Try to acquire `name`; returns None when the lock is already held.
    pub fn try_acquire(
        lock: &'a dyn Lock,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<Self>, StorageError> {
        if lock.acquire(name, ttl)? {
            Ok(Some(Self {
                lock,
                name: name.to_string(),
            }))
        } else {
            Ok(None)
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release(&self.name) {
            warn!(lock = %self.name, error = %e, "Failed to release lock; lease will expire");
        }
    }
}
