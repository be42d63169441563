//! Work Queue
//!
//! Ordered, durable store of generation work. Elements are created in bulk by
//! the queue builder, read without removal during a drain, and deleted
//! individually once their output has been folded into accumulation.

pub mod persistence;

pub use persistence::SledQueue;

use crate::error::StorageError;
use crate::types::ElementId;
use serde::{Deserialize, Serialize};

/// One unit of queueable work.
///
/// The payload is opaque to the pipeline; the three routing tags select the
/// variant being produced and the strategies that render and persist it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueElement {
    /// Assigned by the queue on enqueue; zero until then.
    #[serde(default)]
    pub id: ElementId,
    /// Which output variant this element contributes to.
    pub variant: String,
    /// Registry id of the item renderer that turns the payload into records.
    pub renderer: String,
    /// Registry id of the artifact writer that persists the variant.
    pub writer: String,
    /// Opaque descriptor of what to render.
    pub payload: serde_json::Value,
}

impl QueueElement {
    pub fn new(
        variant: impl Into<String>,
        renderer: impl Into<String>,
        writer: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: 0,
            variant: variant.into(),
            renderer: renderer.into(),
            writer: writer.into(),
            payload,
        }
    }
}

/// Work queue interface
///
/// Iteration order is stable ascending-id order, which preserves the
/// per-variant contiguity the builder established at enqueue time.
pub trait Queue {
    /// Append a batch of elements, assigning each a fresh ascending id.
    fn enqueue(&self, batch: Vec<QueueElement>) -> Result<Vec<ElementId>, StorageError>;

    /// Iterate all elements oldest-first without removing them.
    fn iterate(&self) -> Box<dyn Iterator<Item = Result<QueueElement, StorageError>> + '_>;

    /// Delete a single element by id.
    fn delete(&self, id: ElementId) -> Result<(), StorageError>;

    /// Delete every element.
    fn delete_all(&self) -> Result<(), StorageError>;

    /// Number of elements currently queued.
    fn count(&self) -> Result<usize, StorageError>;
}
