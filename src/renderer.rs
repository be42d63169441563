//! Item renderers
//!
//! Pluggable strategies that turn queue payloads into output records, one
//! implementation per content type. Renderers are looked up by declared id at
//! drain time; a registry maps ids to implementations.

use crate::error::PipelineError;
use crate::types::OutputRecord;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Strategy that discovers and renders input content.
pub trait ItemRenderer: Send + Sync {
    /// Opaque descriptors of the input chunks this renderer can produce for
    /// `variant`. Each descriptor becomes one queue element payload.
    fn data_sets(&self, variant: &str) -> Result<Vec<serde_json::Value>, PipelineError>;

    /// Render one payload into zero or more output records.
    ///
    /// A failure here is isolated per element by the drain loop: it is logged
    /// and the element contributes nothing.
    fn render(&self, payload: &serde_json::Value) -> Result<Vec<OutputRecord>, PipelineError>;
}

/// Registry of item renderers by id
#[derive(Default)]
pub struct RendererRegistry {
    renderers: RwLock<HashMap<String, Arc<dyn ItemRenderer>>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: impl Into<String>, renderer: Arc<dyn ItemRenderer>) {
        self.renderers.write().insert(id.into(), renderer);
    }

    pub fn get_or_error(&self, id: &str) -> Result<Arc<dyn ItemRenderer>, PipelineError> {
        self.renderers
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::RendererNotFound(id.to_string()))
    }
}
