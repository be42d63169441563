//! Shared types for the generation pipeline.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a queue element, assigned by the queue on enqueue.
///
/// Unique within one queue; ascending ids define drain order.
pub type ElementId = u64;

/// One discrete unit of rendered output.
///
/// Produced by an item renderer from a queue element's payload. The optional
/// `dedup_key` (typically a path or URL) is used for cross-element
/// deduplication within a variant; records without a key are never deduplicated.
/// The body is opaque to the pipeline and only interpreted by artifact writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
    pub body: serde_json::Value,
}

impl OutputRecord {
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            dedup_key: None,
            body,
        }
    }

    pub fn with_dedup_key(dedup_key: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            dedup_key: Some(dedup_key.into()),
            body,
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
