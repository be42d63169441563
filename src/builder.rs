//! Queue Builder
//!
//! Expands the declared variant list into queue elements: one element per
//! discoverable data set, per item renderer, per variant. Elements are
//! buffered and bulk-enqueued in fixed-size batches to bound memory, and the
//! total enqueued count is recorded for progress reporting.

use crate::config::GenerationSettings;
use crate::error::PipelineError;
use crate::lock::{Lock, LockGuard};
use crate::queue::{Queue, QueueElement};
use crate::renderer::RendererRegistry;
use crate::stash::Stash;
use crate::state::PipelineState;
use crate::worker::GENERATION_LOCK;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One independently published output artifact and the strategies producing it.
#[derive(Debug, Clone)]
pub struct VariantDefinition {
    /// Variant identifier, also the routing tag on its queue elements.
    pub id: String,
    /// Item renderers contributing to this variant, in enqueue order.
    pub renderers: Vec<String>,
    /// Artifact writer that persists this variant.
    pub writer: String,
}

/// Outcome of a build pass.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Elements enqueued by this build.
    pub enqueued: u64,
    /// Variants whose renderers discovered no data sets. Callers can prune
    /// these from published status.
    pub empty_variants: Vec<String>,
}

/// Expands variants into queue elements.
pub struct QueueBuilder {
    queue: Arc<dyn Queue>,
    stash: Arc<dyn Stash>,
    lock: Arc<dyn Lock>,
    state: Arc<PipelineState>,
    renderers: Arc<RendererRegistry>,
    variants: Vec<VariantDefinition>,
    settings: GenerationSettings,
}

impl QueueBuilder {
    pub fn new(
        queue: Arc<dyn Queue>,
        stash: Arc<dyn Stash>,
        lock: Arc<dyn Lock>,
        state: Arc<PipelineState>,
        renderers: Arc<RendererRegistry>,
        variants: Vec<VariantDefinition>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            queue,
            stash,
            lock,
            state,
            renderers,
            variants,
            settings,
        }
    }

    /// Enqueue elements for every variant matching `filter` (all when None).
    ///
    /// Records the resulting element count as the initial count for this run.
    pub fn build(&self, filter: Option<&str>) -> Result<BuildReport, PipelineError> {
        let mut report = BuildReport::default();
        let mut buffer: Vec<QueueElement> = Vec::new();

        for variant in self
            .variants
            .iter()
            .filter(|v| filter.map_or(true, |f| f == v.id))
        {
            let mut variant_elements = 0u64;
            for renderer_id in &variant.renderers {
                let renderer = self.renderers.get_or_error(renderer_id)?;
                let data_sets = renderer.data_sets(&variant.id)?;
                debug!(
                    variant = %variant.id,
                    renderer = %renderer_id,
                    data_sets = data_sets.len(),
                    "Discovered data sets"
                );
                for payload in data_sets {
                    buffer.push(QueueElement::new(
                        variant.id.clone(),
                        renderer_id.clone(),
                        variant.writer.clone(),
                        payload,
                    ));
                    variant_elements += 1;
                    if buffer.len() >= self.settings.enqueue_batch_size {
                        self.queue.enqueue(std::mem::take(&mut buffer))?;
                    }
                }
            }
            if variant_elements == 0 {
                report.empty_variants.push(variant.id.clone());
            }
            report.enqueued += variant_elements;
        }

        if !buffer.is_empty() {
            self.queue.enqueue(buffer)?;
        }
        self.state.set_initial_count(report.enqueued)?;

        info!(
            enqueued = report.enqueued,
            empty_variants = report.empty_variants.len(),
            "Queue build complete"
        );
        Ok(report)
    }

    /// Clear the queue and stash, then build from scratch.
    ///
    /// Must never run concurrently with another rebuild or a worker drain, so
    /// it claims the generation lock; failure to claim it is fatal.
    pub fn rebuild(&self, filter: Option<&str>) -> Result<BuildReport, PipelineError> {
        let ttl = Duration::from_millis(self.settings.default_lock_timeout_ms);
        let _guard = LockGuard::try_acquire(self.lock.as_ref(), GENERATION_LOCK, ttl)?
            .ok_or_else(|| PipelineError::LockHeld(GENERATION_LOCK.to_string()))?;

        self.queue.delete_all()?;
        // A stale snapshot would resume accumulation for elements that no
        // longer exist.
        self.stash.delete()?;
        self.build(filter)
    }
}
