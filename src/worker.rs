//! Generation Worker
//!
//! Drains the work queue under a wall-clock budget. Each element is rendered
//! through its declared item renderer, deduplicated, folded into the active
//! variant's accumulation, and deleted; accumulation is chunked out through
//! the variant's artifact writer. When the budget runs out mid-queue the whole
//! run state is stashed durably and the next invocation resumes where this one
//! stopped. When the queue drains fully the active variant gets a final flush,
//! its index, and a publish.

use crate::artifact::{ChunkRef, WriterRegistry};
use crate::builder::QueueBuilder;
use crate::config::GenerationSettings;
use crate::error::PipelineError;
use crate::lock::{Lock, LockGuard};
use crate::queue::{Queue, QueueElement};
use crate::renderer::RendererRegistry;
use crate::stash::Stash;
use crate::state::PipelineState;
use crate::types::{now_millis, OutputRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Name of the lock serializing worker drains and queue rebuilds.
pub const GENERATION_LOCK: &str = "bindery_generation";

const STASH_SCHEMA_VERSION: u32 = 1;

/// Result of one `generate()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// Queue and stash are empty; every variant touched was published.
    Finished,
    /// Time budget ran out; progress was stashed and more work remains.
    Paused,
}

/// Alters pending records in place before they fold into accumulation.
pub trait RecordHook: Send + Sync {
    fn adjust(&self, variant: &str, records: &mut Vec<OutputRecord>);
}

/// In-memory run state for the variant currently being accumulated.
///
/// Belongs to exactly one active variant at a time; switching variants forces
/// a full flush and publish of the previous one first. Either fully resident
/// here or fully serialized in the stash, never partially persisted.
#[derive(Debug, Default)]
struct VariantRunState {
    active_variant: Option<String>,
    writer: String,
    pending: Vec<OutputRecord>,
    accumulated: Vec<OutputRecord>,
    seen_dedup_keys: HashSet<String>,
    emitted_chunks: Vec<ChunkRef>,
}

/// Serialized form of [`VariantRunState`] carried across invocations.
///
/// Versioned so a snapshot written by a prior code version fails loudly
/// instead of being silently misread.
#[derive(Debug, Serialize, Deserialize)]
struct StashSnapshot {
    schema_version: u32,
    active_variant: String,
    writer: String,
    pending: Vec<OutputRecord>,
    accumulated: Vec<OutputRecord>,
    seen_dedup_keys: Vec<String>,
    emitted_chunks: Vec<ChunkRef>,
    stashed_at_ms: u64,
}

/// The single active worker.
pub struct GenerationWorker {
    queue: Arc<dyn Queue>,
    stash: Arc<dyn Stash>,
    lock: Arc<dyn Lock>,
    state: Arc<PipelineState>,
    renderers: Arc<RendererRegistry>,
    writers: Arc<WriterRegistry>,
    builder: Arc<QueueBuilder>,
    hooks: Vec<Arc<dyn RecordHook>>,
    settings: GenerationSettings,
    run: VariantRunState,
}

impl GenerationWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<dyn Queue>,
        stash: Arc<dyn Stash>,
        lock: Arc<dyn Lock>,
        state: Arc<PipelineState>,
        renderers: Arc<RendererRegistry>,
        writers: Arc<WriterRegistry>,
        builder: Arc<QueueBuilder>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            queue,
            stash,
            lock,
            state,
            renderers,
            writers,
            builder,
            hooks: Vec::new(),
            settings,
            run: VariantRunState::default(),
        }
    }

    pub fn add_hook(&mut self, hook: Arc<dyn RecordHook>) {
        self.hooks.push(hook);
    }

    /// Run one budget-bounded generation pass.
    ///
    /// Self-sufficient: when neither queued nor stashed work exists the queue
    /// is rebuilt first, so a driver need only call this repeatedly until
    /// [`GenerationWorker::in_progress`] turns false.
    pub fn generate(&mut self) -> Result<GenerateOutcome, PipelineError> {
        if !self.in_progress()? {
            self.builder.rebuild(None)?;
        }

        let lock = self.lock.clone();
        let guard = LockGuard::try_acquire(lock.as_ref(), GENERATION_LOCK, self.drain_lease())?
            .ok_or_else(|| PipelineError::LockHeld(GENERATION_LOCK.to_string()))?;
        let outcome = self.drain();
        drop(guard);
        outcome
    }

    /// Whether queued or stashed work remains. The pipeline is done when this
    /// turns false.
    pub fn in_progress(&self) -> Result<bool, PipelineError> {
        Ok(self.queue.count()? > 0 || self.stash.get()?.is_some())
    }

    /// Element count recorded by the last queue build.
    pub fn initial_count(&self) -> Result<u64, PipelineError> {
        Ok(self.state.initial_count()?)
    }

    /// Elements consumed so far, derived from the remaining queue size.
    /// Reporting only, never control flow.
    pub fn processed_count(&self) -> Result<u64, PipelineError> {
        let remaining = self.queue.count()? as u64;
        Ok(self.initial_count()?.saturating_sub(remaining))
    }

    /// Lock lease covering a full drain: the execution budget plus grace, but
    /// never below the default timeout.
    fn drain_lease(&self) -> Duration {
        let budget_lease = self
            .settings
            .max_execution_time_ms
            .saturating_add(self.settings.lock_grace_ms);
        Duration::from_millis(budget_lease.max(self.settings.default_lock_timeout_ms))
    }

    fn drain(&mut self) -> Result<GenerateOutcome, PipelineError> {
        self.unstash()?;

        let started = Instant::now();
        let budget = Duration::from_millis(self.settings.max_execution_time_ms);
        let queue = Arc::clone(&self.queue);
        let mut processed = 0u64;

        for item in queue.iterate() {
            let element = item?;
            if !budget.is_zero() && started.elapsed() >= budget {
                debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    processed, "Execution budget exhausted; pausing drain"
                );
                break;
            }

            if self.run.active_variant.as_deref() != Some(element.variant.as_str()) {
                if self.run.active_variant.is_some() {
                    self.flush(true)?;
                    self.publish()?;
                }
                debug!(variant = %element.variant, "Starting variant");
                self.run.active_variant = Some(element.variant.clone());
                self.run.writer = element.writer.clone();
                self.run.seen_dedup_keys.clear();
            }

            let records = match self.render_element(&element) {
                Ok(records) => records,
                Err(e) => {
                    // A single bad element must not halt the pipeline; it is
                    // consumed and contributes nothing.
                    warn!(
                        element = element.id,
                        variant = %element.variant,
                        renderer = %element.renderer,
                        error = %e,
                        "Item renderer failed; skipping element output"
                    );
                    Vec::new()
                }
            };
            self.fold(&element, records);

            if self.settings.max_links_per_chunk > 0
                && self.run.accumulated.len() >= self.settings.max_links_per_chunk
            {
                self.flush(false)?;
            }

            self.queue.delete(element.id)?;
            processed += 1;
        }

        if self.queue.count()? == 0 {
            if self.run.active_variant.is_some() {
                self.flush(true)?;
                self.publish()?;
            }
            self.run = VariantRunState::default();
            info!(processed, "Queue drained; generation finished");
            Ok(GenerateOutcome::Finished)
        } else {
            self.stash()?;
            info!(
                processed,
                remaining = self.queue.count()?,
                "Generation paused; progress stashed"
            );
            Ok(GenerateOutcome::Paused)
        }
    }

    fn render_element(&self, element: &QueueElement) -> Result<Vec<OutputRecord>, PipelineError> {
        let renderer = self.renderers.get_or_error(&element.renderer)?;
        renderer.render(&element.payload)
    }

    /// Deduplicate and fold one render call's records into accumulation.
    ///
    /// Dedup is all-or-nothing per call: one colliding key drops the whole
    /// batch, and the batch's fresh keys are not marked seen. This mirrors the
    /// long-standing behavior of treating renderer output as atomic; filtering
    /// record-by-record instead is a standing review candidate.
    fn fold(&mut self, element: &QueueElement, records: Vec<OutputRecord>) {
        if records.is_empty() {
            return;
        }

        if self.settings.remove_duplicates {
            let collision = records.iter().any(|r| {
                r.dedup_key
                    .as_deref()
                    .is_some_and(|k| self.run.seen_dedup_keys.contains(k))
            });
            if collision {
                debug!(
                    element = element.id,
                    variant = %element.variant,
                    dropped = records.len(),
                    "Duplicate dedup key; dropping render batch"
                );
                return;
            }
            for record in &records {
                if let Some(key) = &record.dedup_key {
                    self.run.seen_dedup_keys.insert(key.clone());
                }
            }
        }

        self.run.pending.extend(records);
        if let Some(variant) = self.run.active_variant.clone() {
            for hook in &self.hooks {
                hook.adjust(&variant, &mut self.run.pending);
            }
        }
        self.run.accumulated.append(&mut self.run.pending);
    }

    /// Chunk accumulated records out through the active variant's writer.
    ///
    /// With a chunk size configured, only full chunks are emitted unless this
    /// is the final flush for the variant; an undersized remainder otherwise
    /// stays accumulated for the next flush.
    fn flush(&mut self, complete: bool) -> Result<(), PipelineError> {
        let Some(variant) = self.run.active_variant.clone() else {
            return Ok(());
        };
        let writer = self.writers.get_or_error(&self.run.writer)?;
        let chunk_size = self.settings.max_links_per_chunk;

        if chunk_size == 0 {
            if !self.run.accumulated.is_empty() {
                let records = std::mem::take(&mut self.run.accumulated);
                let chunk = writer.write_chunk(&variant, &records)?;
                self.run.emitted_chunks.push(chunk);
            }
            return Ok(());
        }

        while self.run.accumulated.len() >= chunk_size
            || (complete && !self.run.accumulated.is_empty())
        {
            let take = chunk_size.min(self.run.accumulated.len());
            let records: Vec<OutputRecord> = self.run.accumulated.drain(..take).collect();
            let chunk = writer.write_chunk(&variant, &records)?;
            debug!(
                variant = %variant,
                ordinal = chunk.ordinal,
                records = chunk.records,
                "Flushed chunk"
            );
            self.run.emitted_chunks.push(chunk);
        }
        Ok(())
    }

    /// Finalize the active variant: write its index over every emitted chunk
    /// and make it live. Runs once per variant per full drain-to-empty.
    fn publish(&mut self) -> Result<(), PipelineError> {
        let Some(variant) = self.run.active_variant.take() else {
            return Ok(());
        };
        let writer = self.writers.get_or_error(&self.run.writer)?;
        writer.write_index(&variant, &self.run.emitted_chunks)?;
        writer.publish(&variant)?;
        info!(
            variant = %variant,
            chunks = self.run.emitted_chunks.len(),
            "Variant published"
        );
        self.run = VariantRunState::default();
        Ok(())
    }

    /// Persist the whole run state to the stash in one write, then reset to
    /// idle. Written only at the point of pausing, never incrementally.
    fn stash(&mut self) -> Result<(), PipelineError> {
        let Some(variant) = self.run.active_variant.clone() else {
            return Ok(());
        };
        let snapshot = StashSnapshot {
            schema_version: STASH_SCHEMA_VERSION,
            active_variant: variant,
            writer: self.run.writer.clone(),
            pending: std::mem::take(&mut self.run.pending),
            accumulated: std::mem::take(&mut self.run.accumulated),
            seen_dedup_keys: self.run.seen_dedup_keys.iter().cloned().collect(),
            emitted_chunks: std::mem::take(&mut self.run.emitted_chunks),
            stashed_at_ms: now_millis(),
        };
        let blob = serde_json::to_vec(&snapshot)
            .map_err(|e| PipelineError::StashCorrupt(e.to_string()))?;
        self.stash.set(&blob)?;
        self.run = VariantRunState::default();
        debug!("Stashed run state");
        Ok(())
    }

    /// Load prior partial progress, if any. The snapshot is validated before
    /// the slot is cleared so an unsupported version is not destroyed.
    fn unstash(&mut self) -> Result<(), PipelineError> {
        let Some(blob) = self.stash.get()? else {
            return Ok(());
        };
        let snapshot: StashSnapshot = serde_json::from_slice(&blob)
            .map_err(|e| PipelineError::StashCorrupt(e.to_string()))?;
        if snapshot.schema_version != STASH_SCHEMA_VERSION {
            return Err(PipelineError::StashVersion(snapshot.schema_version));
        }
        self.stash.delete()?;

        debug!(
            variant = %snapshot.active_variant,
            accumulated = snapshot.accumulated.len(),
            "Resuming from stashed run state"
        );
        self.run = VariantRunState {
            active_variant: Some(snapshot.active_variant),
            writer: snapshot.writer,
            pending: snapshot.pending,
            accumulated: snapshot.accumulated,
            seen_dedup_keys: snapshot.seen_dedup_keys.into_iter().collect(),
            emitted_chunks: snapshot.emitted_chunks,
        };
        Ok(())
    }
}
