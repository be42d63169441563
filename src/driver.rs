//! Batch driving loop
//!
//! External entry point for cron ticks, batch callbacks, or one-shot commands:
//! call the worker repeatedly until nothing is queued or stashed, reporting
//! progress after every pass. A fatal error leaves queue and stash intact, so
//! the loop tells the operator generation can simply be resumed.

use crate::error::PipelineError;
use crate::worker::{GenerateOutcome, GenerationWorker};
use tracing::{error, info};

/// Progress after one generation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: u64,
    pub initial: u64,
}

/// Totals for a completed drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveSummary {
    /// Number of `generate()` calls it took to drain the pipeline.
    pub passes: u64,
    /// Elements processed across the whole drive.
    pub processed: u64,
}

/// Drive the worker to completion.
///
/// `report` is invoked with cumulative progress after every pass.
pub fn run_to_completion(
    worker: &mut GenerationWorker,
    mut report: impl FnMut(Progress),
) -> Result<DriveSummary, PipelineError> {
    let mut passes = 0u64;

    loop {
        let outcome = match worker.generate() {
            Ok(outcome) => outcome,
            Err(e) => {
                // Queue and stash survive a fatal abort untouched; nothing is
                // lost as long as the lock was released.
                error!(
                    error = %e,
                    "Generation aborted; queued and stashed work is intact, run generation again to resume"
                );
                return Err(e);
            }
        };
        passes += 1;

        let progress = Progress {
            processed: worker.processed_count()?,
            initial: worker.initial_count()?,
        };
        report(progress);

        match outcome {
            GenerateOutcome::Paused => continue,
            GenerateOutcome::Finished => {
                info!(
                    passes,
                    processed = progress.processed,
                    "Generation drive complete"
                );
                return Ok(DriveSummary {
                    passes,
                    processed: progress.processed,
                });
            }
        }
    }
}
