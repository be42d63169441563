//! End-to-end generation runs driven through the public API

use super::test_utils::{create_test_pipeline, keyed_payload, variant};
use bindery::config::GenerationSettings;
use bindery::driver::{self, Progress};
use bindery::error::PipelineError;
use bindery::lock::Lock;
use bindery::queue::Queue;
use bindery::types::OutputRecord;
use bindery::worker::{GenerateOutcome, RecordHook, GENERATION_LOCK};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_single_call_builds_drains_and_publishes() {
    let mut pipeline = create_test_pipeline(vec![variant("news")], GenerationSettings::default());
    pipeline.renderer.set_data_sets(
        "news",
        vec![
            keyed_payload(&["/a"]),
            keyed_payload(&["/b"]),
            keyed_payload(&["/c"]),
        ],
    );

    // Nothing queued or stashed, so generate() rebuilds the queue itself.
    let outcome = pipeline.worker.generate().unwrap();
    assert_eq!(outcome, GenerateOutcome::Finished);

    let chunks = pipeline.writer.chunks_for("news");
    assert_eq!(chunks.len(), 1);
    let keys: Vec<String> = chunks[0]
        .iter()
        .map(|r| r.dedup_key.clone().unwrap())
        .collect();
    assert_eq!(keys, vec!["/a", "/b", "/c"]);

    let index = pipeline.writer.index_for("news").unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].records, 3);
    assert_eq!(pipeline.writer.published(), vec!["news"]);

    assert!(!pipeline.worker.in_progress().unwrap());
    assert_eq!(pipeline.worker.initial_count().unwrap(), 3);
    assert_eq!(pipeline.worker.processed_count().unwrap(), 3);
}

#[test]
fn test_render_failure_skips_element_and_continues() {
    let mut pipeline = create_test_pipeline(vec![variant("news")], GenerationSettings::default());
    pipeline.renderer.set_data_sets(
        "news",
        vec![
            keyed_payload(&["/a"]),
            json!({ "fail": "boom" }),
            keyed_payload(&["/b"]),
        ],
    );

    let outcome = pipeline.worker.generate().unwrap();
    assert_eq!(outcome, GenerateOutcome::Finished);

    // The failing element is consumed and contributes nothing.
    assert_eq!(pipeline.queue.count().unwrap(), 0);
    let chunks = pipeline.writer.chunks_for("news");
    assert_eq!(chunks.len(), 1);
    let keys: Vec<String> = chunks[0]
        .iter()
        .map(|r| r.dedup_key.clone().unwrap())
        .collect();
    assert_eq!(keys, vec!["/a", "/b"]);
    assert_eq!(pipeline.writer.published(), vec!["news"]);
}

#[test]
fn test_generate_fails_fast_when_lock_is_held() {
    let mut pipeline = create_test_pipeline(vec![variant("news")], GenerationSettings::default());
    pipeline
        .renderer
        .set_data_sets("news", vec![keyed_payload(&["/a"])]);
    pipeline.builder.rebuild(None).unwrap();

    assert!(pipeline
        .lock
        .acquire(GENERATION_LOCK, Duration::from_secs(60))
        .unwrap());
    let err = pipeline.worker.generate().unwrap_err();
    assert!(matches!(err, PipelineError::LockHeld(_)));

    // Queued work survives the aborted invocation untouched.
    assert_eq!(pipeline.queue.count().unwrap(), 1);
    assert!(pipeline.worker.in_progress().unwrap());
    assert!(pipeline.writer.published().is_empty());
}

struct StampHook;

impl RecordHook for StampHook {
    fn adjust(&self, _variant: &str, records: &mut Vec<OutputRecord>) {
        for record in records.iter_mut() {
            record.body["stamped"] = json!(true);
        }
    }
}

#[test]
fn test_hooks_adjust_records_before_accumulation() {
    let mut pipeline = create_test_pipeline(vec![variant("news")], GenerationSettings::default());
    pipeline.renderer.set_data_sets(
        "news",
        vec![keyed_payload(&["/a"]), keyed_payload(&["/b"])],
    );
    pipeline.worker.add_hook(Arc::new(StampHook));

    pipeline.worker.generate().unwrap();

    let chunks = pipeline.writer.chunks_for("news");
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].iter().all(|r| r.body["stamped"] == json!(true)));
}

#[test]
fn test_driver_reports_progress_each_pass() {
    let settings = GenerationSettings {
        max_execution_time_ms: 10,
        ..GenerationSettings::default()
    };
    let mut pipeline = create_test_pipeline(vec![variant("news")], settings);
    pipeline.renderer.set_delay(Duration::from_millis(25));
    pipeline.renderer.set_data_sets(
        "news",
        vec![
            keyed_payload(&["/a"]),
            keyed_payload(&["/b"]),
            keyed_payload(&["/c"]),
        ],
    );

    let mut reports = Vec::new();
    let summary =
        driver::run_to_completion(&mut pipeline.worker, |progress| reports.push(progress))
            .unwrap();

    // The 25ms render against a 10ms budget limits each pass to one element.
    assert_eq!(summary.passes, 3);
    assert_eq!(summary.processed, 3);
    assert_eq!(
        reports.last().copied(),
        Some(Progress {
            processed: 3,
            initial: 3
        })
    );
    assert!(reports
        .windows(2)
        .all(|w| w[0].processed <= w[1].processed));
    assert_eq!(pipeline.writer.published(), vec!["news"]);
}

#[test]
fn test_driver_surfaces_fatal_errors() {
    let mut pipeline = create_test_pipeline(vec![variant("news")], GenerationSettings::default());
    pipeline
        .renderer
        .set_data_sets("news", vec![keyed_payload(&["/a"])]);
    pipeline.builder.rebuild(None).unwrap();
    assert!(pipeline
        .lock
        .acquire(GENERATION_LOCK, Duration::from_secs(60))
        .unwrap());

    let err = driver::run_to_completion(&mut pipeline.worker, |_| {}).unwrap_err();
    assert!(matches!(err, PipelineError::LockHeld(_)));
    // Queue and stash are intact; a later run can resume.
    assert!(pipeline.worker.in_progress().unwrap());
}
