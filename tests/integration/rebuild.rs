//! Queue building and rebuilding

use super::test_utils::{create_test_pipeline, keyed_payload, variant, WRITER_ID};
use bindery::builder::VariantDefinition;
use bindery::config::GenerationSettings;
use bindery::error::PipelineError;
use bindery::lock::Lock;
use bindery::queue::Queue;
use bindery::stash::Stash;
use bindery::worker::GENERATION_LOCK;
use serde_json::json;
use std::time::Duration;

#[test]
fn test_rebuild_twice_yields_identical_queue() {
    let pipeline = create_test_pipeline(
        vec![variant("news"), variant("docs")],
        GenerationSettings::default(),
    );
    pipeline.renderer.set_data_sets(
        "news",
        vec![keyed_payload(&["/n1"]), keyed_payload(&["/n2"])],
    );
    pipeline
        .renderer
        .set_data_sets("docs", vec![keyed_payload(&["/d1"])]);

    let snapshot = |p: &super::test_utils::TestPipeline| -> Vec<(String, serde_json::Value)> {
        p.queue
            .iterate()
            .map(|e| {
                let e = e.unwrap();
                (e.variant, e.payload)
            })
            .collect()
    };

    let first = pipeline.builder.rebuild(None).unwrap();
    let first_elements = snapshot(&pipeline);
    let second = pipeline.builder.rebuild(None).unwrap();
    let second_elements = snapshot(&pipeline);

    assert_eq!(first.enqueued, 3);
    assert_eq!(second.enqueued, 3);
    assert_eq!(first_elements, second_elements);
    assert_eq!(pipeline.queue.count().unwrap(), 3);
    assert_eq!(pipeline.worker.initial_count().unwrap(), 3);
}

#[test]
fn test_variants_without_data_sets_are_reported() {
    let pipeline = create_test_pipeline(
        vec![variant("news"), variant("ghost")],
        GenerationSettings::default(),
    );
    pipeline.renderer.set_data_sets(
        "news",
        vec![keyed_payload(&["/n1"]), keyed_payload(&["/n2"])],
    );

    let report = pipeline.builder.rebuild(None).unwrap();
    assert_eq!(report.enqueued, 2);
    assert_eq!(report.empty_variants, vec!["ghost"]);
}

#[test]
fn test_rebuild_discards_stale_stash() {
    let pipeline = create_test_pipeline(vec![variant("news")], GenerationSettings::default());
    pipeline
        .renderer
        .set_data_sets("news", vec![keyed_payload(&["/n1"])]);
    pipeline.stash.set(b"stale progress").unwrap();

    pipeline.builder.rebuild(None).unwrap();
    assert!(pipeline.stash.get().unwrap().is_none());
}

#[test]
fn test_rebuild_fails_fast_when_locked() {
    let pipeline = create_test_pipeline(vec![variant("news")], GenerationSettings::default());
    assert!(pipeline
        .lock
        .acquire(GENERATION_LOCK, Duration::from_secs(60))
        .unwrap());

    let err = pipeline.builder.rebuild(None).unwrap_err();
    assert!(matches!(err, PipelineError::LockHeld(_)));
}

#[test]
fn test_unknown_renderer_is_fatal() {
    let pipeline = create_test_pipeline(
        vec![VariantDefinition {
            id: "news".to_string(),
            renderers: vec!["missing".to_string()],
            writer: WRITER_ID.to_string(),
        }],
        GenerationSettings::default(),
    );

    let err = pipeline.builder.rebuild(None).unwrap_err();
    assert!(matches!(err, PipelineError::RendererNotFound(_)));
}

#[test]
fn test_filter_selects_single_variant() {
    let pipeline = create_test_pipeline(
        vec![variant("news"), variant("docs")],
        GenerationSettings::default(),
    );
    pipeline
        .renderer
        .set_data_sets("news", vec![keyed_payload(&["/n1"])]);
    pipeline
        .renderer
        .set_data_sets("docs", vec![keyed_payload(&["/d1"])]);

    pipeline.builder.rebuild(Some("docs")).unwrap();

    let variants: Vec<String> = pipeline
        .queue
        .iterate()
        .map(|e| e.unwrap().variant)
        .collect();
    assert_eq!(variants, vec!["docs"]);
}

#[test]
fn test_batched_enqueue_preserves_order() {
    let settings = GenerationSettings {
        enqueue_batch_size: 2,
        ..GenerationSettings::default()
    };
    let pipeline = create_test_pipeline(vec![variant("news")], settings);
    pipeline.renderer.set_data_sets(
        "news",
        (0..5).map(|n| json!({ "n": n, "records": [] })).collect(),
    );

    let report = pipeline.builder.rebuild(None).unwrap();
    assert_eq!(report.enqueued, 5);

    let order: Vec<u64> = pipeline
        .queue
        .iterate()
        .map(|e| e.unwrap().payload["n"].as_u64().unwrap())
        .collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
}
