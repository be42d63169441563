//! Cross-element deduplication within a variant

use super::test_utils::{create_test_pipeline, variant};
use bindery::config::GenerationSettings;
use bindery::worker::GenerateOutcome;
use serde_json::json;

fn sourced(key: &str, src: u64) -> serde_json::Value {
    json!({ "records": [{ "dedup_key": key, "body": { "src": src } }] })
}

#[test]
fn test_first_record_wins_within_variant() {
    let mut pipeline = create_test_pipeline(vec![variant("news")], GenerationSettings::default());
    pipeline.renderer.set_data_sets(
        "news",
        vec![sourced("/a", 1), sourced("/a", 2), sourced("/b", 3)],
    );

    let outcome = pipeline.worker.generate().unwrap();
    assert_eq!(outcome, GenerateOutcome::Finished);

    let chunks = pipeline.writer.chunks_for("news");
    assert_eq!(chunks.len(), 1);
    let records: Vec<(String, u64)> = chunks[0]
        .iter()
        .map(|r| {
            (
                r.dedup_key.clone().unwrap(),
                r.body["src"].as_u64().unwrap(),
            )
        })
        .collect();
    // The second "/a" is dropped; the survivor is the first-encountered one.
    assert_eq!(records, vec![("/a".to_string(), 1), ("/b".to_string(), 3)]);
}

#[test]
fn test_colliding_render_batch_is_dropped_wholesale() {
    let mut pipeline = create_test_pipeline(vec![variant("news")], GenerationSettings::default());
    pipeline.renderer.set_data_sets(
        "news",
        vec![
            sourced("/a", 1),
            // One colliding key discards the whole batch, fresh "/c" included.
            json!({ "records": [
                { "dedup_key": "/a", "body": { "src": 2 } },
                { "dedup_key": "/c", "body": { "src": 2 } },
            ] }),
            // The dropped batch did not mark "/c" seen, so this one survives.
            sourced("/c", 3),
        ],
    );

    pipeline.worker.generate().unwrap();

    let chunks = pipeline.writer.chunks_for("news");
    let records: Vec<(String, u64)> = chunks[0]
        .iter()
        .map(|r| {
            (
                r.dedup_key.clone().unwrap(),
                r.body["src"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(records, vec![("/a".to_string(), 1), ("/c".to_string(), 3)]);
}

#[test]
fn test_dedup_disabled_keeps_duplicates() {
    let settings = GenerationSettings {
        remove_duplicates: false,
        ..GenerationSettings::default()
    };
    let mut pipeline = create_test_pipeline(vec![variant("news")], settings);
    pipeline
        .renderer
        .set_data_sets("news", vec![sourced("/a", 1), sourced("/a", 2)]);

    pipeline.worker.generate().unwrap();

    let chunks = pipeline.writer.chunks_for("news");
    assert_eq!(chunks[0].len(), 2);
}

#[test]
fn test_keyless_records_are_never_deduplicated() {
    let mut pipeline = create_test_pipeline(vec![variant("news")], GenerationSettings::default());
    let keyless = json!({ "records": [{ "body": { "loc": "/same" } }] });
    pipeline
        .renderer
        .set_data_sets("news", vec![keyless.clone(), keyless]);

    pipeline.worker.generate().unwrap();

    let chunks = pipeline.writer.chunks_for("news");
    assert_eq!(chunks[0].len(), 2);
}

#[test]
fn test_seen_keys_reset_between_variants() {
    let mut pipeline = create_test_pipeline(
        vec![variant("alpha"), variant("beta")],
        GenerationSettings::default(),
    );
    pipeline.renderer.set_data_sets("alpha", vec![sourced("/x", 1)]);
    pipeline.renderer.set_data_sets("beta", vec![sourced("/x", 2)]);

    pipeline.worker.generate().unwrap();

    // The same key in a different variant is not a duplicate.
    assert_eq!(pipeline.writer.chunks_for("alpha")[0].len(), 1);
    assert_eq!(pipeline.writer.chunks_for("beta")[0].len(), 1);
}
