//! Feeding a stage a document that already contains its own output must
//! always raise an invariant violation, never silently succeed.

use enrich::pipeline::{self, chunk, head, mwe, relation, segment, tag, tokenize, RunOptions,
    StageContext};
use enrich::Stage;

fn enriched(target: &str) -> enrich::Document {
    pipeline::run(
        "Alice sees Bob in Berlin. Bob pays Alice with cash.",
        &RunOptions::to_target(target),
        &StageContext::new(),
    )
    .unwrap()
}

#[test]
fn segmentation_rejects_segmented_input() {
    let doc = enriched("segmented");
    let err = segment::run(&doc, &StageContext::new()).unwrap_err();
    assert!(err.is_validation(), "{err}");
}

#[test]
fn tokenization_rejects_tokenized_input() {
    let doc = enriched("tokenized");
    let err = tokenize::run(&doc, &StageContext::new()).unwrap_err();
    assert!(err.is_validation(), "{err}");
}

#[test]
fn tagging_rejects_tagged_input() {
    let doc = enriched("pos_tagged");
    let err = tag::run(&doc, &StageContext::new()).unwrap_err();
    assert!(err.is_validation(), "{err}");
}

#[test]
fn mwe_extraction_rejects_existing_candidates() {
    let doc = enriched("mwe_candidates");
    let err = mwe::extract::run(&doc, &StageContext::new()).unwrap_err();
    assert!(err.is_validation(), "{err}");
}

#[test]
fn chunking_rejects_existing_chunks() {
    let doc = enriched("heads_identified"); // quirk: stops after chunking
    assert_eq!(doc.stage, Stage::Chunked);
    let err = chunk::run(&doc, &StageContext::new()).unwrap_err();
    assert!(err.is_validation(), "{err}");
}

#[test]
fn head_identification_rejects_existing_heads() {
    let doc = enriched("relations_extracted");
    let err = head::run(&doc, &StageContext::new()).unwrap_err();
    assert!(err.is_validation(), "{err}");
}

#[test]
fn relation_extraction_rejects_existing_relations() {
    let doc = enriched("relations_extracted");
    let err = relation::run(&doc, &StageContext::new()).unwrap_err();
    assert!(err.is_validation(), "{err}");
}

#[test]
fn orchestrator_rejects_enriched_document_claiming_canonical() {
    let mut doc = enriched("tokenized");
    doc.stage = Stage::Canonical;
    let err = pipeline::run(&doc, &RunOptions::default(), &StageContext::new()).unwrap_err();
    assert!(err.is_validation(), "{err}");
}
