//! Chunk coverage: over a sentence without punctuation or coordinators,
//! chunk token sequences exactly partition the token list.

use enrich::pipeline::{self, RunOptions, StageContext};
use enrich::{AnnotationKind, AnnotationStatus};

fn chunked(text: &str) -> enrich::Document {
    // Quirk: heads_identified resolves to the chunking stage.
    pipeline::run(
        text,
        &RunOptions::to_target("heads_identified"),
        &StageContext::new(),
    )
    .unwrap()
}

fn assert_partition(text: &str) {
    let doc = chunked(text);
    let mut covered: Vec<String> = Vec::new();
    for ann in doc
        .annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::Chunk)
    {
        covered.extend(ann.anchor.token_ids().unwrap().iter().cloned());
    }
    let all: Vec<String> = doc.tokens.iter().map(|t| t.id.clone()).collect();
    assert_eq!(covered, all, "chunks do not partition {text:?}");
}

#[test]
fn simple_transitive_sentence_partitions() {
    assert_partition("Alice sees Bob");
}

#[test]
fn sentence_with_pp_partitions() {
    assert_partition("Alice sees Bob in Berlin");
}

#[test]
fn nominal_sentence_partitions() {
    assert_partition("The old engine failed");
}

#[test]
fn longer_sentence_partitions() {
    assert_partition("The new owner pays the old driver with cash");
}

#[test]
fn punctuated_sentence_still_covers_every_token() {
    // With punctuation, coverage still holds: punctuation lands in O chunks.
    assert_partition("Alice sees Bob, and Bob waves.");
}

#[test]
fn chunks_are_accepted_and_typed() {
    let doc = chunked("Alice sees Bob in Berlin");
    for ann in doc
        .annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::Chunk)
    {
        assert_eq!(ann.status, AnnotationStatus::Accepted);
        let label = ann.label.as_deref().unwrap();
        assert!(matches!(label, "NP" | "VP" | "PP" | "O"));
    }
}
