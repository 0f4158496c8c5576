//! Exactly one chunk_head per accepted chunk, each anchoring one token.

use enrich::pipeline::{self, RunOptions, StageContext};
use enrich::{AnnotationKind, AnnotationStatus, ChunkHeadBody};
use std::collections::HashSet;

fn with_heads(text: &str) -> enrich::Document {
    pipeline::run(text, &RunOptions::default(), &StageContext::new()).unwrap()
}

#[test]
fn one_head_per_chunk() {
    let doc = with_heads("Alice sees Bob in Berlin. The old engine failed today. Bob pays Alice with cash.");
    let chunk_ids: HashSet<&str> = doc
        .annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::Chunk && a.status == AnnotationStatus::Accepted)
        .map(|a| a.id.as_str())
        .collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut head_count = 0;
    for head in doc
        .annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::ChunkHead)
    {
        let body: ChunkHeadBody = head.body_as().unwrap();
        assert!(
            chunk_ids.contains(body.chunk_id.as_str()),
            "head references unknown chunk"
        );
        assert!(
            seen.insert(body.chunk_id.clone()),
            "chunk {} has two heads",
            body.chunk_id
        );
        head_count += 1;
    }
    assert_eq!(head_count, chunk_ids.len());
}

#[test]
fn head_token_selector_has_length_one() {
    let doc = with_heads("Alice sees Bob in Berlin.");
    for head in doc
        .annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::ChunkHead)
    {
        assert_eq!(head.anchor.token_ids().unwrap().len(), 1);
    }
}

#[test]
fn head_token_is_member_of_its_chunk() {
    let doc = with_heads("Alice sees Bob in Berlin. Bob pays Alice with cash.");
    for head in doc
        .annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::ChunkHead)
    {
        let body: ChunkHeadBody = head.body_as().unwrap();
        let chunk = doc
            .annotations
            .iter()
            .find(|a| a.id == body.chunk_id)
            .unwrap();
        assert!(chunk
            .anchor
            .token_ids()
            .unwrap()
            .contains(&body.head_token_id));
    }
}

#[test]
fn decisions_record_candidates_and_rule() {
    let doc = with_heads("Alice sees Bob in Berlin.");
    for head in doc
        .annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::ChunkHead)
    {
        let body: ChunkHeadBody = head.body_as().unwrap();
        assert!(!body.head_decision.candidates.is_empty());
        assert!(body
            .head_decision
            .candidates
            .contains(&body.head_decision.chosen));
        assert!([
            "dependency_root",
            "positional_fallback",
            "allow_any_fallback",
            "matrix_lexical_preference",
            "vp_lexical_override",
        ]
        .contains(&body.head_decision.rule.as_str()));
    }
}
