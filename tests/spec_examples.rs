//! Worked end-to-end examples pinned as regression tests.

use enrich::pipeline::tag::LookupTagger;
use enrich::pipeline::{self, RunOptions, StageContext};
use enrich::{AnnotationKind, AnnotationStatus, RelationBody};

#[test]
fn abbreviation_does_not_end_sentence() {
    let doc = pipeline::run(
        "Dr. Smith went home.",
        &RunOptions::to_target("segmented"),
        &StageContext::new(),
    )
    .unwrap();
    assert_eq!(doc.segments.len(), 1);
    assert_eq!(doc.segments[0].text, "Dr. Smith went home.");
}

#[test]
fn contraction_splits_into_three_tokens() {
    let doc = pipeline::run(
        "don't stop",
        &RunOptions::to_target("tokenized"),
        &StageContext::new(),
    )
    .unwrap();
    let surfaces: Vec<&str> = doc.tokens.iter().map(|t| t.surface.as_str()).collect();
    assert_eq!(surfaces, vec!["do", "n't", "stop"]);
}

#[test]
fn hyphen_compound_stays_one_token() {
    let doc = pipeline::run(
        "state-of-the-art",
        &RunOptions::to_target("tokenized"),
        &StageContext::new(),
    )
    .unwrap();
    let surfaces: Vec<&str> = doc.tokens.iter().map(|t| t.surface.as_str()).collect();
    assert_eq!(surfaces, vec!["state-of-the-art"]);
}

#[test]
fn ships_to_berlin_chunks_as_vp_then_pp() {
    let ctx = StageContext::new().with_tagger(Box::new(LookupTagger::new(
        &[("Ships", "VBZ"), ("to", "TO"), ("Berlin", "NNP")],
        "NN",
    )));
    let doc = pipeline::run(
        "Ships to Berlin",
        &RunOptions::to_target("heads_identified"),
        &ctx,
    )
    .unwrap();
    let chunks: Vec<(String, String)> = doc
        .annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::Chunk)
        .map(|a| {
            (
                a.label.clone().unwrap(),
                a.anchor.exact().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        chunks,
        vec![
            ("VP".to_string(), "Ships".to_string()),
            ("PP".to_string(), "to Berlin".to_string()),
        ]
    );
}

#[test]
fn alice_sees_bob_in_berlin_yields_actor_and_location() {
    let doc = pipeline::run(
        "Alice sees Bob in Berlin.",
        &RunOptions::to_target("relations_extracted"),
        &StageContext::new(),
    )
    .unwrap();
    let relations: Vec<(String, String, String)> = doc
        .annotations
        .iter()
        .filter(|a| {
            a.kind == AnnotationKind::Dependency && a.status == AnnotationStatus::Accepted
        })
        .filter_map(|a| a.body_as::<RelationBody>())
        .map(|b| {
            let pred = doc.token_by_id(&b.predicate_id).unwrap().surface.clone();
            let arg = doc.token_by_id(&b.argument_id).unwrap().surface.clone();
            (b.role, pred, arg)
        })
        .collect();
    assert!(
        relations.contains(&("actor".into(), "sees".into(), "Alice".into())),
        "missing actor relation in {relations:?}"
    );
    assert!(
        relations.contains(&("location".into(), "sees".into(), "Berlin".into())),
        "missing location relation in {relations:?}"
    );
}
