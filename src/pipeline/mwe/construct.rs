//! Stage 06: MWE construction.
//!
//! Deduplicates candidates by token-id-set key (first occurrence survives,
//! later duplicates demote to `observation`), confirms deterministic ids,
//! and optionally enriches surviving candidates with lexicon evidence.
//! Lexicon lookups are best-effort: a failure leaves the candidate exactly
//! as it was, minus the evidence.

use crate::annotation::{AnnotationKind, AnnotationStatus, Source};
use crate::document::{Document, Stage};
use crate::error::Result;
use crate::pipeline::mwe::token_key;
use crate::pipeline::{one_way_door, StageContext};
use serde_json::json;
use std::collections::HashMap;

/// Registry name of this stage.
pub const STAGE_NAME: &str = "mwe-construction";

/// Run MWE construction.
pub fn run(doc: &Document, ctx: &StageContext) -> Result<Document> {
    let constructed: Vec<&str> = doc
        .annotations_of(AnnotationKind::Mwe)
        .filter(|a| a.has_source(STAGE_NAME))
        .map(|a| a.id.as_str())
        .collect();
    if !constructed.is_empty() {
        return Err(one_way_door(
            STAGE_NAME,
            "document already carries constructed mwe annotations",
            json!({"count": constructed.len(), "first": constructed[0]}),
        ));
    }

    let mut out = doc.clone();
    let mut first_by_key: HashMap<String, String> = HashMap::new();

    for ann in &mut out.annotations {
        if ann.kind != AnnotationKind::Mwe || ann.status != AnnotationStatus::Candidate {
            continue;
        }
        let key = ann.anchor.token_ids().map(token_key).unwrap_or_default();
        match first_by_key.get(&key) {
            None => {
                first_by_key.insert(key, ann.id.clone());
                ann.sources.push(Source::new(STAGE_NAME, "dedup"));
                if let Some(lexicon) = &ctx.lexicon {
                    let surface = ann.anchor.exact().unwrap_or_default();
                    if let Some(evidence) = lexicon.evidence(surface) {
                        ann.sources
                            .push(Source::with_evidence("lexicon", "wiki_title", evidence));
                    }
                }
            }
            Some(first_id) => {
                ann.status = AnnotationStatus::Observation;
                ann.sources.push(Source::with_evidence(
                    STAGE_NAME,
                    "dedup",
                    json!({"duplicate_of": first_id}),
                ));
            }
        }
    }

    out.stage = Stage::MweConstructed;
    Ok(out)
}
