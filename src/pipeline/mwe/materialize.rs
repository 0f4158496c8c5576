//! Stage 07: MWE materialization.
//!
//! Promotes surviving candidates to `accepted` after verifying the match is
//! a contiguous token run inside a single segment; anything else demotes to
//! `observation`. Promotion recomputes the exact span/quote selectors from
//! the member tokens and records the head token (last token of the span) as
//! evidence.

use crate::annotation::{Anchor, AnnotationKind, AnnotationStatus, Source};
use crate::document::{Document, Stage, Token};
use crate::error::Result;
use crate::pipeline::mwe::token_key;
use crate::pipeline::{one_way_door, StageContext};
use crate::span::Span;
use serde_json::json;
use std::collections::HashSet;

/// Registry name of this stage.
pub const STAGE_NAME: &str = "mwe-materialization";

/// Run MWE materialization.
pub fn run(doc: &Document, _ctx: &StageContext) -> Result<Document> {
    let accepted: Vec<&str> = doc
        .annotations_of(AnnotationKind::Mwe)
        .filter(|a| a.status == AnnotationStatus::Accepted)
        .map(|a| a.id.as_str())
        .collect();
    if !accepted.is_empty() {
        return Err(one_way_door(
            STAGE_NAME,
            "document already carries accepted mwe annotations",
            json!({"count": accepted.len(), "first": accepted[0]}),
        ));
    }

    let mut out = doc.clone();
    let mut seen_keys: HashSet<String> = HashSet::new();
    // Collect promotions first; anchors need the (immutable) token table.
    let mut updates: Vec<(usize, Disposition)> = Vec::new();

    for (idx, ann) in out.annotations.iter().enumerate() {
        if ann.kind != AnnotationKind::Mwe || ann.status != AnnotationStatus::Candidate {
            continue;
        }
        let token_ids = ann.anchor.token_ids().unwrap_or_default().to_vec();
        let key = token_key(&token_ids);
        if !seen_keys.insert(key) {
            updates.push((idx, Disposition::Demote("duplicate_token_set")));
            continue;
        }
        let tokens: Vec<&Token> = token_ids
            .iter()
            .filter_map(|id| doc.token_by_id(id))
            .collect();
        if tokens.len() != token_ids.len() || !is_contiguous_single_segment(&tokens) {
            updates.push((idx, Disposition::Demote("not_contiguous_in_segment")));
            continue;
        }
        let span = Span::new(tokens[0].span.start, tokens[tokens.len() - 1].span.end);
        let exact = doc.slice(span).unwrap_or_default().to_string();
        let head = tokens[tokens.len() - 1].id.clone();
        updates.push((idx, Disposition::Promote { span, exact, head }));
    }

    for (idx, disposition) in updates {
        let ann = &mut out.annotations[idx];
        match disposition {
            Disposition::Promote { span, exact, head } => {
                let token_ids = ann.anchor.token_ids().unwrap_or_default().to_vec();
                ann.status = AnnotationStatus::Accepted;
                ann.anchor = Anchor::triple(token_ids, span, exact);
                ann.sources.push(Source::with_evidence(
                    STAGE_NAME,
                    "head",
                    json!({"head_token_id": head}),
                ));
            }
            Disposition::Demote(reason) => {
                ann.status = AnnotationStatus::Observation;
                ann.sources.push(Source::with_evidence(
                    STAGE_NAME,
                    "demotion",
                    json!({"reason": reason}),
                ));
            }
        }
    }

    out.stage = Stage::MweMaterialized;
    Ok(out)
}

enum Disposition {
    Promote {
        span: Span,
        exact: String,
        head: String,
    },
    Demote(&'static str),
}

/// Tokens form one consecutive run (`i` strictly increments) inside a single
/// segment.
fn is_contiguous_single_segment(tokens: &[&Token]) -> bool {
    if tokens.is_empty() {
        return false;
    }
    let segment = &tokens[0].segment_id;
    tokens.windows(2).all(|pair| {
        pair[1].segment_id == *segment && pair[1].i == pair[0].i + 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mwe::{construct, extract};
    use crate::pipeline::{segment, tag, tokenize};

    fn constructed(text: &str) -> Document {
        let ctx = StageContext::new();
        let doc = Document::from_text(text);
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = tokenize::run(&doc, &ctx).unwrap();
        let doc = tag::run(&doc, &ctx).unwrap();
        let doc = extract::run(&doc, &ctx).unwrap();
        construct::run(&doc, &ctx).unwrap()
    }

    #[test]
    fn test_contiguous_candidate_promoted() {
        let doc = constructed("The sales pipeline grew.");
        let out = run(&doc, &StageContext::new()).unwrap();
        let accepted: Vec<_> = out
            .annotations_of(AnnotationKind::Mwe)
            .filter(|a| a.status == AnnotationStatus::Accepted)
            .collect();
        assert!(!accepted.is_empty());
        assert_eq!(out.stage, Stage::MweMaterialized);
    }

    #[test]
    fn test_promotion_recomputes_quote() {
        let doc = constructed("The sales pipeline grew.");
        let out = run(&doc, &StageContext::new()).unwrap();
        for ann in out
            .annotations_of(AnnotationKind::Mwe)
            .filter(|a| a.status == AnnotationStatus::Accepted)
        {
            let span = ann.anchor.span().unwrap();
            assert_eq!(out.slice(span), ann.anchor.exact());
        }
    }

    #[test]
    fn test_head_evidence_is_last_token() {
        let doc = constructed("The sales pipeline grew.");
        let out = run(&doc, &StageContext::new()).unwrap();
        let ann = out
            .annotations_of(AnnotationKind::Mwe)
            .find(|a| a.status == AnnotationStatus::Accepted)
            .unwrap();
        let head_source = ann
            .sources
            .iter()
            .find(|s| s.name == STAGE_NAME)
            .unwrap();
        let head_id = head_source.evidence.as_ref().unwrap()["head_token_id"]
            .as_str()
            .unwrap();
        let last_token_id = ann.anchor.token_ids().unwrap().last().unwrap();
        assert_eq!(head_id, last_token_id);
    }

    #[test]
    fn test_one_way_door() {
        let ctx = StageContext::new();
        let doc = constructed("The sales pipeline grew.");
        let out = run(&doc, &ctx).unwrap();
        let err = run(&out, &ctx).unwrap_err();
        assert!(err.to_string().contains("already carries accepted"));
    }
}
