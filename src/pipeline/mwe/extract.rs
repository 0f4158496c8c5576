//! Stage 05: MWE candidate extraction.
//!
//! Runs the fixed pattern set against each segment's token stream with a
//! backtracking matcher over optional elements. Matches never cross
//! punctuation or segment boundaries (punctuation fails every element
//! class, and matching is per-segment). Verb-initial patterns pass a
//! semantic filter that rejects weak objects and noun-free matches.
//! Overlapping matches on an identical token-id set merge into a single
//! candidate carrying every matching pattern id.

use crate::annotation::{Anchor, Annotation, AnnotationKind, AnnotationStatus, Source};
use crate::document::{Document, Stage, Token};
use crate::error::{Error, Result};
use crate::ident::content_id;
use crate::pipeline::mwe::patterns::{MwePattern, PatternElement, PATTERNS};
use crate::pipeline::mwe::{candidate_label, token_key};
use crate::pipeline::{one_way_door, StageContext};
use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};

/// Registry name of this stage.
pub const STAGE_NAME: &str = "mwe-extraction";

/// Generic objects that never anchor a verb-initial expression.
pub static WEAK_OBJECTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "customer", "customers", "people", "user", "users", "thing", "things", "someone",
        "somebody", "something",
    ]
    .into_iter()
    .collect()
});

/// Run MWE candidate extraction.
pub fn run(doc: &Document, _ctx: &StageContext) -> Result<Document> {
    let existing = doc
        .annotations_of(AnnotationKind::Mwe)
        .map(|a| a.id.clone())
        .collect::<Vec<_>>();
    if !existing.is_empty() {
        return Err(one_way_door(
            STAGE_NAME,
            "document already carries mwe annotations",
            json!({"count": existing.len(), "first": existing[0]}),
        ));
    }
    if doc.tokens.iter().any(|t| t.pos.is_none()) {
        return Err(Error::invariant(
            "mwe extraction requires POS tags on every token",
            json!({"stage": STAGE_NAME}),
        ));
    }

    // token-key → (first span start, span len, first pattern id, token ids, all pattern ids)
    let mut merged: BTreeMap<String, CandidateDraft> = BTreeMap::new();

    for segment in &doc.segments {
        let tokens = doc.segment_tokens(segment);
        for start in 0..tokens.len() {
            for pattern in PATTERNS {
                for length in match_lengths(tokens, start, pattern.elements) {
                    let matched = &tokens[start..start + length];
                    if pattern.verb_initial && !passes_verb_filter(pattern, matched) {
                        continue;
                    }
                    let token_ids: Vec<String> =
                        matched.iter().map(|t| t.id.clone()).collect();
                    let key = token_key(&token_ids);
                    let draft = merged.entry(key).or_insert_with(|| CandidateDraft {
                        segment_id: segment.id.clone(),
                        token_ids,
                        span_start: matched[0].span.start,
                        span_len: matched[length - 1].span.end - matched[0].span.start,
                        patterns: Vec::new(),
                    });
                    if !draft.patterns.iter().any(|p| p == pattern.id) {
                        draft.patterns.push(pattern.id.to_string());
                    }
                }
            }
        }
    }

    let mut drafts: Vec<(String, CandidateDraft)> = merged.into_iter().collect();
    drafts.sort_by(|(ka, a), (kb, b)| {
        a.span_start
            .cmp(&b.span_start)
            .then(b.span_len.cmp(&a.span_len))
            .then(a.patterns[0].cmp(&b.patterns[0]))
            .then(ka.cmp(kb))
    });

    let mut out = doc.clone();
    for (_, draft) in drafts {
        out.annotations.push(draft.into_annotation(doc));
    }
    out.stage = Stage::MweCandidates;
    Ok(out)
}

struct CandidateDraft {
    segment_id: String,
    token_ids: Vec<String>,
    span_start: usize,
    span_len: usize,
    patterns: Vec<String>,
}

impl CandidateDraft {
    fn into_annotation(self, doc: &Document) -> Annotation {
        let tokens: Vec<&Token> = self
            .token_ids
            .iter()
            .filter_map(|id| doc.token_by_id(id))
            .collect();
        let span = crate::span::Span::new(
            tokens[0].span.start,
            tokens[tokens.len() - 1].span.end,
        );
        let exact = doc.slice(span).unwrap_or_default().to_string();
        let id = content_id(
            "mwe",
            &json!({
                "segment_id": self.segment_id,
                "token_ids": self.token_ids,
                "patterns": self.patterns,
            }),
        );
        Annotation {
            id,
            kind: AnnotationKind::Mwe,
            status: AnnotationStatus::Candidate,
            label: Some(candidate_label(&tokens)),
            anchor: Anchor::triple(self.token_ids.clone(), span, exact),
            sources: vec![Source::with_evidence(
                "mwe-extraction",
                "pattern",
                json!({"patterns": self.patterns}),
            )],
            body: json!({
                "segment_id": self.segment_id,
                "token_ids": self.token_ids,
                "patterns": self.patterns,
            }),
        }
    }
}

/// All consumed-token counts at which `elements` completes from `start`.
///
/// Backtracks over optional elements: each optional may be skipped or
/// matched, required elements must match. Pattern lengths are small, so the
/// recursion is bounded and memoization-free.
#[must_use]
pub fn match_lengths(tokens: &[Token], start: usize, elements: &[PatternElement]) -> Vec<usize> {
    fn rec(tokens: &[Token], pos: usize, elements: &[PatternElement], out: &mut Vec<usize>, start: usize) {
        let element = match elements.first() {
            None => {
                let len = pos - start;
                if len >= 2 && !out.contains(&len) {
                    out.push(len);
                }
                return;
            }
            Some(e) => e,
        };
        if element.optional {
            rec(tokens, pos, &elements[1..], out, start);
        }
        if pos < tokens.len() && element_matches(element, &tokens[pos]) {
            rec(tokens, pos + 1, &elements[1..], out, start);
        }
    }
    let mut out = Vec::new();
    rec(tokens, start, elements, &mut out, start);
    out.sort_unstable();
    out
}

fn element_matches(element: &PatternElement, token: &Token) -> bool {
    if token.is_punct || !element.class.matches(token) {
        return false;
    }
    match element.surfaces {
        Some(allowed) => allowed.contains(&token.surface.to_lowercase().as_str()),
        None => true,
    }
}

/// Semantic filter for verb-initial matches. `verb_to_verb` carries its own
/// allow-list constraint instead of the noun checks.
fn passes_verb_filter(pattern: &MwePattern, matched: &[Token]) -> bool {
    if pattern.id == "verb_to_verb" {
        return true;
    }
    let last_noun = matched.iter().rev().find(|t| t.is_nounish());
    match last_noun {
        None => false,
        Some(noun) => !WEAK_OBJECTS.contains(noun.surface.to_lowercase().as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{segment, tag, tokenize};

    fn extract(text: &str) -> Document {
        let ctx = StageContext::new();
        let doc = Document::from_text(text);
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = tokenize::run(&doc, &ctx).unwrap();
        let doc = tag::run(&doc, &ctx).unwrap();
        run(&doc, &ctx).unwrap()
    }

    fn labels(doc: &Document) -> Vec<String> {
        doc.annotations_of(AnnotationKind::Mwe)
            .map(|a| a.label.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_noun_noun_candidate() {
        let doc = extract("The sales pipeline grew.");
        assert!(labels(&doc).contains(&"sales pipeline".to_string()));
    }

    #[test]
    fn test_candidates_do_not_cross_sentences() {
        // "pipeline" ends one sentence, "Review" starts the next.
        let doc = extract("We built the pipeline. Review tools arrived.");
        assert!(!labels(&doc).iter().any(|l| l.contains("pipeline Review")));
    }

    #[test]
    fn test_punctuation_blocks_match() {
        let doc = extract("sales, pipeline");
        assert!(labels(&doc).is_empty());
    }

    #[test]
    fn test_weak_object_rejected() {
        // "serves customers" = VBZ + NNS, but "customers" is a weak object.
        let doc = extract("It serves customers.");
        assert!(labels(&doc).is_empty());
    }

    #[test]
    fn test_identical_token_sets_merge() {
        // Two proper nouns satisfy both noun_noun and propn_propn over the
        // same token set; the match surfaces as one candidate carrying both
        // pattern ids.
        let doc = extract("Acme Corporation expanded.");
        let merged: Vec<&Annotation> = doc
            .annotations_of(AnnotationKind::Mwe)
            .filter(|a| a.label.as_deref() == Some("Acme Corporation"))
            .collect();
        assert_eq!(merged.len(), 1);
        let patterns = merged[0].body["patterns"].as_array().unwrap();
        assert_eq!(patterns.len(), 2);
    }

    #[test]
    fn test_candidates_sorted_and_deterministic() {
        let a = extract("The data processing pipeline failed.");
        let b = extract("The data processing pipeline failed.");
        let ids_a: Vec<&str> = a
            .annotations_of(AnnotationKind::Mwe)
            .map(|x| x.id.as_str())
            .collect();
        let ids_b: Vec<&str> = b
            .annotations_of(AnnotationKind::Mwe)
            .map(|x| x.id.as_str())
            .collect();
        assert_eq!(ids_a, ids_b);
        let spans: Vec<usize> = a
            .annotations_of(AnnotationKind::Mwe)
            .map(|x| x.anchor.span().unwrap().start)
            .collect();
        let mut sorted = spans.clone();
        sorted.sort_unstable();
        assert_eq!(spans, sorted);
    }

    #[test]
    fn test_label_strips_determiners() {
        let doc = extract("They renewed the service contract.");
        // verb_noun with optional DT consumed: label drops "the".
        assert!(labels(&doc)
            .iter()
            .any(|l| l == "renewed service contract" || l == "service contract"));
    }

    #[test]
    fn test_one_way_door() {
        let ctx = StageContext::new();
        let doc = extract("The sales pipeline grew.");
        let err = run(&doc, &ctx).unwrap_err();
        assert!(err.to_string().contains("already carries mwe"));
    }

    #[test]
    fn test_status_is_candidate() {
        let doc = extract("The sales pipeline grew.");
        for ann in doc.annotations_of(AnnotationKind::Mwe) {
            assert_eq!(ann.status, AnnotationStatus::Candidate);
        }
        assert_eq!(doc.stage, Stage::MweCandidates);
    }
}
