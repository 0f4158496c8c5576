//! Runtime invariant validation.
//!
//! Everything a schema language cannot express: span bounds against the
//! actual text length, ordering, id uniqueness, cross-references between
//! tokens, segments, chunks, and annotations, and the quote/position
//! agreement that keeps anchors honest across index bases.
//!
//! The orchestrator runs this before and after every stage, which makes each
//! stage boundary a consistency checkpoint: later stages may assume upstream
//! invariants hold (head identification, for example, assumes every accepted
//! chunk has resolvable, ordered tokens).

use crate::annotation::{AnnotationKind, ChunkBody, ChunkHeadBody, DependencyBody, RelationBody};
use crate::document::Document;
use crate::error::{Error, Result};
use serde_json::{json, Value};
use std::collections::HashSet;

/// One invariant violation.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Which invariant failed, e.g. `token_order`.
    pub rule: String,
    /// What went wrong.
    pub message: String,
    /// Offending ids or indices.
    pub subject: Value,
}

impl Violation {
    fn new(rule: &str, message: impl Into<String>, subject: Value) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
            subject,
        }
    }

    fn to_value(&self) -> Value {
        json!({"rule": self.rule, "message": self.message, "subject": self.subject})
    }
}

/// Validate runtime invariants.
///
/// Pure check: never mutates, idempotent on valid documents.
pub fn validate_invariants(doc: &Document) -> Result<()> {
    let violations = collect_violations(doc);
    if violations.is_empty() {
        return Ok(());
    }
    let details = json!({
        "count": violations.len(),
        "violations": violations.iter().map(Violation::to_value).collect::<Vec<_>>(),
    });
    Err(Error::invariant(
        format!(
            "{} violation(s), first: {} ({})",
            violations.len(),
            violations[0].message,
            violations[0].rule
        ),
        details,
    ))
}

/// Collect all violations without failing.
#[must_use]
pub fn collect_violations(doc: &Document) -> Vec<Violation> {
    let mut out = Vec::new();
    let offsets = doc.offsets();
    let unit = doc.unit();
    let text_len = offsets.len_in(unit);

    let token_ids: HashSet<&str> = doc.tokens.iter().map(|t| t.id.as_str()).collect();
    let segment_ids: HashSet<&str> = doc.segments.iter().map(|s| s.id.as_str()).collect();
    let chunk_ids: HashSet<&str> = doc
        .annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::Chunk)
        .map(|a| a.id.as_str())
        .collect();

    // --- segments: order, uniqueness, index agreement, token ranges ---
    let mut seen = HashSet::new();
    for (idx, segment) in doc.segments.iter().enumerate() {
        if !seen.insert(segment.id.as_str()) {
            out.push(Violation::new(
                "segment_id_unique",
                "duplicate segment id",
                json!(segment.id),
            ));
        }
        if segment.index != idx {
            out.push(Violation::new(
                "segment_index",
                format!("segment index {} does not match position {idx}", segment.index),
                json!(segment.id),
            ));
        }
        if idx > 0 && doc.segments[idx - 1].span.start > segment.span.start {
            out.push(Violation::new(
                "segment_order",
                "segments not ordered by span start",
                json!(segment.id),
            ));
        }
        check_span_bounds(&mut out, "segment_span", &segment.id, segment.span, text_len);
        if offsets
            .slice(&doc.canonical_text, segment.span, unit)
            .map(str::trim)
            != Some(segment.text.as_str())
        {
            out.push(Violation::new(
                "segment_text",
                "segment text does not match sliced span",
                json!(segment.id),
            ));
        }
        if let Some(range) = segment.token_range {
            if range.end > doc.tokens.len() {
                out.push(Violation::new(
                    "segment_token_range",
                    "token range exceeds token count",
                    json!({"segment": segment.id, "end": range.end}),
                ));
            } else {
                for token in &doc.tokens[range.start..range.end] {
                    if token.segment_id != segment.id {
                        out.push(Violation::new(
                            "segment_token_range",
                            "token in range belongs to another segment",
                            json!({"segment": segment.id, "token": token.id}),
                        ));
                    }
                }
            }
        }
    }

    // --- tokens: order, uniqueness, index agreement, segment refs ---
    let mut seen = HashSet::new();
    for (idx, token) in doc.tokens.iter().enumerate() {
        if !seen.insert(token.id.as_str()) {
            out.push(Violation::new(
                "token_id_unique",
                "duplicate token id",
                json!(token.id),
            ));
        }
        if token.i != idx {
            out.push(Violation::new(
                "token_index",
                format!("token i {} does not match position {idx}", token.i),
                json!(token.id),
            ));
        }
        if idx > 0 && doc.tokens[idx - 1].span.start > token.span.start {
            out.push(Violation::new(
                "token_order",
                "tokens not ordered by span start",
                json!(token.id),
            ));
        }
        check_span_bounds(&mut out, "token_span", &token.id, token.span, text_len);
        if !segment_ids.contains(token.segment_id.as_str()) {
            out.push(Violation::new(
                "token_segment_ref",
                "token references missing segment",
                json!({"token": token.id, "segment": token.segment_id}),
            ));
        }
        if offsets.slice(&doc.canonical_text, token.span, unit) != Some(token.surface.as_str()) {
            out.push(Violation::new(
                "token_surface",
                "token surface does not match sliced span",
                json!(token.id),
            ));
        }
    }

    // --- annotations: uniqueness, anchor refs, quote agreement, bodies ---
    let mut seen = HashSet::new();
    for ann in &doc.annotations {
        if !seen.insert(ann.id.as_str()) {
            out.push(Violation::new(
                "annotation_id_unique",
                "duplicate annotation id",
                json!(ann.id),
            ));
        }
        if let Some(ids) = ann.anchor.token_ids() {
            for id in ids {
                if !token_ids.contains(id.as_str()) {
                    out.push(Violation::new(
                        "anchor_token_ref",
                        "token selector references missing token",
                        json!({"annotation": ann.id, "token": id}),
                    ));
                }
            }
        }
        if let Some(span) = ann.anchor.span() {
            check_span_bounds(&mut out, "anchor_span", &ann.id, span, text_len);
            if let Some(exact) = ann.anchor.exact() {
                if offsets.slice(&doc.canonical_text, span, unit) != Some(exact) {
                    out.push(Violation::new(
                        "anchor_quote",
                        "quote does not equal text sliced by position span",
                        json!({"annotation": ann.id, "exact": exact}),
                    ));
                }
            }
        }
        match ann.kind {
            AnnotationKind::Dependency => {
                check_dependency_body(&mut out, ann, &token_ids);
            }
            AnnotationKind::Chunk => {
                if let Some(body) = ann.body_as::<ChunkBody>() {
                    for id in &body.token_ids {
                        if !token_ids.contains(id.as_str()) {
                            out.push(Violation::new(
                                "chunk_token_ref",
                                "chunk references missing token",
                                json!({"annotation": ann.id, "token": id}),
                            ));
                        }
                    }
                    if !segment_ids.contains(body.segment_id.as_str()) {
                        out.push(Violation::new(
                            "chunk_segment_ref",
                            "chunk references missing segment",
                            json!({"annotation": ann.id, "segment": body.segment_id}),
                        ));
                    }
                } else {
                    out.push(Violation::new(
                        "chunk_body",
                        "chunk body does not parse",
                        json!(ann.id),
                    ));
                }
            }
            AnnotationKind::ChunkHead => {
                if let Some(body) = ann.body_as::<ChunkHeadBody>() {
                    if !chunk_ids.contains(body.chunk_id.as_str()) {
                        out.push(Violation::new(
                            "chunk_head_chunk_ref",
                            "chunk head references missing chunk",
                            json!({"annotation": ann.id, "chunk": body.chunk_id}),
                        ));
                    }
                    if !token_ids.contains(body.head_token_id.as_str()) {
                        out.push(Violation::new(
                            "chunk_head_token_ref",
                            "chunk head references missing token",
                            json!({"annotation": ann.id, "token": body.head_token_id}),
                        ));
                    }
                    if ann.anchor.token_ids().map(<[String]>::len) != Some(1) {
                        out.push(Violation::new(
                            "chunk_head_single_token",
                            "chunk head must anchor exactly one token",
                            json!(ann.id),
                        ));
                    }
                } else {
                    out.push(Violation::new(
                        "chunk_head_body",
                        "chunk head body does not parse",
                        json!(ann.id),
                    ));
                }
            }
            _ => {}
        }
    }

    out
}

fn check_span_bounds(
    out: &mut Vec<Violation>,
    rule: &str,
    id: &str,
    span: crate::span::Span,
    text_len: usize,
) {
    if span.start > span.end || span.end > text_len {
        out.push(Violation::new(
            rule,
            format!(
                "span [{}, {}) out of bounds for text length {text_len}",
                span.start, span.end
            ),
            json!(id),
        ));
    }
}

/// Dependency-kind annotations carry one of two bodies: an observation edge
/// (`dep`/`head`) or an accepted role relation (`predicate_id`/`argument_id`).
fn check_dependency_body(
    out: &mut Vec<Violation>,
    ann: &crate::annotation::Annotation,
    token_ids: &HashSet<&str>,
) {
    if ann.body.get("dep").is_some() {
        if let Some(body) = ann.body_as::<DependencyBody>() {
            if !token_ids.contains(body.dep.as_str()) {
                out.push(Violation::new(
                    "dependency_dep_ref",
                    "dependency references missing dep token",
                    json!({"annotation": ann.id, "token": body.dep}),
                ));
            }
            if let Some(head) = &body.head {
                if !token_ids.contains(head.as_str()) {
                    out.push(Violation::new(
                        "dependency_head_ref",
                        "dependency references missing head token",
                        json!({"annotation": ann.id, "token": head}),
                    ));
                }
            }
            return;
        }
    } else if ann.body.get("predicate_id").is_some() {
        if let Some(body) = ann.body_as::<RelationBody>() {
            for (field, id) in [("predicate", &body.predicate_id), ("argument", &body.argument_id)]
            {
                if !token_ids.contains(id.as_str()) {
                    out.push(Violation::new(
                        "relation_token_ref",
                        format!("relation references missing {field} token"),
                        json!({"annotation": ann.id, "token": id}),
                    ));
                }
            }
            return;
        }
    }
    out.push(Violation::new(
        "dependency_body",
        "dependency body does not parse",
        json!(ann.id),
    ));
}
