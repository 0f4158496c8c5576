//! Stage 08: linguistic analysis.
//!
//! Produces observation-status annotations that later stages refine:
//! a head-left dependency backbone, lemmas, noun-phrase and named-entity
//! runs, and a handful of scope observations (negation, modality,
//! quantifiers, copular frames, comparatives). The heuristics are
//! intentionally shallow: raw material for chunking and relation
//! extraction, not a parse.
//!
//! Backbone shape: the root is the first verb-tagged token (else token 0);
//! every other token attaches to its left neighbour, except the segment's
//! first token, which attaches to the root. Edge labels come from a fixed
//! POS-pair table.

use crate::annotation::{
    Anchor, Annotation, AnnotationKind, AnnotationStatus, DependencyBody, Source,
};
use crate::document::{CoarsePos, Document, Stage, Token};
use crate::error::Result;
use crate::ident::content_id;
use crate::pipeline::{one_way_door, StageContext};
use crate::span::Span;
use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::HashSet;

/// Registry name of this stage.
pub const STAGE_NAME: &str = "linguistic-analysis";

/// Auxiliary verb surfaces (forms of be/have/do).
pub static AUX_SURFACES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "am", "is", "are", "was", "were", "be", "been", "being", "has", "have", "had", "do",
        "does", "did",
    ]
    .into_iter()
    .collect()
});

/// Copula surfaces (forms of be).
static BE_SURFACES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["am", "is", "are", "was", "were", "be", "been", "being"]
        .into_iter()
        .collect()
});

/// Negators that open a negation scope.
const NEGATORS: &[&str] = &["not", "n't", "never", "no"];

/// Quantifiers that open a quantifier scope.
const QUANTIFIERS: &[&str] = &["every", "some", "no", "all", "each"];

/// Run linguistic analysis.
pub fn run(doc: &Document, _ctx: &StageContext) -> Result<Document> {
    let produced: Vec<&str> = doc
        .annotations
        .iter()
        .filter(|a| {
            matches!(
                a.kind,
                AnnotationKind::Dependency
                    | AnnotationKind::Lemma
                    | AnnotationKind::NounPhrase
                    | AnnotationKind::NamedEntity
            )
        })
        .map(|a| a.id.as_str())
        .collect();
    if !produced.is_empty() {
        return Err(one_way_door(
            STAGE_NAME,
            "document already carries analysis annotations",
            json!({"count": produced.len(), "first": produced[0]}),
        ));
    }

    let mut out = doc.clone();
    for segment in &doc.segments {
        let tokens = doc.segment_tokens(segment);
        if tokens.is_empty() {
            continue;
        }
        emit_dependencies(segment.id.as_str(), tokens, &mut out.annotations);
        emit_lemmas(tokens, &mut out.annotations);
        emit_runs(doc, segment.id.as_str(), tokens, &mut out.annotations);
        emit_scopes(doc, segment.id.as_str(), tokens, &mut out.annotations);
    }
    out.stage = Stage::Analyzed;
    Ok(out)
}

fn observation(
    id: String,
    kind: AnnotationKind,
    label: Option<String>,
    anchor: Anchor,
    body: serde_json::Value,
) -> Annotation {
    Annotation {
        id,
        kind,
        status: AnnotationStatus::Observation,
        label,
        anchor,
        sources: vec![Source::new(STAGE_NAME, "heuristic")],
        body,
    }
}

// =============================================================================
// Dependency backbone
// =============================================================================

/// Label table keyed on (dependent, head) POS shapes, first match wins.
fn dep_label(dep: &Token, head: &Token) -> &'static str {
    let dep_tag = dep.tag().unwrap_or_default();
    if dep.is_punct || dep.coarse() == Some(CoarsePos::Punct) {
        return "punct";
    }
    if (dep_tag == "MD" || is_aux_surface(dep)) && head.is_verbish() {
        return "aux";
    }
    if dep_tag == "DT" {
        return "det";
    }
    if dep_tag.starts_with("JJ") && head.is_nounish() {
        return "amod";
    }
    if dep_tag.starts_with("RB") {
        return "advmod";
    }
    if dep_tag == "IN" || dep_tag == "TO" {
        return "prep";
    }
    if dep.is_nounish() {
        let head_tag = head.tag().unwrap_or_default();
        if head_tag == "IN" || head_tag == "TO" {
            return "pobj";
        }
        if head.is_verbish() {
            return if dep.i < head.i { "nsubj" } else { "dobj" };
        }
        if head.is_nounish() {
            return "compound";
        }
    }
    if dep.is_verbish() {
        let head_tag = head.tag().unwrap_or_default();
        if head.is_verbish() || head_tag == "TO" {
            return "xcomp";
        }
        if head_tag == "CC" {
            return "conj";
        }
    }
    "dep"
}

/// True for surface forms of be/have/do.
pub fn is_aux_surface(token: &Token) -> bool {
    AUX_SURFACES.contains(token.surface.to_lowercase().as_str())
}

fn emit_dependencies(segment_id: &str, tokens: &[Token], out: &mut Vec<Annotation>) {
    let root = tokens
        .iter()
        .find(|t| t.tag().is_some_and(|tag| tag.starts_with("VB")))
        .unwrap_or(&tokens[0]);

    for (pos, token) in tokens.iter().enumerate() {
        let (head, label) = if token.id == root.id {
            (None, "root")
        } else if pos == 0 {
            (Some(root), dep_label(token, root))
        } else {
            let left = &tokens[pos - 1];
            (Some(left), dep_label(token, left))
        };
        let body = DependencyBody {
            label: label.to_string(),
            dep: token.id.clone(),
            head: head.map(|h| h.id.clone()),
            segment_id: segment_id.to_string(),
        };
        let id = content_id(
            "dep",
            &json!({
                "segment_id": segment_id,
                "dep": body.dep,
                "head": body.head,
                "label": body.label,
            }),
        );
        out.push(observation(
            id,
            AnnotationKind::Dependency,
            Some(label.to_string()),
            Anchor::triple(vec![token.id.clone()], token.span, token.surface.clone()),
            serde_json::to_value(&body).unwrap_or_default(),
        ));
    }
}

// =============================================================================
// Lemmas
// =============================================================================

/// Shallow lemma: lowercased surface minus simple inflection.
#[must_use]
pub fn lemma_of(surface: &str) -> String {
    let lower = surface.to_lowercase();
    if lower.len() > 4 && lower.ends_with("ies") {
        return format!("{}y", &lower[..lower.len() - 3]);
    }
    if lower.len() > 4 && lower.ends_with("ied") {
        return format!("{}y", &lower[..lower.len() - 3]);
    }
    if lower.len() > 5 && lower.ends_with("ing") {
        return lower[..lower.len() - 3].to_string();
    }
    if lower.len() > 4 && lower.ends_with("ed") {
        return lower[..lower.len() - 2].to_string();
    }
    for suffix in ["shes", "ches", "sses", "xes", "zes"] {
        if lower.len() > suffix.len() + 1 && lower.ends_with(suffix) {
            return lower[..lower.len() - 2].to_string();
        }
    }
    if lower.len() > 3 && lower.ends_with('s') && !lower.ends_with("ss") && !lower.ends_with("us")
    {
        return lower[..lower.len() - 1].to_string();
    }
    lower
}

fn emit_lemmas(tokens: &[Token], out: &mut Vec<Annotation>) {
    for token in tokens {
        if token.is_punct || !token.surface.chars().any(char::is_alphabetic) {
            continue;
        }
        let lemma = lemma_of(&token.surface);
        let id = content_id("lemma", &json!({"token_id": token.id, "lemma": lemma}));
        out.push(observation(
            id,
            AnnotationKind::Lemma,
            Some(lemma.clone()),
            Anchor::triple(vec![token.id.clone()], token.span, token.surface.clone()),
            json!({"token_id": token.id, "lemma": lemma}),
        ));
    }
}

// =============================================================================
// Noun-phrase and named-entity runs
// =============================================================================

fn run_annotation(
    doc: &Document,
    namespace: &str,
    kind: AnnotationKind,
    segment_id: &str,
    tokens: &[&Token],
) -> Annotation {
    let token_ids: Vec<String> = tokens.iter().map(|t| t.id.clone()).collect();
    let span = Span::new(tokens[0].span.start, tokens[tokens.len() - 1].span.end);
    let exact = doc.slice(span).unwrap_or_default().to_string();
    let id = content_id(
        namespace,
        &json!({"segment_id": segment_id, "token_ids": token_ids}),
    );
    observation(
        id,
        kind,
        None,
        Anchor::triple(token_ids.clone(), span, exact),
        json!({"segment_id": segment_id, "token_ids": token_ids}),
    )
}

fn emit_runs(doc: &Document, segment_id: &str, tokens: &[Token], out: &mut Vec<Annotation>) {
    // Maximal determiner/adjective/noun runs containing at least one noun.
    let np_member = |t: &Token| {
        matches!(
            t.coarse(),
            Some(CoarsePos::Det | CoarsePos::Adj | CoarsePos::Noun | CoarsePos::ProperNoun)
        )
    };
    collect_runs(tokens, np_member, |run| run.iter().any(|t| t.is_nounish()))
        .into_iter()
        .for_each(|run| {
            out.push(run_annotation(
                doc,
                "np",
                AnnotationKind::NounPhrase,
                segment_id,
                &run,
            ));
        });

    // Maximal proper-noun runs.
    let ne_member = |t: &Token| t.coarse() == Some(CoarsePos::ProperNoun);
    collect_runs(tokens, ne_member, |_| true).into_iter().for_each(|run| {
        out.push(run_annotation(
            doc,
            "ne",
            AnnotationKind::NamedEntity,
            segment_id,
            &run,
        ));
    });
}

fn collect_runs<'a>(
    tokens: &'a [Token],
    member: impl Fn(&Token) -> bool,
    keep: impl Fn(&[&'a Token]) -> bool,
) -> Vec<Vec<&'a Token>> {
    let mut runs = Vec::new();
    let mut current: Vec<&Token> = Vec::new();
    for token in tokens {
        if member(token) {
            current.push(token);
        } else if !current.is_empty() {
            if keep(&current) {
                runs.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if !current.is_empty() && keep(&current) {
        runs.push(current);
    }
    runs
}

// =============================================================================
// Scope observations
// =============================================================================

fn emit_scopes(doc: &Document, segment_id: &str, tokens: &[Token], out: &mut Vec<Annotation>) {
    let last_content = tokens.iter().rposition(|t| !t.is_punct);

    for (pos, token) in tokens.iter().enumerate() {
        let lower = token.surface.to_lowercase();

        // Negation: negator up to the end of the segment.
        if NEGATORS.contains(&lower.as_str()) {
            if let Some(end) = last_content {
                if end >= pos {
                    let scope: Vec<&Token> = tokens[pos..=end].iter().collect();
                    let mut ann = run_annotation(
                        doc,
                        "neg",
                        AnnotationKind::NegationScope,
                        segment_id,
                        &scope,
                    );
                    ann.body["trigger"] = json!(token.id);
                    out.push(ann);
                }
            }
        }

        // Modality: modal up to and including the next verb.
        if token.tag() == Some("MD") {
            let end = tokens[pos + 1..]
                .iter()
                .position(|t| t.tag().is_some_and(|tag| tag.starts_with("VB")))
                .map_or(last_content.unwrap_or(pos), |off| pos + 1 + off);
            if end >= pos {
                let scope: Vec<&Token> = tokens[pos..=end].iter().collect();
                let mut ann = run_annotation(
                    doc,
                    "modal",
                    AnnotationKind::ModalityScope,
                    segment_id,
                    &scope,
                );
                ann.body["modal"] = json!(token.id);
                out.push(ann);
            }
        }

        // Quantifier: quantifier plus its following nominal run.
        if QUANTIFIERS.contains(&lower.as_str()) && token.coarse() == Some(CoarsePos::Det) {
            let mut end = pos;
            while end + 1 < tokens.len()
                && matches!(
                    tokens[end + 1].coarse(),
                    Some(CoarsePos::Adj | CoarsePos::Noun | CoarsePos::ProperNoun)
                )
            {
                end += 1;
            }
            if end > pos {
                let scope: Vec<&Token> = tokens[pos..=end].iter().collect();
                let mut ann = run_annotation(
                    doc,
                    "quant",
                    AnnotationKind::QuantifierScope,
                    segment_id,
                    &scope,
                );
                ann.body["quantifier"] = json!(token.id);
                out.push(ann);
            }
        }

        // Comparative: JJR/RBR … than.
        if matches!(token.tag(), Some("JJR" | "RBR")) {
            if let Some(than) = tokens[pos + 1..]
                .iter()
                .find(|t| t.surface.to_lowercase() == "than")
            {
                let span = Span::new(token.span.start, than.span.end);
                let exact = doc.slice(span).unwrap_or_default().to_string();
                let id = content_id(
                    "cmp",
                    &json!({"segment_id": segment_id, "comparative": token.id, "than": than.id}),
                );
                out.push(observation(
                    id,
                    AnnotationKind::Comparative,
                    None,
                    Anchor::triple(vec![token.id.clone(), than.id.clone()], span, exact),
                    json!({
                        "segment_id": segment_id,
                        "comparative": token.id,
                        "than": than.id,
                    }),
                ));
            }
        }

        // Copular frame: nominal subject + be + nominal/adjectival predicate.
        if BE_SURFACES.contains(&lower.as_str()) && pos > 0 {
            let subject = &tokens[pos - 1];
            if !subject.is_nounish() {
                continue;
            }
            let mut pred_end = pos;
            while pred_end + 1 < tokens.len()
                && matches!(
                    tokens[pred_end + 1].coarse(),
                    Some(
                        CoarsePos::Det
                            | CoarsePos::Adj
                            | CoarsePos::Noun
                            | CoarsePos::ProperNoun
                    )
                )
            {
                pred_end += 1;
            }
            if pred_end > pos {
                let predicate_ids: Vec<String> =
                    tokens[pos + 1..=pred_end].iter().map(|t| t.id.clone()).collect();
                let span = Span::new(subject.span.start, tokens[pred_end].span.end);
                let exact = doc.slice(span).unwrap_or_default().to_string();
                let all_ids: Vec<String> = std::iter::once(subject.id.clone())
                    .chain(std::iter::once(token.id.clone()))
                    .chain(predicate_ids.iter().cloned())
                    .collect();
                let id = content_id(
                    "cop",
                    &json!({"segment_id": segment_id, "copula": token.id, "subject": subject.id}),
                );
                out.push(observation(
                    id,
                    AnnotationKind::CopulaFrame,
                    None,
                    Anchor::triple(all_ids, span, exact),
                    json!({
                        "segment_id": segment_id,
                        "subject_ids": [subject.id],
                        "copula_id": token.id,
                        "predicate_ids": predicate_ids,
                    }),
                ));
            }
        }
    }
}
