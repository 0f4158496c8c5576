//! Stage 11: relation extraction.
//!
//! Derives role relations from the observation dependency edges and the
//! accepted chunk/chunk-head structure. Every token inside a chunk resolves
//! to that chunk's head token, so roles attach to chunk-level predicates
//! rather than raw tokens. Derivation precedence:
//!
//! 1. Direct dependency-label mapping (`nsubj` → actor, `dobj` → theme, …,
//!    modal `aux` → modality).
//! 2. Preposition chains (`prep` + `pobj`) through a fixed surface → role
//!    table; unmapped prepositions drop.
//! 3. Clausal relations between verb-ish predicates (`xcomp`/`ccomp`/
//!    `advcl`/`relcl` → complement_clause, `conj` → coordination).
//!
//! Relations deduplicate on (segment, predicate, argument, role), drop
//! self-loops and cross-segment pairs, and sort deterministically so
//! repeated runs are byte-identical.

use crate::annotation::{
    Anchor, Annotation, AnnotationKind, AnnotationStatus, ChunkBody, ChunkHeadBody,
    DependencyBody, RelationBody, Selector, Source,
};
use crate::document::{Document, Stage, Token};
use crate::error::{Error, Result};
use crate::ident::content_id;
use crate::pipeline::{one_way_door, StageContext};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

/// Registry name of this stage.
pub const STAGE_NAME: &str = "relation-extraction";

/// Direct dependency-label → role table.
static LABEL_ROLES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("nsubj", "actor"),
        ("nsubjpass", "patient"),
        ("dobj", "theme"),
        ("obj", "theme"),
        ("attr", "theme"),
        ("acomp", "theme"),
        ("iobj", "recipient"),
    ]
    .into_iter()
    .collect()
});

/// Preposition surface → role table for prep chains. Unmapped surfaces drop.
static PREP_ROLES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("in", "location"),
        ("on", "location"),
        ("at", "location"),
        ("into", "location"),
        ("inside", "location"),
        ("of", "topic"),
        ("for", "beneficiary"),
        ("with", "instrument"),
        ("by", "agent"),
    ]
    .into_iter()
    .collect()
});

/// Clausal labels mapped to `complement_clause`.
const CLAUSAL_LABELS: &[&str] = &["xcomp", "ccomp", "advcl", "relcl"];

/// Run relation extraction.
pub fn run(doc: &Document, _ctx: &StageContext) -> Result<Document> {
    let existing: Vec<&str> = doc
        .annotations_of(AnnotationKind::Dependency)
        .filter(|a| a.status == AnnotationStatus::Accepted && a.has_source(STAGE_NAME))
        .map(|a| a.id.as_str())
        .collect();
    if !existing.is_empty() {
        return Err(one_way_door(
            STAGE_NAME,
            "document already carries extracted relations",
            json!({"count": existing.len(), "first": existing[0]}),
        ));
    }
    if doc.stage.rank() < Stage::HeadsIdentified.rank() {
        return Err(Error::invariant(
            "relation extraction requires identified chunk heads",
            json!({"stage": STAGE_NAME, "found": doc.stage.as_str()}),
        ));
    }

    let resolver = PredicateResolver::build(doc);
    let segment_index: HashMap<&str, usize> = doc
        .segments
        .iter()
        .map(|s| (s.id.as_str(), s.index))
        .collect();

    // Edges grouped by segment, in document order.
    let edges: Vec<DependencyBody> = doc
        .annotations_of(AnnotationKind::Dependency)
        .filter(|a| a.status == AnnotationStatus::Observation)
        .filter_map(Annotation::body_as)
        .collect();

    let mut seen: HashSet<(String, String, String, String)> = HashSet::new();
    let mut drafts: Vec<RelationDraft> = Vec::new();

    // 1. Direct dependency-label mapping.
    for edge in &edges {
        let head = match &edge.head {
            Some(h) => h,
            None => continue,
        };
        let role = if let Some(role) = LABEL_ROLES.get(edge.label.as_str()) {
            (*role).to_string()
        } else if edge.label == "aux"
            && doc.token_by_id(&edge.dep).and_then(Token::tag) == Some("MD")
        {
            "modality".to_string()
        } else {
            continue;
        };
        push_relation(
            doc,
            &mut seen,
            &mut drafts,
            &edge.segment_id,
            resolver.resolve(head),
            &edge.dep,
            &role,
            json!({
                "pattern": "direct_dependency",
                "dependency_label": edge.label,
                "segment_id": edge.segment_id,
            }),
        );
    }

    // 2. Preposition chains: prep edge (h → p) with a pobj child (p → o).
    for edge in &edges {
        if edge.label != "prep" {
            continue;
        }
        let head = match &edge.head {
            Some(h) => h,
            None => continue,
        };
        let prep_surface = match doc.token_by_id(&edge.dep) {
            Some(t) => t.surface.to_lowercase(),
            None => continue,
        };
        let role = match PREP_ROLES.get(prep_surface.as_str()) {
            Some(r) => (*r).to_string(),
            None => continue,
        };
        for pobj in edges.iter().filter(|e| {
            e.label == "pobj" && e.head.as_deref() == Some(edge.dep.as_str())
        }) {
            push_relation(
                doc,
                &mut seen,
                &mut drafts,
                &edge.segment_id,
                resolver.resolve(head),
                &pobj.dep,
                &role,
                json!({
                    "pattern": "prep_chain",
                    "prep_surface": prep_surface,
                    "segment_id": edge.segment_id,
                }),
            );
        }
    }

    // 3. Clausal relations between verb-ish resolved predicates.
    for edge in &edges {
        let head = match &edge.head {
            Some(h) => h,
            None => continue,
        };
        let role = if CLAUSAL_LABELS.contains(&edge.label.as_str()) {
            "complement_clause"
        } else if edge.label == "conj" {
            "coordination"
        } else {
            continue;
        };
        let predicate = resolver.resolve(head);
        let argument = resolver.resolve(&edge.dep);
        let both_verbish = is_verbish_token(doc, predicate) && is_verbish_token(doc, argument);
        if !both_verbish {
            continue;
        }
        push_relation(
            doc,
            &mut seen,
            &mut drafts,
            &edge.segment_id,
            predicate,
            argument,
            role,
            json!({
                "pattern": "clausal",
                "dependency_label": edge.label,
                "segment_id": edge.segment_id,
            }),
        );
    }

    // Deterministic final order.
    drafts.sort_by(|a, b| {
        let seg_a = segment_index.get(a.segment_id.as_str()).copied().unwrap_or(usize::MAX);
        let seg_b = segment_index.get(b.segment_id.as_str()).copied().unwrap_or(usize::MAX);
        seg_a
            .cmp(&seg_b)
            .then(a.predicate_start.cmp(&b.predicate_start))
            .then(a.argument_start.cmp(&b.argument_start))
            .then(a.role.cmp(&b.role))
            .then(a.id.cmp(&b.id))
    });

    let mut out = doc.clone();
    for draft in drafts {
        out.annotations.push(draft.into_annotation());
    }
    out.stage = Stage::RelationsExtracted;
    Ok(out)
}

fn is_verbish_token(doc: &Document, id: &str) -> bool {
    doc.token_by_id(id).is_some_and(Token::is_verbish)
}

// =============================================================================
// Predicate resolution
// =============================================================================

/// Maps every token inside an accepted chunk to that chunk's head token.
struct PredicateResolver {
    head_for: HashMap<String, String>,
}

impl PredicateResolver {
    fn build(doc: &Document) -> Self {
        let mut head_for: HashMap<String, String> = HashMap::new();
        for ann in doc
            .annotations_of(AnnotationKind::ChunkHead)
            .filter(|a| a.status == AnnotationStatus::Accepted)
        {
            if let Some(body) = ann.body_as::<ChunkHeadBody>() {
                if let Some(chunk) = doc.annotations.iter().find(|c| c.id == body.chunk_id) {
                    if let Some(chunk_body) = chunk.body_as::<ChunkBody>() {
                        for token_id in &chunk_body.token_ids {
                            head_for.insert(token_id.clone(), body.head_token_id.clone());
                        }
                    }
                }
            }
        }
        Self { head_for }
    }

    /// The chunk-head token for `token_id`, or the token itself when it
    /// belongs to no chunk.
    fn resolve<'a>(&'a self, token_id: &'a str) -> &'a str {
        self.head_for.get(token_id).map_or(token_id, String::as_str)
    }
}

// =============================================================================
// Relation drafting
// =============================================================================

struct RelationDraft {
    id: String,
    segment_id: String,
    predicate_id: String,
    argument_id: String,
    predicate_start: usize,
    argument_start: usize,
    argument_span: crate::span::Span,
    argument_surface: String,
    role: String,
    evidence: Value,
}

impl RelationDraft {
    fn into_annotation(self) -> Annotation {
        let body = RelationBody {
            role: self.role.clone(),
            predicate_id: self.predicate_id.clone(),
            argument_id: self.argument_id.clone(),
            segment_id: self.segment_id.clone(),
            evidence: self.evidence.clone(),
        };
        Annotation {
            id: self.id,
            kind: AnnotationKind::Dependency,
            status: AnnotationStatus::Accepted,
            label: Some(self.role),
            anchor: Anchor {
                selectors: vec![
                    Selector::TokenSelector {
                        token_ids: vec![self.predicate_id, self.argument_id],
                    },
                    Selector::TextPositionSelector {
                        span: self.argument_span,
                    },
                    Selector::TextQuoteSelector {
                        exact: self.argument_surface,
                    },
                ],
            },
            sources: vec![Source::with_evidence(
                STAGE_NAME,
                "role_mapping",
                self.evidence,
            )],
            body: serde_json::to_value(&body).unwrap_or_default(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn push_relation(
    doc: &Document,
    seen: &mut HashSet<(String, String, String, String)>,
    drafts: &mut Vec<RelationDraft>,
    segment_id: &str,
    predicate_id: &str,
    argument_id: &str,
    role: &str,
    evidence: Value,
) {
    if predicate_id == argument_id {
        return;
    }
    let predicate = match doc.token_by_id(predicate_id) {
        Some(t) => t,
        None => return,
    };
    let argument = match doc.token_by_id(argument_id) {
        Some(t) => t,
        None => return,
    };
    // Relations never cross segment boundaries.
    if predicate.segment_id != segment_id || argument.segment_id != segment_id {
        return;
    }
    let key = (
        segment_id.to_string(),
        predicate_id.to_string(),
        argument_id.to_string(),
        role.to_string(),
    );
    if !seen.insert(key) {
        return;
    }
    let id = content_id(
        "rel",
        &json!({
            "segment_id": segment_id,
            "predicate": predicate_id,
            "argument": argument_id,
            "role": role,
        }),
    );
    drafts.push(RelationDraft {
        id,
        segment_id: segment_id.to_string(),
        predicate_id: predicate_id.to_string(),
        argument_id: argument_id.to_string(),
        predicate_start: predicate.span.start,
        argument_start: argument.span.start,
        argument_span: argument.span,
        argument_surface: argument.surface.clone(),
        role: role.to_string(),
        evidence,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mwe::{construct, extract, materialize};
    use crate::pipeline::{analyze, chunk, head, segment, tag, tokenize};

    fn pipeline_to_relations(text: &str) -> Document {
        let ctx = StageContext::new();
        let doc = Document::from_text(text);
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = tokenize::run(&doc, &ctx).unwrap();
        let doc = tag::run(&doc, &ctx).unwrap();
        let doc = extract::run(&doc, &ctx).unwrap();
        let doc = construct::run(&doc, &ctx).unwrap();
        let doc = materialize::run(&doc, &ctx).unwrap();
        let doc = analyze::run(&doc, &ctx).unwrap();
        let doc = chunk::run(&doc, &ctx).unwrap();
        let doc = head::run(&doc, &ctx).unwrap();
        run(&doc, &ctx).unwrap()
    }

    fn relations(doc: &Document) -> Vec<(String, String, String)> {
        doc.annotations_of(AnnotationKind::Dependency)
            .filter(|a| a.status == AnnotationStatus::Accepted)
            .filter_map(|a| a.body_as::<RelationBody>())
            .map(|b| {
                let pred = doc.token_by_id(&b.predicate_id).unwrap().surface.clone();
                let arg = doc.token_by_id(&b.argument_id).unwrap().surface.clone();
                (b.role, pred, arg)
            })
            .collect()
    }

    #[test]
    fn test_actor_and_location_roles() {
        let doc = pipeline_to_relations("Alice sees Bob in Berlin.");
        let rels = relations(&doc);
        assert!(rels.contains(&("actor".into(), "sees".into(), "Alice".into())));
        assert!(rels.contains(&("location".into(), "sees".into(), "Berlin".into())));
        assert!(rels.contains(&("theme".into(), "sees".into(), "Bob".into())));
    }

    #[test]
    fn test_modality_role() {
        // The shallow left-neighbour backbone attaches a modal to the word
        // before it, so a modal aux edge is injected the way a richer
        // analyzer would emit it.
        let ctx = StageContext::new();
        let doc = Document::from_text("Alice must go home.");
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = tokenize::run(&doc, &ctx).unwrap();
        let doc = tag::run(&doc, &ctx).unwrap();
        let doc = extract::run(&doc, &ctx).unwrap();
        let doc = construct::run(&doc, &ctx).unwrap();
        let doc = materialize::run(&doc, &ctx).unwrap();
        let mut doc = analyze::run(&doc, &ctx).unwrap();

        let must = doc.tokens.iter().find(|t| t.surface == "must").unwrap().clone();
        let go = doc.tokens.iter().find(|t| t.surface == "go").unwrap().clone();
        let body = DependencyBody {
            label: "aux".into(),
            dep: must.id.clone(),
            head: Some(go.id.clone()),
            segment_id: must.segment_id.clone(),
        };
        doc.annotations.push(Annotation {
            id: content_id("dep", &json!({"aux": must.id, "head": go.id})),
            kind: AnnotationKind::Dependency,
            status: AnnotationStatus::Observation,
            label: Some("aux".into()),
            anchor: Anchor::triple(vec![must.id.clone()], must.span, must.surface.clone()),
            sources: vec![Source::new("linguistic-analysis", "heuristic")],
            body: serde_json::to_value(&body).unwrap(),
        });

        let doc = chunk::run(&doc, &ctx).unwrap();
        let doc = head::run(&doc, &ctx).unwrap();
        let doc = run(&doc, &ctx).unwrap();
        let rels = relations(&doc);
        assert!(rels
            .iter()
            .any(|(role, _, arg)| role == "modality" && arg == "must"));
    }

    #[test]
    fn test_relations_anchor_and_quote_argument() {
        let doc = pipeline_to_relations("Alice sees Bob in Berlin.");
        for ann in doc
            .annotations_of(AnnotationKind::Dependency)
            .filter(|a| a.status == AnnotationStatus::Accepted)
        {
            let token_ids = ann.anchor.token_ids().unwrap();
            assert_eq!(token_ids.len(), 2);
            let span = ann.anchor.span().unwrap();
            assert_eq!(doc.slice(span), ann.anchor.exact());
        }
    }

    #[test]
    fn test_deterministic_order() {
        let a = pipeline_to_relations("Alice sees Bob in Berlin. Bob pays Alice with cash.");
        let b = pipeline_to_relations("Alice sees Bob in Berlin. Bob pays Alice with cash.");
        let ids_a: Vec<&str> = a
            .annotations_of(AnnotationKind::Dependency)
            .filter(|x| x.status == AnnotationStatus::Accepted)
            .map(|x| x.id.as_str())
            .collect();
        let ids_b: Vec<&str> = b
            .annotations_of(AnnotationKind::Dependency)
            .filter(|x| x.status == AnnotationStatus::Accepted)
            .map(|x| x.id.as_str())
            .collect();
        assert_eq!(ids_a, ids_b);
        assert!(!ids_a.is_empty());
    }

    #[test]
    fn test_instrument_role() {
        let doc = pipeline_to_relations("Bob pays Alice with cash.");
        let rels = relations(&doc);
        assert!(rels.iter().any(|(role, _, arg)| role == "instrument" && arg == "cash"));
    }

    #[test]
    fn test_one_way_door() {
        let ctx = StageContext::new();
        let doc = pipeline_to_relations("Alice sees Bob.");
        let err = run(&doc, &ctx).unwrap_err();
        assert!(err.to_string().contains("already carries extracted relations"));
    }

    #[test]
    fn test_requires_heads() {
        let ctx = StageContext::new();
        let doc = Document::from_text("Alice sees Bob.");
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = tokenize::run(&doc, &ctx).unwrap();
        let doc = tag::run(&doc, &ctx).unwrap();
        let err = run(&doc, &ctx).unwrap_err();
        assert!(err.to_string().contains("requires identified chunk heads"));
    }

    #[test]
    fn test_stage_advances() {
        let doc = pipeline_to_relations("Alice sees Bob.");
        assert_eq!(doc.stage, Stage::RelationsExtracted);
    }
}
