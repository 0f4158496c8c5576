//! Stage 10: head identification.
//!
//! Selects one head token per accepted chunk through a layered cascade:
//!
//! 1. Candidate pool by chunk type (NP → nouns, VP → lexical verbs with a
//!    modal fallback, PP → prepositions/`to`, other → every token); empty
//!    pools widen to the full token set.
//! 2. Dependency-root check: a unique token that is the segment root or
//!    attaches outside the chunk wins, when the pool admits it.
//! 3. Positional fallback: rightmost for NP, leftmost otherwise.
//! 4. VP matrix-lexical-preference: a demoted head (auxiliary surface,
//!    modal, or participle heuristic) is replaced by the lexical verb with
//!    the highest incident dependency degree.
//! 5. Final VP lexical override: a still-demoted head yields to the
//!    leftmost non-demoted lexical verb.
//!
//! Every decision is recorded in `head_decision` for auditability.

use crate::annotation::{
    Anchor, Annotation, AnnotationKind, AnnotationStatus, ChunkBody, ChunkHeadBody,
    DependencyBody, HeadDecision, Source,
};
use crate::document::{Document, Stage, Token};
use crate::error::Result;
use crate::ident::content_id;
use crate::pipeline::analyze::is_aux_surface;
use crate::pipeline::{one_way_door, StageContext};
use serde_json::json;
use std::collections::{HashMap, HashSet};

/// Registry name of this stage.
pub const STAGE_NAME: &str = "head-identification";

/// Participle surfaces demoted when they open a nominal run. Tuned to
/// observed false heads; see DESIGN.md before widening.
pub const PARTICIPLE_DEMOTION_SURFACES: &[&str] = &["given", "authenticated", "provided", "granted"];

/// Run head identification.
pub fn run(doc: &Document, _ctx: &StageContext) -> Result<Document> {
    let existing: Vec<&str> = doc
        .annotations_of(AnnotationKind::ChunkHead)
        .map(|a| a.id.as_str())
        .collect();
    if !existing.is_empty() {
        return Err(one_way_door(
            STAGE_NAME,
            "document already carries chunk_head annotations",
            json!({"count": existing.len(), "first": existing[0]}),
        ));
    }

    let deps = DependencyIndex::build(doc);
    let mut out = doc.clone();

    for ann in doc
        .annotations_of(AnnotationKind::Chunk)
        .filter(|a| a.status == AnnotationStatus::Accepted)
    {
        let body: ChunkBody = match ann.body_as() {
            Some(b) => b,
            None => continue,
        };
        let tokens: Vec<&Token> = body
            .token_ids
            .iter()
            .filter_map(|id| doc.token_by_id(id))
            .collect();
        if tokens.is_empty() {
            continue;
        }
        let decision = select_head(&body.chunk_type, &tokens, &body.segment_id, &deps);
        let head = match doc.token_by_id(&decision.chosen) {
            Some(t) => t,
            None => continue,
        };
        let id = content_id(
            "chunk_head",
            &json!({"chunk_id": ann.id, "head_token_id": decision.chosen}),
        );
        let head_body = ChunkHeadBody {
            chunk_id: ann.id.clone(),
            head_token_id: decision.chosen.clone(),
            chunk_type: body.chunk_type.clone(),
            segment_id: body.segment_id.clone(),
            head_decision: decision.clone(),
        };
        out.annotations.push(Annotation {
            id,
            kind: AnnotationKind::ChunkHead,
            status: AnnotationStatus::Accepted,
            label: Some(decision.rule.clone()),
            anchor: Anchor::triple(vec![head.id.clone()], head.span, head.surface.clone()),
            sources: vec![Source::new(STAGE_NAME, "cascade")],
            body: serde_json::to_value(&head_body).unwrap_or_default(),
        });
    }

    out.stage = Stage::HeadsIdentified;
    Ok(out)
}

// =============================================================================
// Dependency index
// =============================================================================

/// Observation dependency edges, indexed for head decisions.
struct DependencyIndex {
    /// dep token id → head token id (None = segment root).
    head_of: HashMap<String, Option<String>>,
    /// segment id → root token id.
    root_of: HashMap<String, String>,
    /// All (dep, head) pairs per segment.
    edges: Vec<(String, Option<String>, String)>,
}

impl DependencyIndex {
    fn build(doc: &Document) -> Self {
        let mut head_of = HashMap::new();
        let mut root_of = HashMap::new();
        let mut edges = Vec::new();
        for ann in doc
            .annotations_of(AnnotationKind::Dependency)
            .filter(|a| a.status == AnnotationStatus::Observation)
        {
            if let Some(body) = ann.body_as::<DependencyBody>() {
                head_of.insert(body.dep.clone(), body.head.clone());
                if body.head.is_none() {
                    root_of.insert(body.segment_id.clone(), body.dep.clone());
                }
                edges.push((body.dep, body.head, body.segment_id));
            }
        }
        Self {
            head_of,
            root_of,
            edges,
        }
    }

    fn is_root(&self, token_id: &str) -> bool {
        matches!(self.head_of.get(token_id), Some(None))
    }

    fn head_of(&self, token_id: &str) -> Option<&str> {
        self.head_of.get(token_id).and_then(|h| h.as_deref())
    }

    /// Incident degree of `token` counting intra-chunk edges and
    /// root-attachment edges.
    fn degree(&self, token: &str, chunk: &HashSet<&str>, segment_id: &str) -> usize {
        let root = self.root_of.get(segment_id).map(String::as_str);
        let mut degree = 0;
        for (dep, head, seg) in &self.edges {
            if seg != segment_id {
                continue;
            }
            if dep == token {
                match head {
                    None => degree += 1,
                    Some(h) if chunk.contains(h.as_str()) || Some(h.as_str()) == root => {
                        degree += 1;
                    }
                    Some(_) => {}
                }
            }
            if head.as_deref() == Some(token) && chunk.contains(dep.as_str()) {
                degree += 1;
            }
        }
        degree
    }
}

// =============================================================================
// Cascade
// =============================================================================

fn select_head(
    chunk_type: &str,
    tokens: &[&Token],
    segment_id: &str,
    deps: &DependencyIndex,
) -> HeadDecision {
    // Step 1: candidate pool by chunk type.
    let pool: Vec<&Token> = match chunk_type {
        "NP" => tokens.iter().copied().filter(|t| t.is_nounish()).collect(),
        "VP" => {
            let lexical: Vec<&Token> = tokens
                .iter()
                .copied()
                .filter(|t| t.tag().is_some_and(|tag| tag.starts_with("VB")))
                .collect();
            if lexical.is_empty() {
                tokens
                    .iter()
                    .copied()
                    .filter(|t| t.tag() == Some("MD"))
                    .collect()
            } else {
                lexical
            }
        }
        "PP" => tokens
            .iter()
            .copied()
            .filter(|t| matches!(t.tag(), Some("IN" | "TO")))
            .collect(),
        _ => tokens.to_vec(),
    };
    let (pool, allow_any) = if pool.is_empty() {
        (tokens.to_vec(), true)
    } else {
        (pool, false)
    };
    let candidates: Vec<String> = pool.iter().map(|t| t.id.clone()).collect();
    let chunk_ids: HashSet<&str> = tokens.iter().map(|t| t.id.as_str()).collect();

    // Step 2: dependency-root check.
    let outside: Vec<&Token> = tokens
        .iter()
        .copied()
        .filter(|t| {
            deps.is_root(&t.id)
                || deps
                    .head_of(&t.id)
                    .is_some_and(|h| !chunk_ids.contains(h))
        })
        .collect();
    let mut chosen: Option<(String, String, Option<String>)> = None;
    if outside.len() == 1 {
        let candidate = outside[0];
        if allow_any || pool.iter().any(|t| t.id == candidate.id) {
            chosen = Some((candidate.id.clone(), "dependency_root".into(), None));
        }
    }

    // Step 3: positional fallback.
    let mut decision = chosen.unwrap_or_else(|| {
        let rule = if allow_any {
            "allow_any_fallback"
        } else {
            "positional_fallback"
        };
        if chunk_type == "NP" {
            let rightmost = pool[pool.len() - 1];
            (rightmost.id.clone(), rule.into(), Some("rightmost".into()))
        } else {
            let leftmost = pool[0];
            (leftmost.id.clone(), rule.into(), Some("leftmost".into()))
        }
    });

    if chunk_type == "VP" {
        // Step 4: matrix lexical preference over dependency degree.
        if is_demoted_by_id(&decision.0, tokens) {
            let lexical: Vec<&Token> = tokens
                .iter()
                .copied()
                .filter(|t| t.tag().is_some_and(|tag| tag.starts_with("VB")))
                .filter(|t| !is_demoted(t, tokens))
                .collect();
            if !lexical.is_empty() {
                let mut scored: Vec<(usize, &Token)> = lexical
                    .iter()
                    .map(|t| (deps.degree(&t.id, &chunk_ids, segment_id), *t))
                    .collect();
                let best = scored.iter().map(|(d, _)| *d).max().unwrap_or(0);
                scored.retain(|(d, _)| *d == best);
                scored.sort_by(|(_, a), (_, b)| a.i.cmp(&b.i).then(a.id.cmp(&b.id)));
                let tie = (scored.len() > 1).then(|| "leftmost_then_id".to_string());
                decision = (
                    scored[0].1.id.clone(),
                    "matrix_lexical_preference".into(),
                    tie,
                );
            }
        }
        // Step 5: final lexical override, independent of step 4.
        if is_demoted_by_id(&decision.0, tokens) {
            if let Some(lexical) = tokens
                .iter()
                .copied()
                .find(|t| {
                    t.tag().is_some_and(|tag| tag.starts_with("VB")) && !is_demoted(t, tokens)
                })
            {
                decision = (lexical.id.clone(), "vp_lexical_override".into(), None);
            }
        }
    }

    HeadDecision {
        candidates,
        chosen: decision.0,
        rule: decision.1,
        tie_break: decision.2,
    }
}

fn is_demoted_by_id(id: &str, tokens: &[&Token]) -> bool {
    tokens
        .iter()
        .find(|t| t.id == id)
        .is_some_and(|t| is_demoted(t, tokens))
}

/// Demoted verb-ish tokens: auxiliary surfaces, modals, and the participle
/// heuristic (`given` opening a nominal run, or a determiner-preceded past
/// participle).
fn is_demoted(token: &Token, chunk_tokens: &[&Token]) -> bool {
    if is_aux_surface(token) || token.tag() == Some("MD") {
        return true;
    }
    let pos = match chunk_tokens.iter().position(|t| t.id == token.id) {
        Some(p) => p,
        None => return false,
    };
    let lower = token.surface.to_lowercase();
    if PARTICIPLE_DEMOTION_SURFACES.contains(&lower.as_str()) {
        let next_nominal = chunk_tokens.get(pos + 1).is_some_and(|next| {
            next.is_nounish()
                || next.tag() == Some("DT")
                || next.tag().is_some_and(|t| t.starts_with("JJ"))
        });
        if next_nominal {
            return true;
        }
    }
    if token.tag() == Some("VBN") && pos > 0 && chunk_tokens[pos - 1].tag() == Some("DT") {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mwe::{construct, extract, materialize};
    use crate::pipeline::{analyze, chunk, segment, tag, tokenize};

    fn pipeline_to_heads(text: &str) -> Document {
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
        run(&doc, &StageContext::new()).unwrap()
    }

    fn heads(doc: &Document) -> Vec<(String, String, String)> {
        doc.annotations_of(AnnotationKind::ChunkHead)
            .filter_map(|a| a.body_as::<ChunkHeadBody>())
            .map(|b| {
                let surface = doc
                    .token_by_id(&b.head_token_id)
                    .map(|t| t.surface.clone())
                    .unwrap_or_default();
                (b.chunk_type, surface, b.head_decision.rule)
            })
            .collect()
    }

    #[test]
    fn test_one_head_per_accepted_chunk() {
        let doc = pipeline_to_heads("Alice sees Bob in Berlin.");
        let chunk_count = doc
            .annotations_of(AnnotationKind::Chunk)
            .filter(|a| a.status == AnnotationStatus::Accepted)
            .count();
        let head_count = doc.annotations_of(AnnotationKind::ChunkHead).count();
        assert_eq!(chunk_count, head_count);
        for head in doc.annotations_of(AnnotationKind::ChunkHead) {
            assert_eq!(head.anchor.token_ids().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_vp_head_is_lexical_verb() {
        let doc = pipeline_to_heads("Alice sees Bob in Berlin.");
        let all = heads(&doc);
        assert!(all
            .iter()
            .any(|(t, s, _)| t == "VP" && s == "sees"));
    }

    #[test]
    fn test_np_head_positional_rightmost() {
        let doc = pipeline_to_heads("The old engine failed today.");
        let all = heads(&doc);
        let np = all.iter().find(|(t, _, _)| t == "NP").unwrap();
        assert_eq!(np.1, "engine");
    }

    #[test]
    fn test_pp_head_is_preposition() {
        let doc = pipeline_to_heads("Alice sees Bob in Berlin.");
        let all = heads(&doc);
        let pp = all.iter().find(|(t, _, _)| t == "PP").unwrap();
        assert_eq!(pp.1, "in");
    }

    #[test]
    fn test_dependency_root_rule_fires() {
        // The VP "sees Bob": "sees" is the segment root, the only token
        // attaching outside the chunk.
        let doc = pipeline_to_heads("Alice sees Bob in Berlin.");
        let all = heads(&doc);
        let vp = all.iter().find(|(t, _, _)| t == "VP").unwrap();
        assert_eq!(vp.2, "dependency_root");
    }

    #[test]
    fn test_decision_audit_recorded() {
        let doc = pipeline_to_heads("Alice sees Bob.");
        for head in doc.annotations_of(AnnotationKind::ChunkHead) {
            let body: ChunkHeadBody = head.body_as().unwrap();
            assert!(!body.head_decision.candidates.is_empty());
            assert_eq!(body.head_decision.chosen, body.head_token_id);
            assert!(!body.head_decision.rule.is_empty());
        }
    }

    #[test]
    fn test_one_way_door() {
        let doc = pipeline_to_heads("Alice sees Bob.");
        let err = run(&doc, &StageContext::new()).unwrap_err();
        assert!(err.to_string().contains("already carries chunk_head"));
    }

    #[test]
    fn test_demotion_aux_surface() {
        let doc = pipeline_to_heads("Alice is seeing Bob.");
        // VP "is seeing Bob": positional leftmost is "is" (aux), demoted in
        // favour of the lexical participle "seeing".
        let all = heads(&doc);
        let vp = all.iter().find(|(t, _, _)| t == "VP").unwrap();
        assert_eq!(vp.1, "seeing");
    }
}
