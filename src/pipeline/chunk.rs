//! Stage 09: chunking.
//!
//! Segments each sentence into NP/VP/PP/O chunks with a greedy POS-FSM over
//! atomic units. An accepted, NP-internal, nominal-pattern MWE collapses
//! into a single noun unit; every other token is a one-token unit.
//! Punctuation and coordinators flush the in-progress run and emit as
//! standalone `O` chunks, so coordinated phrases chunk independently and
//! the relation stage recombines them through coordination edges.
//!
//! At each position three matchers are tried and the longest match wins;
//! ties break VP > PP > NP. A VP may absorb one trailing PP, but never one
//! headed by a deny-listed marker (`for`, `at`, `in`, `than`); those stay
//! unattached, recorded as `pp_attachment` observations for later stages.

use crate::annotation::{Anchor, Annotation, AnnotationKind, AnnotationStatus, ChunkBody, Source};
use crate::document::{CoarsePos, Document, Segment, Stage, Token};
use crate::error::{Error, Result};
use crate::ident::content_id;
use crate::pipeline::analyze::is_aux_surface;
use crate::pipeline::mwe::patterns::NOMINAL_PATTERNS;
use crate::pipeline::{one_way_door, StageContext};
use crate::span::Span;
use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::{HashMap, HashSet};

/// Registry name of this stage.
pub const STAGE_NAME: &str = "chunking";

/// PP markers a VP never absorbs. Tuned lists; see the pp-attachment notes
/// in DESIGN.md before widening.
pub const VP_PP_ABSORB_DENY: &[&str] = &["for", "at", "in", "than"];

/// Preposition surface → semantic PP kind. Unlisted prepositions are
/// `generic`.
pub static PP_KIND: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for (prep, kind) in [
        ("of", "genitive"),
        ("by", "agentive"),
        ("with", "instrumental"),
        ("without", "privative"),
        ("for", "beneficiary"),
        ("from", "source"),
        ("to", "goal"),
        ("in", "locative"),
        ("on", "locative"),
        ("at", "locative"),
        ("into", "locative"),
        ("inside", "locative"),
        ("onto", "locative"),
        ("upon", "locative"),
        ("within", "locative"),
        ("near", "locative"),
        ("under", "locative"),
        ("over", "locative"),
        ("above", "locative"),
        ("below", "locative"),
        ("between", "locative"),
        ("behind", "locative"),
        ("beside", "locative"),
        ("beyond", "locative"),
        ("across", "locative"),
        ("along", "locative"),
        ("around", "locative"),
        ("through", "path"),
        ("via", "path"),
        ("toward", "directional"),
        ("towards", "directional"),
        ("outside", "locative"),
        ("during", "temporal"),
        ("before", "temporal"),
        ("after", "temporal"),
        ("until", "temporal"),
        ("since", "temporal"),
        ("about", "topic"),
        ("regarding", "topic"),
        ("concerning", "topic"),
        ("against", "opposition"),
        ("despite", "concessive"),
        ("per", "distributive"),
        ("as", "role"),
        ("like", "comparative"),
        ("than", "comparative"),
        ("except", "exceptive"),
    ] {
        m.insert(prep, kind);
    }
    m
});

/// Run chunking.
pub fn run(doc: &Document, _ctx: &StageContext) -> Result<Document> {
    let existing: Vec<&str> = doc
        .annotations_of(AnnotationKind::Chunk)
        .map(|a| a.id.as_str())
        .collect();
    if !existing.is_empty() {
        return Err(one_way_door(
            STAGE_NAME,
            "document already carries chunk annotations",
            json!({"count": existing.len(), "first": existing[0]}),
        ));
    }
    if doc.stage.rank() < Stage::Analyzed.rank() {
        return Err(Error::invariant(
            "chunking requires linguistic analysis",
            json!({"stage": STAGE_NAME, "found": doc.stage.as_str()}),
        ));
    }

    let mut out = doc.clone();
    for segment in &doc.segments {
        let tokens = doc.segment_tokens(segment);
        if tokens.is_empty() {
            continue;
        }
        let units = build_units(doc, segment, tokens);
        chunk_segment(doc, segment, &units, &mut out.annotations);
    }
    out.stage = Stage::Chunked;
    Ok(out)
}

// =============================================================================
// Atomic units
// =============================================================================

/// One atomic unit: a single token, or an accepted MWE collapsed to a noun.
#[derive(Debug)]
struct Unit<'a> {
    tokens: Vec<&'a Token>,
    atomic_mwe: bool,
}

/// Binary classification axes the matchers run on.
#[derive(Debug, Clone)]
struct RunUnit {
    det: bool,
    adj: bool,
    participle: bool,
    noun: bool,
    aux: bool,
    lex_verb: bool,
    prep: bool,
    inf_to: bool,
    coord: bool,
    punct: bool,
    surface_lower: String,
}

/// Classify a unit along the matcher axes.
fn as_run_unit(unit: &Unit) -> RunUnit {
    if unit.atomic_mwe {
        return RunUnit {
            det: false,
            adj: false,
            participle: false,
            noun: true,
            aux: false,
            lex_verb: false,
            prep: false,
            inf_to: false,
            coord: false,
            punct: false,
            surface_lower: unit.tokens.last().map_or_else(String::new, |t| {
                t.surface.to_lowercase()
            }),
        };
    }
    let token = unit.tokens[0];
    let tag = token.tag().unwrap_or_default();
    let lower = token.surface.to_lowercase();
    let verb = tag.starts_with("VB");
    let aux = tag == "MD" || (verb && is_aux_surface(token));
    RunUnit {
        det: tag == "DT",
        adj: tag.starts_with("JJ"),
        participle: tag == "VBN" || tag == "VBG",
        noun: token.is_nounish(),
        aux,
        lex_verb: verb && !aux,
        prep: tag == "IN",
        inf_to: tag == "TO",
        coord: tag == "CC" || lower == "and" || lower == "or",
        punct: token.is_punct || token.coarse() == Some(CoarsePos::Punct),
        surface_lower: lower,
    }
}

/// Collapse accepted, NP-internal, nominal-pattern MWEs into atomic units.
fn build_units<'a>(doc: &'a Document, segment: &Segment, tokens: &'a [Token]) -> Vec<Unit<'a>> {
    let np_sets: Vec<HashSet<&str>> = doc
        .annotations_of(AnnotationKind::NounPhrase)
        .filter(|a| a.body["segment_id"].as_str() == Some(segment.id.as_str()))
        .filter_map(|a| a.anchor.token_ids())
        .map(|ids| ids.iter().map(String::as_str).collect())
        .collect();

    let mut mwe_starts: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut claimed: HashSet<&str> = HashSet::new();
    for ann in doc
        .annotations_of(AnnotationKind::Mwe)
        .filter(|a| a.status == AnnotationStatus::Accepted)
        .filter(|a| a.body["segment_id"].as_str() == Some(segment.id.as_str()))
    {
        let nominal = ann.body["patterns"]
            .as_array()
            .is_some_and(|ps| {
                ps.iter()
                    .filter_map(|p| p.as_str())
                    .any(|p| NOMINAL_PATTERNS.contains(&p))
            });
        if !nominal {
            continue;
        }
        let ids = match ann.anchor.token_ids() {
            Some(ids) => ids,
            None => continue,
        };
        let id_set: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let np_internal = np_sets.iter().any(|np| id_set.is_subset(np));
        if !np_internal {
            continue;
        }
        if ids.iter().any(|id| claimed.contains(id.as_str())) {
            continue;
        }
        for id in ids {
            claimed.insert(id.as_str());
        }
        mwe_starts.insert(ids[0].as_str(), ids.iter().map(String::as_str).collect());
    }

    let mut units = Vec::new();
    let mut pos = 0;
    while pos < tokens.len() {
        let token = &tokens[pos];
        if let Some(ids) = mwe_starts.get(token.id.as_str()) {
            let members: Vec<&Token> = ids
                .iter()
                .filter_map(|id| tokens.iter().find(|t| t.id == *id))
                .collect();
            let len = members.len();
            units.push(Unit {
                tokens: members,
                atomic_mwe: true,
            });
            pos += len;
            continue;
        }
        units.push(Unit {
            tokens: vec![token],
            atomic_mwe: false,
        });
        pos += 1;
    }
    units
}

// =============================================================================
// Matchers
// =============================================================================

/// NP: optional determiner, adjective/participle modifiers, one or more
/// noun units. Returns units consumed (0 = no match).
fn np_match(units: &[RunUnit], pos: usize) -> usize {
    let mut i = pos;
    if i < units.len() && units[i].det {
        i += 1;
    }
    while i < units.len() && (units[i].adj || units[i].participle) && !units[i].noun {
        i += 1;
    }
    let noun_start = i;
    while i < units.len() && units[i].noun {
        i += 1;
    }
    if i > noun_start {
        i - pos
    } else {
        0
    }
}

/// PP: a preposition or infinitival `to` followed by a matched NP.
fn pp_match(units: &[RunUnit], pos: usize) -> usize {
    if pos >= units.len() || !(units[pos].prep || units[pos].inf_to) {
        return 0;
    }
    let np = np_match(units, pos + 1);
    if np > 0 {
        1 + np
    } else {
        0
    }
}

/// A PP the VP matcher refused to absorb.
struct RefusedPp {
    start: usize,
    len: usize,
    surface: String,
}

/// VP: auxiliaries then lexical verbs, optional NP object, optional
/// infinitival continuation, optional trailing PP subject to the
/// absorption deny-list.
fn vp_match(units: &[RunUnit], pos: usize) -> (usize, Option<RefusedPp>) {
    let mut i = pos;
    while i < units.len() && units[i].aux {
        i += 1;
    }
    let verb_start = i;
    while i < units.len() && units[i].lex_verb {
        i += 1;
    }
    if i == verb_start {
        return (0, None);
    }
    i += np_match(units, i);
    // Infinitival continuation: to + verb complex + optional NP.
    if i < units.len() && units[i].inf_to {
        let mut j = i + 1;
        while j < units.len() && units[j].aux {
            j += 1;
        }
        let inner_start = j;
        while j < units.len() && units[j].lex_verb {
            j += 1;
        }
        if j > inner_start {
            i = j;
            i += np_match(units, i);
        }
    }
    // Trailing PP: absorbed only when headed by a non-denied preposition.
    let mut refused = None;
    if i < units.len() && (units[i].prep || units[i].inf_to) {
        let pp = pp_match(units, i);
        if pp > 0 {
            let absorbable =
                units[i].prep && !VP_PP_ABSORB_DENY.contains(&units[i].surface_lower.as_str());
            if absorbable {
                i += pp;
            } else if units[i].prep {
                refused = Some(RefusedPp {
                    start: i,
                    len: pp,
                    surface: units[i].surface_lower.clone(),
                });
            }
        }
    }
    (i - pos, refused)
}

// =============================================================================
// Segment chunking
// =============================================================================

fn chunk_segment(
    doc: &Document,
    segment: &Segment,
    units: &[Unit<'_>],
    annotations: &mut Vec<Annotation>,
) {
    let run_units: Vec<RunUnit> = units.iter().map(as_run_unit).collect();
    let mut run: Vec<usize> = Vec::new();
    for (idx, ru) in run_units.iter().enumerate() {
        if ru.punct || ru.coord {
            flush_run(doc, segment, units, &run_units, &run, annotations);
            run.clear();
            emit_chunk(doc, segment, units, &[idx], "O", None, annotations);
        } else {
            run.push(idx);
        }
    }
    flush_run(doc, segment, units, &run_units, &run, annotations);
}

fn flush_run(
    doc: &Document,
    segment: &Segment,
    units: &[Unit<'_>],
    run_units: &[RunUnit],
    run: &[usize],
    annotations: &mut Vec<Annotation>,
) {
    if run.is_empty() {
        return;
    }
    // Matchers operate on the run's own unit sequence.
    let local: Vec<RunUnit> = run.iter().map(|&i| run_units[i].clone()).collect();
    let mut pos = 0;
    while pos < local.len() {
        let np = np_match(&local, pos);
        let pp = pp_match(&local, pos);
        let (vp, refusal) = vp_match(&local, pos);
        let (len, chunk_type) = if vp > 0 && vp >= pp && vp >= np {
            (vp, "VP")
        } else if pp > 0 && pp >= np {
            (pp, "PP")
        } else if np > 0 {
            (np, "NP")
        } else {
            (1, "O")
        };
        let members: Vec<usize> = run[pos..pos + len].to_vec();
        let pp_kind = (chunk_type == "PP").then(|| {
            PP_KIND
                .get(local[pos].surface_lower.as_str())
                .copied()
                .unwrap_or("generic")
                .to_string()
        });
        emit_chunk(doc, segment, units, &members, chunk_type, pp_kind, annotations);
        if chunk_type == "VP" {
            if let Some(refused) = refusal {
                let pp_members: Vec<usize> =
                    run[refused.start..refused.start + refused.len].to_vec();
                emit_pp_refusal(doc, segment, units, &members, &pp_members, &refused.surface, annotations);
            }
        }
        pos += len;
    }
}

fn unit_token_ids(units: &[Unit<'_>], members: &[usize]) -> Vec<String> {
    members
        .iter()
        .flat_map(|&i| units[i].tokens.iter().map(|t| t.id.clone()))
        .collect()
}

fn emit_chunk(
    doc: &Document,
    segment: &Segment,
    units: &[Unit<'_>],
    members: &[usize],
    chunk_type: &str,
    pp_kind: Option<String>,
    annotations: &mut Vec<Annotation>,
) {
    let token_ids = unit_token_ids(units, members);
    let first = units[members[0]].tokens[0];
    let last_unit = &units[members[members.len() - 1]];
    let last = last_unit.tokens[last_unit.tokens.len() - 1];
    let span = Span::new(first.span.start, last.span.end);
    let exact = doc.slice(span).unwrap_or_default().to_string();
    let id = content_id(
        "chunk",
        &json!({"segment_id": segment.id, "token_ids": token_ids, "chunk_type": chunk_type}),
    );
    let body = ChunkBody {
        chunk_type: chunk_type.to_string(),
        segment_id: segment.id.clone(),
        token_ids: token_ids.clone(),
        pp_kind,
    };
    annotations.push(Annotation {
        id,
        kind: AnnotationKind::Chunk,
        status: AnnotationStatus::Accepted,
        label: Some(chunk_type.to_string()),
        anchor: Anchor::triple(token_ids, span, exact),
        sources: vec![Source::new(STAGE_NAME, "fsm")],
        body: serde_json::to_value(&body).unwrap_or_default(),
    });
}

fn emit_pp_refusal(
    doc: &Document,
    segment: &Segment,
    units: &[Unit<'_>],
    vp_members: &[usize],
    pp_members: &[usize],
    prep_surface: &str,
    annotations: &mut Vec<Annotation>,
) {
    let vp_ids = unit_token_ids(units, vp_members);
    let pp_ids = unit_token_ids(units, pp_members);
    let first = units[pp_members[0]].tokens[0];
    let last_unit = &units[pp_members[pp_members.len() - 1]];
    let last = last_unit.tokens[last_unit.tokens.len() - 1];
    let span = Span::new(first.span.start, last.span.end);
    let exact = doc.slice(span).unwrap_or_default().to_string();
    let id = content_id(
        "ppatt",
        &json!({"segment_id": segment.id, "vp": vp_ids, "pp": pp_ids}),
    );
    annotations.push(Annotation {
        id,
        kind: AnnotationKind::PpAttachment,
        status: AnnotationStatus::Observation,
        label: Some("vp_absorption_denied".to_string()),
        anchor: Anchor::triple(pp_ids.clone(), span, exact),
        sources: vec![Source::new(STAGE_NAME, "fsm")],
        body: json!({
            "segment_id": segment.id,
            "vp_token_ids": vp_ids,
            "pp_token_ids": pp_ids,
            "prep_surface": prep_surface,
            "reason": "vp_absorption_denied",
        }),
    });
}
