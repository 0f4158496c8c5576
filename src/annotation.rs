//! Annotations: span-anchored enrichment records.
//!
//! Every stage's output beyond segments/tokens is an [`Annotation`]:
//! a discriminated record with a deterministic id, a lifecycle
//! [`AnnotationStatus`], an [`Anchor`] of selectors tying it to the canonical
//! text, a provenance list, and a kind-specific JSON body.
//!
//! The selector triple follows Web Annotation conventions: a
//! `TokenSelector` names tokens by id, a `TextPositionSelector` carries the
//! span under the document's declared index basis, and a `TextQuoteSelector`
//! carries the literal text, which the invariant validator requires to equal
//! the canonical text sliced by the position span.

use crate::span::Span;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminator for the heterogeneous annotation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Multiword expression.
    Mwe,
    /// NP/VP/PP/O chunk.
    Chunk,
    /// Selected head token of a chunk.
    ChunkHead,
    /// Dependency edge (heuristic observation) or role relation (accepted).
    Dependency,
    /// Lemma observation.
    Lemma,
    /// Contiguous determiner/adjective/noun run.
    NounPhrase,
    /// Contiguous proper-noun run.
    NamedEntity,
    /// Comparative construction (`bigger … than`).
    Comparative,
    /// Quantifier and the run it scopes over.
    QuantifierScope,
    /// Copular frame (`NP be NP/ADJ`).
    CopulaFrame,
    /// Prepositional-phrase attachment note.
    PpAttachment,
    /// Modal verb and the verb it scopes over.
    ModalityScope,
    /// Negator and the material to its right.
    NegationScope,
}

/// Lifecycle status; MWE processing progresses `candidate → accepted`
/// (or demotes to `observation`), analysis output stays `observation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    /// Proposed, not yet validated.
    Candidate,
    /// Raw material for later stages, not final output.
    Observation,
    /// Validated final output.
    Accepted,
}

/// One way of locating an annotation in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Selector {
    /// Names tokens by id, in order.
    TokenSelector {
        /// Referenced token ids.
        token_ids: Vec<String>,
    },
    /// Span into the canonical text under the declared basis.
    TextPositionSelector {
        /// The span.
        span: Span,
    },
    /// Literal text; must equal the canonical text sliced by the position span.
    TextQuoteSelector {
        /// The quoted text.
        exact: String,
    },
}

/// The selector list anchoring an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Anchor {
    /// One or more selectors; richer anchors carry the full triple.
    pub selectors: Vec<Selector>,
}

impl Anchor {
    /// Anchor carrying the token/position/quote triple.
    #[must_use]
    pub fn triple(token_ids: Vec<String>, span: Span, exact: impl Into<String>) -> Self {
        Self {
            selectors: vec![
                Selector::TokenSelector { token_ids },
                Selector::TextPositionSelector { span },
                Selector::TextQuoteSelector {
                    exact: exact.into(),
                },
            ],
        }
    }

    /// The token ids, if a token selector is present.
    #[must_use]
    pub fn token_ids(&self) -> Option<&[String]> {
        self.selectors.iter().find_map(|s| match s {
            Selector::TokenSelector { token_ids } => Some(token_ids.as_slice()),
            _ => None,
        })
    }

    /// The position span, if present.
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        self.selectors.iter().find_map(|s| match s {
            Selector::TextPositionSelector { span } => Some(*span),
            _ => None,
        })
    }

    /// The quoted text, if present.
    #[must_use]
    pub fn exact(&self) -> Option<&str> {
        self.selectors.iter().find_map(|s| match s {
            Selector::TextQuoteSelector { exact } => Some(exact.as_str()),
            _ => None,
        })
    }
}

/// Provenance entry: which component produced this annotation, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Producing component, e.g. `mwe-extraction`.
    pub name: String,
    /// Kind of evidence, e.g. `pattern`, `lexicon`, `cascade`.
    pub kind: String,
    /// Optional structured evidence payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Value>,
}

impl Source {
    /// Source without evidence.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            evidence: None,
        }
    }

    /// Source with an evidence payload.
    #[must_use]
    pub fn with_evidence(
        name: impl Into<String>,
        kind: impl Into<String>,
        evidence: Value,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            evidence: Some(evidence),
        }
    }
}

/// A span-anchored enrichment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Deterministic content-addressed id, unique within the document.
    pub id: String,
    /// Discriminator.
    pub kind: AnnotationKind,
    /// Lifecycle status.
    pub status: AnnotationStatus,
    /// Human-readable label (chunk type, lemma, relation role, …).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Selectors tying the annotation to the text.
    pub anchor: Anchor,
    /// Provenance, in production order.
    pub sources: Vec<Source>,
    /// Kind-specific payload.
    #[serde(default)]
    pub body: Value,
}

impl Annotation {
    /// True if any source carries this name.
    #[must_use]
    pub fn has_source(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.name == name)
    }

    /// Parse the body into a typed payload.
    pub fn body_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.body.clone()).ok()
    }
}

// =============================================================================
// Typed bodies: the structured payloads behind `Annotation::body`
// =============================================================================

/// Body of a heuristic dependency edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyBody {
    /// Edge label, e.g. `nsubj`.
    pub label: String,
    /// Dependent token id.
    pub dep: String,
    /// Head token id; `None` marks the segment root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    /// Owning segment id.
    pub segment_id: String,
}

/// Body of a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkBody {
    /// Chunk type: `NP`, `VP`, `PP`, or `O`.
    pub chunk_type: String,
    /// Owning segment id.
    pub segment_id: String,
    /// Member token ids, in order.
    pub token_ids: Vec<String>,
    /// Semantic role of the preposition, for PP chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp_kind: Option<String>,
}

/// Audit record of a head-identification decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadDecision {
    /// Candidate token ids the cascade considered.
    pub candidates: Vec<String>,
    /// The chosen head token id.
    pub chosen: String,
    /// Rule that fired: `dependency_root`, `positional_fallback`,
    /// `allow_any_fallback`, `matrix_lexical_preference`, `vp_lexical_override`.
    pub rule: String,
    /// Tie-break applied, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie_break: Option<String>,
}

/// Body of a chunk-head annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkHeadBody {
    /// Id of the chunk this head belongs to.
    pub chunk_id: String,
    /// The head token id.
    pub head_token_id: String,
    /// Chunk type, copied for auditability.
    pub chunk_type: String,
    /// Owning segment id.
    pub segment_id: String,
    /// How the head was chosen.
    pub head_decision: HeadDecision,
}

/// Body of an accepted role relation (kind `dependency`, accepted status).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationBody {
    /// Role label, e.g. `actor`, `location`.
    pub role: String,
    /// Predicate token id (a chunk head).
    pub predicate_id: String,
    /// Argument token id.
    pub argument_id: String,
    /// Owning segment id.
    pub segment_id: String,
    /// Derivation evidence.
    pub evidence: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selector_serializes_with_type_tag() {
        let sel = Selector::TextQuoteSelector {
            exact: "Berlin".into(),
        };
        let json = serde_json::to_value(&sel).unwrap();
        assert_eq!(json["type"], "TextQuoteSelector");
        assert_eq!(json["exact"], "Berlin");
    }

    #[test]
    fn test_anchor_triple_accessors() {
        let anchor = Anchor::triple(vec!["tok-1".into()], Span::new(3, 9), "Berlin");
        assert_eq!(anchor.token_ids(), Some(&["tok-1".to_string()][..]));
        assert_eq!(anchor.span(), Some(Span::new(3, 9)));
        assert_eq!(anchor.exact(), Some("Berlin"));
    }

    #[test]
    fn test_annotation_body_roundtrip() {
        let body = DependencyBody {
            label: "nsubj".into(),
            dep: "tok-1".into(),
            head: Some("tok-2".into()),
            segment_id: "seg-1".into(),
        };
        let ann = Annotation {
            id: "dep-000000000000".into(),
            kind: AnnotationKind::Dependency,
            status: AnnotationStatus::Observation,
            label: Some("nsubj".into()),
            anchor: Anchor::default(),
            sources: vec![Source::new("linguistic-analysis", "heuristic")],
            body: serde_json::to_value(&body).unwrap(),
        };
        let parsed: DependencyBody = ann.body_as().unwrap();
        assert_eq!(parsed, body);
        assert!(ann.has_source("linguistic-analysis"));
        assert!(!ann.has_source("chunking"));
    }

    #[test]
    fn test_root_dependency_omits_head() {
        let body = DependencyBody {
            label: "root".into(),
            dep: "tok-1".into(),
            head: None,
            segment_id: "seg-1".into(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value.get("head"), None);
        assert_eq!(value, json!({"label": "root", "dep": "tok-1", "segment_id": "seg-1"}));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AnnotationKind::ChunkHead).unwrap(),
            "\"chunk_head\""
        );
        assert_eq!(
            serde_json::to_string(&AnnotationKind::QuantifierScope).unwrap(),
            "\"quantifier_scope\""
        );
    }
}
