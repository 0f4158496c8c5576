//! The seed document: the pipeline's unit of state.
//!
//! A [`Document`] is created once per run (from raw text or a partial
//! document), transformed by exactly one stage at a time via clone-then-modify,
//! and discarded when the pipeline returns. Stages accumulate segments, tokens,
//! and annotations monotonically; the coarse [`Stage`] marker records how far
//! enrichment has progressed.

use crate::annotation::Annotation;
use crate::span::{IndexBasis, IndexUnit, OffsetTable, Span};
use serde::{Deserialize, Serialize};

/// Coarse pipeline progress marker, monotonically advanced by stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Raw or normalized text, no structure yet.
    #[default]
    Canonical,
    /// Sentence-like segments exist.
    Segmented,
    /// Tokens exist.
    Tokenized,
    /// Tokens carry POS info.
    PosTagged,
    /// MWE candidates extracted.
    MweCandidates,
    /// MWE candidates deduplicated and identified.
    MweConstructed,
    /// MWE candidates promoted or demoted.
    MweMaterialized,
    /// Heuristic linguistic observations present.
    Analyzed,
    /// Chunks present.
    Chunked,
    /// Chunk heads present.
    HeadsIdentified,
    /// Role relations present.
    RelationsExtracted,
}

impl Stage {
    /// Ordinal used for monotonicity checks. Later stages rank higher.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Stage::Canonical => 0,
            Stage::Segmented => 1,
            Stage::Tokenized => 2,
            Stage::PosTagged => 3,
            Stage::MweCandidates => 4,
            Stage::MweConstructed => 5,
            Stage::MweMaterialized => 6,
            Stage::Analyzed => 7,
            Stage::Chunked => 8,
            Stage::HeadsIdentified => 9,
            Stage::RelationsExtracted => 10,
        }
    }

    /// Serialized name, e.g. `pos_tagged`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Stage::Canonical => "canonical",
            Stage::Segmented => "segmented",
            Stage::Tokenized => "tokenized",
            Stage::PosTagged => "pos_tagged",
            Stage::MweCandidates => "mwe_candidates",
            Stage::MweConstructed => "mwe_constructed",
            Stage::MweMaterialized => "mwe_materialized",
            Stage::Analyzed => "analyzed",
            Stage::Chunked => "chunked",
            Stage::HeadsIdentified => "heads_identified",
            Stage::RelationsExtracted => "relations_extracted",
        }
    }
}

/// Contiguous range of token indices `[start, end)` belonging to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRange {
    /// First token index (inclusive).
    pub start: usize,
    /// Past-the-end token index (exclusive).
    pub end: usize,
}

/// A sentence-like unit of the canonical text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Deterministic content-addressed id.
    pub id: String,
    /// Position in `Document::segments`; invariant: matches array index.
    pub index: usize,
    /// Span into `canonical_text` under the declared basis.
    pub span: Span,
    /// The segment's text (whitespace-trimmed).
    pub text: String,
    /// Indices into `Document::tokens`, set by tokenization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_range: Option<TokenRange>,
}

/// Coarse POS class derived from the fine PTB tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoarsePos {
    /// Common noun (NN, NNS).
    Noun,
    /// Proper noun (NNP, NNPS).
    ProperNoun,
    /// Lexical or auxiliary verb (VB*).
    Verb,
    /// Modal (MD).
    Aux,
    /// Adjective (JJ*).
    Adj,
    /// Adverb (RB*).
    Adv,
    /// Determiner (DT, PDT, WDT).
    Det,
    /// Preposition or subordinator (IN) and infinitival TO.
    Prep,
    /// Pronoun (PRP, PRP$, WP, WP$).
    Pron,
    /// Coordinating conjunction (CC).
    Conj,
    /// Cardinal number (CD).
    Num,
    /// Particle (RP) or possessive marker (POS).
    Part,
    /// Punctuation.
    Punct,
    /// Anything else.
    Other,
}

impl CoarsePos {
    /// Map a Penn-Treebank tag to its coarse class.
    #[must_use]
    pub fn from_ptb(tag: &str) -> Self {
        match tag {
            "NN" | "NNS" => CoarsePos::Noun,
            "NNP" | "NNPS" => CoarsePos::ProperNoun,
            "MD" => CoarsePos::Aux,
            "DT" | "PDT" | "WDT" => CoarsePos::Det,
            "IN" | "TO" => CoarsePos::Prep,
            "PRP" | "PRP$" | "WP" | "WP$" => CoarsePos::Pron,
            "CC" => CoarsePos::Conj,
            "CD" => CoarsePos::Num,
            "RP" | "POS" => CoarsePos::Part,
            "." | "," | ":" | ";" | "!" | "?" | "``" | "''" | "-LRB-" | "-RRB-" | "HYPH"
            | "SYM" => CoarsePos::Punct,
            t if t.starts_with("VB") => CoarsePos::Verb,
            t if t.starts_with("JJ") => CoarsePos::Adj,
            t if t.starts_with("RB") || t == "WRB" => CoarsePos::Adv,
            _ => CoarsePos::Other,
        }
    }
}

/// POS assignment on a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosInfo {
    /// Fine-grained Penn-Treebank tag.
    pub tag: String,
    /// Coarse class derived from `tag`.
    pub coarse: CoarsePos,
}

impl PosInfo {
    /// Build from a PTB tag, deriving the coarse class.
    #[must_use]
    pub fn from_tag(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let coarse = CoarsePos::from_ptb(&tag);
        Self { tag, coarse }
    }
}

/// A word or punctuation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Deterministic content-addressed id.
    pub id: String,
    /// Position in `Document::tokens`; invariant: matches array index.
    pub i: usize,
    /// Owning segment id.
    pub segment_id: String,
    /// Surface form, exactly as it appears in the canonical text.
    pub surface: String,
    /// Span into `canonical_text` under the declared basis.
    pub span: Span,
    /// POS info, assigned by the tagging stage onward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<PosInfo>,
    /// True if the token contains no letters or digits.
    pub is_punct: bool,
}

impl Token {
    /// The fine PTB tag, if tagged.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.pos.as_ref().map(|p| p.tag.as_str())
    }

    /// The coarse class, if tagged.
    #[must_use]
    pub fn coarse(&self) -> Option<CoarsePos> {
        self.pos.as_ref().map(|p| p.coarse)
    }

    /// True if tagged with any verb tag (VB*) or a modal.
    #[must_use]
    pub fn is_verbish(&self) -> bool {
        matches!(self.coarse(), Some(CoarsePos::Verb | CoarsePos::Aux))
    }

    /// True if tagged as a common or proper noun.
    #[must_use]
    pub fn is_nounish(&self) -> bool {
        matches!(self.coarse(), Some(CoarsePos::Noun | CoarsePos::ProperNoun))
    }
}

/// The evolving annotation document passed between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The normalized source text all spans point into.
    pub canonical_text: String,
    /// Declared unit for every span in this document.
    #[serde(default)]
    pub index_basis: IndexBasis,
    /// Coarse progress marker.
    #[serde(default)]
    pub stage: Stage,
    /// Sentence-like units, ordered by span start.
    #[serde(default)]
    pub segments: Vec<Segment>,
    /// Tokens, ordered by span start.
    #[serde(default)]
    pub tokens: Vec<Token>,
    /// Heterogeneous annotations, discriminated by kind.
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Document {
    /// Seed document from raw text under the default basis (UTF-16 code units).
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::with_basis(text, IndexBasis::default())
    }

    /// Seed document from raw text with an explicit index basis.
    #[must_use]
    pub fn with_basis(text: impl Into<String>, index_basis: IndexBasis) -> Self {
        Self {
            canonical_text: text.into(),
            index_basis,
            stage: Stage::Canonical,
            segments: Vec::new(),
            tokens: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// The declared index unit.
    #[must_use]
    pub fn unit(&self) -> IndexUnit {
        self.index_basis.unit
    }

    /// Build the offset tables for the canonical text.
    ///
    /// Rebuilt on demand; the text never changes after the structural stages,
    /// so stages that project many spans build this once and reuse it.
    #[must_use]
    pub fn offsets(&self) -> OffsetTable {
        OffsetTable::new(&self.canonical_text)
    }

    /// Slice the canonical text by a span under the declared basis.
    #[must_use]
    pub fn slice(&self, span: Span) -> Option<&str> {
        self.offsets().slice(&self.canonical_text, span, self.unit())
    }

    /// Look up a token by id.
    #[must_use]
    pub fn token_by_id(&self, id: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == id)
    }

    /// Look up a segment by id.
    #[must_use]
    pub fn segment_by_id(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Tokens belonging to a segment, in order.
    #[must_use]
    pub fn segment_tokens(&self, segment: &Segment) -> &[Token] {
        match segment.token_range {
            Some(range) if range.end <= self.tokens.len() && range.start <= range.end => {
                &self.tokens[range.start..range.end]
            }
            _ => &[],
        }
    }

    /// Annotations of one kind, in document order.
    pub fn annotations_of(
        &self,
        kind: crate::annotation::AnnotationKind,
    ) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(move |a| a.kind == kind)
    }
}
