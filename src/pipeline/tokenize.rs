//! Stage 03: tokenization.
//!
//! Maps each segment to word/punctuation tokens through the [`Tokenizer`]
//! seam, then applies a fixed merge cascade in order: ellipsis merge,
//! dotted-abbreviation merge, hyphen-compound merge, apostrophe-s merge.
//! Spans are computed in UTF-8 bytes and projected into the document's
//! declared index basis through the offset tables.
//!
//! The default tokenizer splits on Unicode word boundaries and additionally
//! splits contractions (`don't` → `do` + `n't`) and possessives
//! (`Smith's` → `Smith` + `'s`), matching common treebank conventions.

use crate::document::{Document, Stage, Token, TokenRange};
use crate::error::{Error, Result};
use crate::ident::content_id;
use crate::pipeline::{one_way_door, RawToken, StageContext, Tokenizer};
use serde_json::json;
use unicode_segmentation::UnicodeSegmentation;

/// Registry name of this stage.
pub const STAGE_NAME: &str = "tokenization";

/// Run tokenization.
pub fn run(doc: &Document, ctx: &StageContext) -> Result<Document> {
    if !doc.tokens.is_empty() || !doc.annotations.is_empty() {
        return Err(one_way_door(
            STAGE_NAME,
            "document already carries tokens or annotations",
            json!({"tokens": doc.tokens.len(), "annotations": doc.annotations.len()}),
        ));
    }
    if doc.segments.is_empty() {
        return Err(Error::invariant(
            "tokenization requires segments",
            json!({"stage": STAGE_NAME}),
        ));
    }

    let offsets = doc.offsets();
    let unit = doc.unit();
    let mut out = doc.clone();
    let mut tokens: Vec<Token> = Vec::new();

    for segment in &mut out.segments {
        let (seg_byte_start, _) = offsets
            .span_to_bytes(segment.span, unit)
            .ok_or_else(|| {
                Error::invariant(
                    "segment span not resolvable to bytes",
                    json!({"stage": STAGE_NAME, "segment": segment.id}),
                )
            })?;
        let raw = ctx.tokenizer.tokenize(&segment.text);
        let merged = merge_cascade(&segment.text, raw);

        let range_start = tokens.len();
        for piece in merged {
            let abs_start = seg_byte_start + piece.start;
            let abs_end = seg_byte_start + piece.end;
            let span = offsets.span_from_bytes(abs_start, abs_end, unit).ok_or_else(|| {
                Error::invariant(
                    "token span not on a codepoint boundary",
                    json!({"stage": STAGE_NAME, "surface": piece.surface}),
                )
            })?;
            let is_punct = !piece.surface.chars().any(char::is_alphanumeric);
            let id = content_id(
                "tok",
                &json!({"start": span.start, "end": span.end, "surface": piece.surface}),
            );
            tokens.push(Token {
                id,
                i: tokens.len(),
                segment_id: segment.id.clone(),
                surface: piece.surface,
                span,
                pos: None,
                is_punct,
            });
        }
        segment.token_range = Some(TokenRange {
            start: range_start,
            end: tokens.len(),
        });
    }

    out.tokens = tokens;
    out.stage = Stage::Tokenized;
    Ok(out)
}

// =============================================================================
// UnicodeTokenizer: default word-boundary tokenizer
// =============================================================================

/// Default [`Tokenizer`]: Unicode word boundaries plus contraction and
/// possessive splitting.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnicodeTokenizer;

impl Tokenizer for UnicodeTokenizer {
    fn tokenize(&self, text: &str) -> Vec<RawToken> {
        let mut out = Vec::new();
        for (start, word) in text.split_word_bound_indices() {
            if word.chars().all(char::is_whitespace) {
                continue;
            }
            split_clitics(text, start, word, &mut out);
        }
        out
    }
}

/// Split treebank clitics off a word piece: `n't`, `'s`, and a trailing
/// bare apostrophe. Other pieces pass through unchanged.
fn split_clitics(text: &str, start: usize, word: &str, out: &mut Vec<RawToken>) {
    let lower = word.to_lowercase();
    // Lowercasing can change byte length for a handful of scripts; only
    // split when the cut point is a boundary in the original word.
    let mut try_split = |suffix: &str| -> bool {
        if lower.len() > suffix.len() && lower.ends_with(suffix) {
            let cut = word.len().saturating_sub(suffix.len());
            if word.is_char_boundary(cut) {
                out.push(RawToken::new(text, start, start + cut));
                out.push(RawToken::new(text, start + cut, start + word.len()));
                return true;
            }
        }
        false
    };
    for suffix in ["n't", "n\u{2019}t", "'s", "\u{2019}s", "'", "\u{2019}"] {
        if try_split(suffix) {
            return;
        }
    }
    out.push(RawToken::new(text, start, start + word.len()));
}

// =============================================================================
// Merge cascade
// =============================================================================

/// Apply the fixed merge cascade in order: ellipsis, dotted abbreviation,
/// hyphen compound, apostrophe-s. Merges only ever join byte-adjacent tokens.
#[must_use]
pub fn merge_cascade(text: &str, tokens: Vec<RawToken>) -> Vec<RawToken> {
    let tokens = merge_ellipses(text, tokens);
    let tokens = merge_dotted_abbreviations(text, tokens);
    let tokens = merge_hyphen_compounds(text, tokens);
    merge_apostrophe_s(text, tokens)
}

fn adjacent(a: &RawToken, b: &RawToken) -> bool {
    a.end == b.start
}

/// Runs of two or more adjacent `.` tokens collapse into one ellipsis token.
fn merge_ellipses(text: &str, tokens: Vec<RawToken>) -> Vec<RawToken> {
    let mut out: Vec<RawToken> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].surface == "." {
            let mut j = i;
            while j + 1 < tokens.len()
                && tokens[j + 1].surface == "."
                && adjacent(&tokens[j], &tokens[j + 1])
            {
                j += 1;
            }
            if j > i {
                out.push(RawToken::new(text, tokens[i].start, tokens[j].end));
                i = j + 1;
                continue;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

/// `U` `.` `S` `.` (and the word-boundary variant `U.S` `.`) merge into one
/// dotted-abbreviation token.
fn merge_dotted_abbreviations(text: &str, tokens: Vec<RawToken>) -> Vec<RawToken> {
    let is_single_letter = |t: &RawToken| t.surface.chars().count() == 1 && t.surface.chars().all(char::is_alphabetic);
    let is_dotted_letters = |t: &RawToken| {
        t.surface.contains('.')
            && !t.surface.ends_with('.')
            && t.surface
                .split('.')
                .all(|p| p.chars().count() == 1 && p.chars().all(char::is_alphabetic))
    };
    let mut out: Vec<RawToken> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let starts_abbrev = (is_single_letter(&tokens[i]) || is_dotted_letters(&tokens[i]))
            && tokens.get(i + 1).is_some_and(|n| n.surface == "." && adjacent(&tokens[i], n));
        if starts_abbrev {
            let mut j = i + 1; // points at the dot
            while j + 2 < tokens.len()
                && is_single_letter(&tokens[j + 1])
                && adjacent(&tokens[j], &tokens[j + 1])
                && tokens[j + 2].surface == "."
                && adjacent(&tokens[j + 1], &tokens[j + 2])
            {
                j += 2;
            }
            out.push(RawToken::new(text, tokens[i].start, tokens[j].end));
            i = j + 1;
            continue;
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

/// `state` `-` `of` `-` `the` `-` `art` merges into one compound token.
fn merge_hyphen_compounds(text: &str, tokens: Vec<RawToken>) -> Vec<RawToken> {
    let is_word = |t: &RawToken| t.surface.chars().any(char::is_alphanumeric);
    let mut out: Vec<RawToken> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if is_word(&tokens[i]) {
            let mut j = i;
            while j + 2 < tokens.len()
                && tokens[j + 1].surface == "-"
                && is_word(&tokens[j + 2])
                && adjacent(&tokens[j], &tokens[j + 1])
                && adjacent(&tokens[j + 1], &tokens[j + 2])
            {
                j += 2;
            }
            if j > i {
                out.push(RawToken::new(text, tokens[i].start, tokens[j].end));
                i = j + 1;
                continue;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

/// A bare apostrophe token directly followed by `s` merges into `'s`.
fn merge_apostrophe_s(text: &str, tokens: Vec<RawToken>) -> Vec<RawToken> {
    let mut out: Vec<RawToken> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let is_apostrophe = tokens[i].surface == "'" || tokens[i].surface == "\u{2019}";
        if is_apostrophe
            && tokens
                .get(i + 1)
                .is_some_and(|n| n.surface == "s" && adjacent(&tokens[i], n))
        {
            out.push(RawToken::new(text, tokens[i].start, tokens[i + 1].end));
            i += 2;
            continue;
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::segment;
    use crate::span::{IndexBasis, IndexUnit};

    fn tokenize_text(text: &str) -> Vec<String> {
        let doc = Document::from_text(text);
        let ctx = StageContext::new();
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = run(&doc, &ctx).unwrap();
        doc.tokens.into_iter().map(|t| t.surface).collect()
    }

    #[test]
    fn test_contraction_splits() {
        assert_eq!(tokenize_text("don't stop"), vec!["do", "n't", "stop"]);
    }

    #[test]
    fn test_hyphen_compound_stays_single() {
        assert_eq!(tokenize_text("state-of-the-art"), vec!["state-of-the-art"]);
    }

    #[test]
    fn test_possessive_splits() {
        assert_eq!(tokenize_text("Smith's house"), vec!["Smith", "'s", "house"]);
    }

    #[test]
    fn test_dotted_abbreviation_merges() {
        assert_eq!(
            tokenize_text("the U.S. economy"),
            vec!["the", "U.S.", "economy"]
        );
    }

    #[test]
    fn test_ellipsis_merges() {
        assert_eq!(tokenize_text("wait... go"), vec!["wait", "...", "go"]);
    }

    #[test]
    fn test_punctuation_flagged() {
        let doc = Document::from_text("Stop now.");
        let ctx = StageContext::new();
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = run(&doc, &ctx).unwrap();
        assert_eq!(doc.tokens.len(), 3);
        assert!(!doc.tokens[0].is_punct);
        assert!(doc.tokens[2].is_punct);
    }

    #[test]
    fn test_token_ranges_cover_segments() {
        let doc = Document::from_text("One two. Three.");
        let ctx = StageContext::new();
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = run(&doc, &ctx).unwrap();
        assert_eq!(doc.segments.len(), 2);
        let r0 = doc.segments[0].token_range.unwrap();
        let r1 = doc.segments[1].token_range.unwrap();
        assert_eq!(r0.start, 0);
        assert_eq!(r0.end, r1.start);
        assert_eq!(r1.end, doc.tokens.len());
        for token in doc.segment_tokens(&doc.segments[1]) {
            assert_eq!(token.segment_id, doc.segments[1].id);
        }
    }

    #[test]
    fn test_surfaces_match_spans_under_codepoint_basis() {
        let doc = Document::with_basis(
            "naïve café owners.",
            IndexBasis::new(IndexUnit::UnicodeCodepoints),
        );
        let ctx = StageContext::new();
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = run(&doc, &ctx).unwrap();
        for token in &doc.tokens {
            assert_eq!(doc.slice(token.span), Some(token.surface.as_str()));
        }
    }

    #[test]
    fn test_one_way_door() {
        let doc = Document::from_text("One two.");
        let ctx = StageContext::new();
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = run(&doc, &ctx).unwrap();
        let err = run(&doc, &ctx).unwrap_err();
        assert!(err.to_string().contains("already carries"));
    }

    #[test]
    fn test_requires_segments() {
        let doc = Document::from_text("One two.");
        let err = run(&doc, &StageContext::new()).unwrap_err();
        assert!(err.to_string().contains("requires segments"));
    }
}
