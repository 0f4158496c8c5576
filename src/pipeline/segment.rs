//! Stage 02: segmentation.
//!
//! Splits the canonical text into sentence-like spans. The default splitter
//! is terminator-driven (`.`, `!`, `?`, ellipsis) with two suppressions: a
//! fixed abbreviation allow-list and decimal-number context. Raw chunks are
//! whitespace-trimmed, empty results dropped; producing zero segments is an
//! invariant violation.

use crate::document::{Document, Segment, Stage};
use crate::error::{Error, Result};
use crate::ident::content_id;
use crate::pipeline::{ensure_unenriched, SentenceSplitter, StageContext};
use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::HashSet;

/// Registry name of this stage.
pub const STAGE_NAME: &str = "segmentation";

/// Dotted abbreviations that never end a sentence.
pub static ABBREVIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "Sr.", "Jr.", "St.", "vs.", "etc.", "e.g.",
        "i.e.", "U.S.", "U.K.", "No.", "Inc.", "Ltd.", "Co.", "Corp.", "Fig.", "al.",
    ]
    .into_iter()
    .collect()
});

/// Closing marks absorbed into the sentence after its terminator.
const TRAILING_CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201D}', '\u{2019}'];

/// Run segmentation.
pub fn run(doc: &Document, ctx: &StageContext) -> Result<Document> {
    ensure_unenriched(doc, STAGE_NAME)?;
    let text = &doc.canonical_text;
    let offsets = doc.offsets();
    let unit = doc.unit();

    let mut segments = Vec::new();
    for (raw_start, raw_end) in ctx.splitter.split(text) {
        let chunk = &text[raw_start..raw_end];
        let trimmed = chunk.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lead = chunk.len() - chunk.trim_start().len();
        let start = raw_start + lead;
        let end = start + trimmed.len();
        let span = offsets.span_from_bytes(start, end, unit).ok_or_else(|| {
            Error::invariant(
                "segment boundary not on a codepoint boundary",
                json!({"stage": STAGE_NAME, "start": start, "end": end}),
            )
        })?;
        let index = segments.len();
        let id = content_id(
            "seg",
            &json!({"index": index, "start": span.start, "end": span.end, "text": trimmed}),
        );
        segments.push(Segment {
            id,
            index,
            span,
            text: trimmed.to_string(),
            token_range: None,
        });
    }

    if segments.is_empty() {
        return Err(Error::invariant(
            "segmentation produced zero segments",
            json!({"stage": STAGE_NAME, "text_len": text.len()}),
        ));
    }

    let mut out = doc.clone();
    out.segments = segments;
    out.stage = Stage::Segmented;
    Ok(out)
}

// =============================================================================
// RuleSplitter: default terminator-driven sentence splitter
// =============================================================================

/// Terminator-driven sentence splitter with abbreviation and decimal
/// suppression. The default [`SentenceSplitter`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleSplitter;

impl SentenceSplitter for RuleSplitter {
    fn split(&self, text: &str) -> Vec<(usize, usize)> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut ranges = Vec::new();
        let mut sentence_start = 0usize;
        let mut i = 0usize;
        while i < chars.len() {
            let (byte, ch) = chars[i];
            let terminal = match ch {
                '!' | '?' | '\u{2026}' => true,
                '.' => {
                    // A dot glued to a following letter or digit is interior
                    // (U.S, 3.14, file.txt), never a sentence end.
                    let glued = chars
                        .get(i + 1)
                        .is_some_and(|(_, next)| next.is_alphanumeric());
                    !glued && !is_decimal_context(&chars, i) && !is_abbreviation(text, byte)
                }
                _ => false,
            };
            if !terminal {
                i += 1;
                continue;
            }
            // Consume the full terminator run ("..."), then trailing closers.
            let mut j = i;
            while j + 1 < chars.len() && matches!(chars[j + 1].1, '.' | '!' | '?' | '\u{2026}') {
                j += 1;
            }
            while j + 1 < chars.len() && TRAILING_CLOSERS.contains(&chars[j + 1].1) {
                j += 1;
            }
            let end = chars[j].0 + chars[j].1.len_utf8();
            ranges.push((sentence_start, end));
            sentence_start = end;
            i = j + 1;
        }
        if sentence_start < text.len() {
            ranges.push((sentence_start, text.len()));
        }
        ranges
    }
}

/// True when the dot at `chars[i]` sits between two ASCII digits (`3.14`).
fn is_decimal_context(chars: &[(usize, char)], i: usize) -> bool {
    let prev_digit = i > 0 && chars[i - 1].1.is_ascii_digit();
    let next_digit = i + 1 < chars.len() && chars[i + 1].1.is_ascii_digit();
    prev_digit && next_digit
}

/// True when the dot ending at `dot_byte` closes an allow-listed abbreviation.
///
/// Scans back over letters and interior dots to recover the dotted word, so
/// the final period of `e.g.` and `U.S.` is matched against the full form.
fn is_abbreviation(text: &str, dot_byte: usize) -> bool {
    let head = &text[..dot_byte];
    let word_start = head
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphabetic() || *c == '.')
        .last()
        .map_or(dot_byte, |(b, _)| b);
    if word_start == dot_byte {
        return false;
    }
    let candidate = &text[word_start..=dot_byte];
    ABBREVIATIONS.contains(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_texts(text: &str) -> Vec<String> {
        RuleSplitter
            .split(text)
            .into_iter()
            .map(|(s, e)| text[s..e].trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    #[test]
    fn test_two_plain_sentences() {
        assert_eq!(
            split_texts("One ends here. Two ends here."),
            vec!["One ends here.", "Two ends here."]
        );
    }

    #[test]
    fn test_abbreviation_does_not_split() {
        assert_eq!(
            split_texts("Dr. Smith went home."),
            vec!["Dr. Smith went home."]
        );
    }

    #[test]
    fn test_dotted_abbreviation_does_not_split() {
        assert_eq!(
            split_texts("The U.S. economy grew. It slowed later."),
            vec!["The U.S. economy grew.", "It slowed later."]
        );
    }

    #[test]
    fn test_decimal_does_not_split() {
        assert_eq!(
            split_texts("Pi is 3.14 roughly. Yes."),
            vec!["Pi is 3.14 roughly.", "Yes."]
        );
    }

    #[test]
    fn test_ellipsis_single_terminator() {
        assert_eq!(split_texts("Wait... Go now!"), vec!["Wait...", "Go now!"]);
    }

    #[test]
    fn test_closing_quote_stays_with_sentence() {
        assert_eq!(
            split_texts("She said \"stop.\" He left."),
            vec!["She said \"stop.\"", "He left."]
        );
    }

    #[test]
    fn test_stage_builds_ordered_segments() {
        let doc = Document::from_text("Alpha here. Beta there.");
        let out = run(&doc, &StageContext::new()).unwrap();
        assert_eq!(out.stage, Stage::Segmented);
        assert_eq!(out.segments.len(), 2);
        assert_eq!(out.segments[0].text, "Alpha here.");
        assert_eq!(out.segments[1].text, "Beta there.");
        assert_eq!(out.segments[0].index, 0);
        assert!(out.segments[0].span.start < out.segments[1].span.start);
    }

    #[test]
    fn test_whitespace_only_text_fails() {
        let doc = Document::from_text("   \n  ");
        let err = run(&doc, &StageContext::new()).unwrap_err();
        assert!(err.to_string().contains("zero segments"));
    }

    #[test]
    fn test_segment_ids_are_deterministic() {
        let doc = Document::from_text("Alpha here. Beta there.");
        let a = run(&doc, &StageContext::new()).unwrap();
        let b = run(&doc, &StageContext::new()).unwrap();
        assert_eq!(a.segments[0].id, b.segments[0].id);
        assert_ne!(a.segments[0].id, a.segments[1].id);
    }
}
