//! Stage 04: POS tagging.
//!
//! Wraps the [`Tagger`] seam, then applies the possessive disambiguation
//! override: external taggers are unreliable on `'s`/bare-apostrophe tokens
//! with sparse local context, so the stage re-tags them from the
//! neighbouring tags itself.
//!
//! The default [`HeuristicTagger`] is a closed-class lexicon plus suffix and
//! capitalization rules over the Penn Treebank tag set. It is deliberately
//! small; callers wanting a real tagger inject one through the seam.

use crate::document::{Document, PosInfo, Stage};
use crate::error::{Error, Result};
use crate::pipeline::{one_way_door, StageContext, Tagger};
use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::HashMap;

/// Registry name of this stage.
pub const STAGE_NAME: &str = "pos-tagging";

/// Apostrophe-variant surfaces subject to the possessive override.
const POSSESSIVE_SURFACES: &[&str] = &["'s", "\u{2019}s", "'", "\u{2019}"];

/// Run POS tagging.
pub fn run(doc: &Document, ctx: &StageContext) -> Result<Document> {
    if doc.tokens.is_empty() {
        return Err(Error::invariant(
            "pos tagging requires tokens",
            json!({"stage": STAGE_NAME}),
        ));
    }
    let tagged: Vec<&str> = doc
        .tokens
        .iter()
        .filter(|t| t.pos.is_some())
        .map(|t| t.id.as_str())
        .collect();
    if !tagged.is_empty() {
        return Err(one_way_door(
            STAGE_NAME,
            "document already carries POS tags",
            json!({"tagged": tagged.len(), "first": tagged[0]}),
        ));
    }

    let mut out = doc.clone();
    for segment in &doc.segments {
        let range = match segment.token_range {
            Some(r) => r,
            None => continue,
        };
        let surfaces: Vec<&str> = doc.tokens[range.start..range.end]
            .iter()
            .map(|t| t.surface.as_str())
            .collect();
        let mut tags = ctx.tagger.tag(&surfaces);
        if tags.len() != surfaces.len() {
            return Err(Error::invariant(
                "tagger returned wrong tag count",
                json!({
                    "stage": STAGE_NAME,
                    "segment": segment.id,
                    "expected": surfaces.len(),
                    "got": tags.len(),
                }),
            ));
        }
        apply_possessive_override(&surfaces, &mut tags);
        for (offset, tag) in tags.into_iter().enumerate() {
            out.tokens[range.start + offset].pos = Some(PosInfo::from_tag(tag));
        }
    }
    out.stage = Stage::PosTagged;
    Ok(out)
}

/// Possessive disambiguation: an apostrophe-variant token is `POS` only when
/// flanked by a noun on the left and a noun/adjective/determiner on the
/// right; an existing `POS` elsewhere is corrected to `VBZ`.
pub fn apply_possessive_override(surfaces: &[&str], tags: &mut [String]) {
    for idx in 0..surfaces.len() {
        if !POSSESSIVE_SURFACES.contains(&surfaces[idx]) {
            continue;
        }
        let prev_noun = idx > 0 && tags[idx - 1].starts_with("NN");
        let next_nominal = idx + 1 < surfaces.len()
            && (tags[idx + 1].starts_with("NN")
                || tags[idx + 1].starts_with("JJ")
                || tags[idx + 1] == "DT");
        if prev_noun && next_nominal {
            tags[idx] = "POS".into();
        } else if tags[idx] == "POS" {
            tags[idx] = "VBZ".into();
        }
    }
}

// =============================================================================
// HeuristicTagger: default closed-class + suffix tagger
// =============================================================================

/// Closed-class lexicon: surface → PTB tag.
static LEXICON: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for word in [
        "the", "a", "an", "this", "that", "these", "those", "every", "each", "all", "some",
        "no", "any", "both", "either", "neither", "another",
    ] {
        m.insert(word, "DT");
    }
    for word in [
        "in", "on", "at", "by", "for", "with", "from", "of", "about", "into", "over", "under",
        "between", "through", "during", "before", "after", "against", "within", "without",
        "toward", "towards", "near", "across", "along", "behind", "beside", "beyond", "inside",
        "outside", "until", "since", "upon", "via", "per", "than", "as", "off", "onto",
        "around", "among", "despite", "regarding",
    ] {
        m.insert(word, "IN");
    }
    for word in ["i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them"] {
        m.insert(word, "PRP");
    }
    for word in ["my", "your", "his", "its", "our", "their"] {
        m.insert(word, "PRP$");
    }
    for word in ["and", "or", "but", "nor", "yet"] {
        m.insert(word, "CC");
    }
    for word in ["can", "could", "will", "would", "shall", "should", "may", "might", "must"] {
        m.insert(word, "MD");
    }
    for (word, tag) in [
        ("is", "VBZ"),
        ("am", "VBP"),
        ("are", "VBP"),
        ("was", "VBD"),
        ("were", "VBD"),
        ("be", "VB"),
        ("been", "VBN"),
        ("being", "VBG"),
        ("has", "VBZ"),
        ("have", "VBP"),
        ("had", "VBD"),
        ("do", "VBP"),
        ("does", "VBZ"),
        ("did", "VBD"),
    ] {
        m.insert(word, tag);
    }
    for word in [
        "not", "n't", "never", "very", "also", "only", "here", "there", "now", "then",
        "often", "always", "again", "too", "quite", "rather", "soon",
    ] {
        m.insert(word, "RB");
    }
    for (word, tag) in [
        ("who", "WP"),
        ("whom", "WP"),
        ("what", "WP"),
        ("which", "WDT"),
        ("whose", "WP$"),
        ("when", "WRB"),
        ("where", "WRB"),
        ("why", "WRB"),
        ("how", "WRB"),
    ] {
        m.insert(word, tag);
    }
    for word in ["bigger", "larger", "smaller", "better", "worse", "greater", "higher", "lower", "faster", "slower", "earlier", "later"] {
        m.insert(word, "JJR");
    }
    for word in ["good", "bad", "new", "old", "big", "small", "large", "long", "short", "high", "low", "early", "late", "happy", "ready", "available", "important", "recent", "common", "public", "full", "free", "clear", "easy", "strong", "whole", "certain", "quick"] {
        m.insert(word, "JJ");
    }
    for word in [
        "went", "met", "saw", "ran", "made", "took", "got", "gave", "found", "told", "said",
        "came", "left", "kept", "held", "brought", "began", "knew", "became", "sent", "built",
        "won", "lost", "sold", "bought", "paid", "spent", "wrote", "spoke", "grew",
    ] {
        m.insert(word, "VBD");
    }
    for word in [
        "go", "see", "take", "give", "tell", "know", "come", "leave", "bring", "send", "meet",
        "buy", "sell", "pay", "spend", "write", "speak", "grow", "stay", "happen",
    ] {
        m.insert(word, "VB");
    }
    m.insert("to", "TO");
    m.insert("up", "RP");
    m.insert("down", "RP");
    m.insert("out", "RP");
    m
});

/// Punctuation surface → PTB tag.
fn punct_tag(surface: &str) -> Option<&'static str> {
    Some(match surface {
        "." | "!" | "?" | "\u{2026}" => ".",
        s if s.chars().all(|c| c == '.') => ".",
        "," => ",",
        ";" | ":" => ":",
        "(" => "-LRB-",
        ")" => "-RRB-",
        "-" | "\u{2013}" | "\u{2014}" => "HYPH",
        "\"" | "\u{201C}" | "\u{201D}" | "'" | "\u{2019}" | "`" | "``" | "''" => "''",
        s if !s.chars().any(char::is_alphanumeric) => "SYM",
        _ => return None,
    })
}

/// Default [`Tagger`]: closed-class lexicon, suffix rules, capitalization.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicTagger;

impl HeuristicTagger {
    /// Create the default tagger.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn tag_one(surface: &str, prev_tag: Option<&str>) -> String {
        if surface == "'s" || surface == "\u{2019}s" {
            return "POS".into();
        }
        let lower = surface.to_lowercase();
        if let Some(tag) = LEXICON.get(lower.as_str()) {
            return (*tag).to_string();
        }
        if let Some(tag) = punct_tag(surface) {
            return tag.to_string();
        }
        if surface.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
            && surface.chars().any(|c| c.is_ascii_digit())
        {
            return "CD".into();
        }
        // Capitalized unknown words read as proper nouns; the closed-class
        // lexicon above has already claimed capitalized function words.
        if surface.chars().next().is_some_and(char::is_uppercase) && !ends_verbal_s(&lower, prev_tag)
        {
            return "NNP".into();
        }
        if lower.ends_with("ly") {
            return "RB".into();
        }
        if lower.ends_with("ing") && lower.len() > 4 {
            return "VBG".into();
        }
        if lower.ends_with("ed") && lower.len() > 3 {
            return match prev_tag {
                Some(t) if t.starts_with("VB") || t == "MD" => "VBN".into(),
                _ => "VBD".into(),
            };
        }
        if lower.ends_with("est") && lower.len() > 4 {
            return "JJS".into();
        }
        for suffix in ["ous", "ful", "ive", "able", "ible", "ical"] {
            if lower.ends_with(suffix) {
                return "JJ".into();
            }
        }
        if ends_verbal_s(&lower, prev_tag) {
            return "VBZ".into();
        }
        if lower.ends_with('s') && !lower.ends_with("ss") && lower.len() > 2 {
            return "NNS".into();
        }
        "NN".into()
    }
}

/// A word ending in `-s` after a subject-like tag reads as a present-tense
/// verb rather than a plural noun.
fn ends_verbal_s(lower: &str, prev_tag: Option<&str>) -> bool {
    lower.ends_with('s')
        && !lower.ends_with("ss")
        && lower.len() > 2
        && matches!(prev_tag, Some("NNP" | "NNPS" | "PRP" | "NN" | "NNS"))
}

impl Tagger for HeuristicTagger {
    fn tag(&self, surfaces: &[&str]) -> Vec<String> {
        let mut tags: Vec<String> = Vec::with_capacity(surfaces.len());
        for (i, surface) in surfaces.iter().enumerate() {
            let prev = if i > 0 { Some(tags[i - 1].as_str()) } else { None };
            tags.push(Self::tag_one(surface, prev));
        }
        tags
    }
}

// =============================================================================
// LookupTagger: fixture tagger for tests and controlled runs
// =============================================================================

/// Tags by exact surface lookup with a fallback. Useful when a test needs
/// full control over the tag sequence.
#[derive(Debug, Clone)]
pub struct LookupTagger {
    map: HashMap<String, String>,
    fallback: String,
}

impl LookupTagger {
    /// Build from `(surface, tag)` pairs; unknown surfaces get `fallback`.
    #[must_use]
    pub fn new(pairs: &[(&str, &str)], fallback: &str) -> Self {
        Self {
            map: pairs
                .iter()
                .map(|(s, t)| ((*s).to_string(), (*t).to_string()))
                .collect(),
            fallback: fallback.to_string(),
        }
    }
}

impl Tagger for LookupTagger {
    fn tag(&self, surfaces: &[&str]) -> Vec<String> {
        surfaces
            .iter()
            .map(|s| self.map.get(*s).cloned().unwrap_or_else(|| self.fallback.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::CoarsePos;
    use crate::pipeline::{segment, tokenize};

    fn tag_sentence(text: &str) -> Vec<(String, String)> {
        let doc = Document::from_text(text);
        let ctx = StageContext::new();
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = tokenize::run(&doc, &ctx).unwrap();
        let doc = run(&doc, &ctx).unwrap();
        doc.tokens
            .into_iter()
            .map(|t| (t.surface, t.pos.unwrap().tag))
            .collect()
    }

    #[test]
    fn test_basic_sentence() {
        let tagged = tag_sentence("Alice sees Bob in Berlin.");
        let tags: Vec<&str> = tagged.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(tags, vec!["NNP", "VBZ", "NNP", "IN", "NNP", "."]);
    }

    #[test]
    fn test_determiner_noun() {
        let tagged = tag_sentence("The engine started.");
        let tags: Vec<&str> = tagged.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(tags, vec!["DT", "NN", "VBD", "."]);
    }

    #[test]
    fn test_possessive_override_keeps_pos_between_nouns() {
        let tagged = tag_sentence("Alice's dog barked.");
        assert_eq!(tagged[1], ("'s".to_string(), "POS".to_string()));
    }

    #[test]
    fn test_possessive_override_corrects_to_vbz() {
        // Before a verb the apostrophe-s is a contraction of "is", not POS.
        let mut tags: Vec<String> = vec!["NNP".into(), "POS".into(), "VBG".into()];
        apply_possessive_override(&["Alice", "'s", "going"], &mut tags);
        assert_eq!(tags[1], "VBZ");
    }

    #[test]
    fn test_coarse_classes_assigned() {
        let doc = Document::from_text("She quickly ran home.");
        let ctx = StageContext::new();
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = tokenize::run(&doc, &ctx).unwrap();
        let doc = run(&doc, &ctx).unwrap();
        assert_eq!(doc.tokens[0].coarse(), Some(CoarsePos::Pron));
        assert_eq!(doc.tokens[1].coarse(), Some(CoarsePos::Adv));
        assert_eq!(doc.stage, Stage::PosTagged);
    }

    #[test]
    fn test_one_way_door_rejects_tagged_input() {
        let doc = Document::from_text("Alice sees Bob.");
        let ctx = StageContext::new();
        let doc = segment::run(&doc, &ctx).unwrap();
        let doc = tokenize::run(&doc, &ctx).unwrap();
        let doc = run(&doc, &ctx).unwrap();
        let err = run(&doc, &ctx).unwrap_err();
        assert!(err.to_string().contains("already carries POS tags"));
    }

    #[test]
    fn test_lookup_tagger_controls_tags() {
        let tagger = LookupTagger::new(&[("Ships", "VBZ"), ("to", "TO"), ("Berlin", "NNP")], "NN");
        assert_eq!(
            tagger.tag(&["Ships", "to", "Berlin"]),
            vec!["VBZ", "TO", "NNP"]
        );
    }

    #[test]
    fn test_modal_tagged_md() {
        let tagged = tag_sentence("They must leave.");
        assert_eq!(tagged[1].1, "MD");
    }
}
