//! Fixed POS-sequence patterns for MWE extraction.
//!
//! Patterns are data, not code branches: each is a short sequence of
//! elements over coarse POS classes, some optional, some constrained to a
//! surface allow-list. The matcher in [`super::extract`] runs them with
//! backtracking over the optional elements.

use crate::document::{CoarsePos, Token};

/// One element of a pattern.
#[derive(Debug, Clone, Copy)]
pub struct PatternElement {
    /// Class the token must belong to.
    pub class: ElementClass,
    /// Whether the element may be skipped.
    pub optional: bool,
    /// When set, the token's lowercased surface must be in this list.
    pub surfaces: Option<&'static [&'static str]>,
}

/// Coarse classes pattern elements match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementClass {
    /// Common or proper noun.
    Noun,
    /// Proper noun only.
    ProperNoun,
    /// Adjective.
    Adj,
    /// Gerund (VBG).
    Gerund,
    /// Any verb tag.
    Verb,
    /// Determiner.
    Det,
    /// Preposition (IN).
    Prep,
    /// Infinitival `to`.
    To,
    /// Possessive marker (POS).
    Possessive,
    /// Cardinal number.
    Num,
    /// Verb particle (RP, or IN functioning as one).
    Particle,
}

impl ElementClass {
    /// Does `token` satisfy this class?
    #[must_use]
    pub fn matches(&self, token: &Token) -> bool {
        let tag = match token.tag() {
            Some(t) => t,
            None => return false,
        };
        match self {
            ElementClass::Noun => token.is_nounish(),
            ElementClass::ProperNoun => token.coarse() == Some(CoarsePos::ProperNoun),
            ElementClass::Adj => tag.starts_with("JJ"),
            ElementClass::Gerund => tag == "VBG",
            ElementClass::Verb => tag.starts_with("VB"),
            ElementClass::Det => tag == "DT",
            ElementClass::Prep => tag == "IN",
            ElementClass::To => tag == "TO",
            ElementClass::Possessive => tag == "POS",
            ElementClass::Num => tag == "CD",
            ElementClass::Particle => tag == "RP" || tag == "IN",
        }
    }
}

/// A named POS-sequence pattern.
#[derive(Debug, Clone, Copy)]
pub struct MwePattern {
    /// Stable pattern id, also the ordering key for ties.
    pub id: &'static str,
    /// Element sequence.
    pub elements: &'static [PatternElement],
    /// Verb-initial patterns get the weak-object semantic filter.
    pub verb_initial: bool,
}

const fn req(class: ElementClass) -> PatternElement {
    PatternElement {
        class,
        optional: false,
        surfaces: None,
    }
}

const fn opt(class: ElementClass) -> PatternElement {
    PatternElement {
        class,
        optional: true,
        surfaces: None,
    }
}

const fn req_surf(class: ElementClass, surfaces: &'static [&'static str]) -> PatternElement {
    PatternElement {
        class,
        optional: false,
        surfaces: Some(surfaces),
    }
}

const fn opt_surf(class: ElementClass, surfaces: &'static [&'static str]) -> PatternElement {
    PatternElement {
        class,
        optional: true,
        surfaces: Some(surfaces),
    }
}

/// Prepositions allowed inside the verb-object tail (`for`, `of`).
const TAIL_PREPS: &[&str] = &["for", "of"];

/// Second verbs allowed by `verb_to_verb`. Keeps the pattern from claiming
/// every `to V` sequence as an expression.
pub const VERB_TO_VERB_ALLOW: &[&str] = &[
    "be", "go", "do", "make", "have", "get", "take", "use", "run", "start", "stop", "continue",
];

/// The fixed pattern set, in priority order.
pub static PATTERNS: &[MwePattern] = &[
    MwePattern {
        id: "adj_noun",
        elements: &[req(ElementClass::Adj), req(ElementClass::Noun)],
        verb_initial: false,
    },
    MwePattern {
        id: "adj_noun_noun",
        elements: &[
            req(ElementClass::Adj),
            req(ElementClass::Noun),
            req(ElementClass::Noun),
        ],
        verb_initial: false,
    },
    MwePattern {
        id: "adj_adj_noun",
        elements: &[
            req(ElementClass::Adj),
            req(ElementClass::Adj),
            req(ElementClass::Noun),
        ],
        verb_initial: false,
    },
    MwePattern {
        id: "noun_noun",
        elements: &[req(ElementClass::Noun), req(ElementClass::Noun)],
        verb_initial: false,
    },
    MwePattern {
        id: "noun_noun_noun",
        elements: &[
            req(ElementClass::Noun),
            req(ElementClass::Noun),
            req(ElementClass::Noun),
        ],
        verb_initial: false,
    },
    MwePattern {
        id: "propn_propn",
        elements: &[req(ElementClass::ProperNoun), req(ElementClass::ProperNoun)],
        verb_initial: false,
    },
    MwePattern {
        id: "noun_pos_noun",
        elements: &[
            req(ElementClass::Noun),
            req(ElementClass::Possessive),
            req(ElementClass::Noun),
        ],
        verb_initial: false,
    },
    MwePattern {
        id: "noun_of_noun",
        elements: &[
            req(ElementClass::Noun),
            req_surf(ElementClass::Prep, &["of"]),
            req(ElementClass::Noun),
        ],
        verb_initial: false,
    },
    MwePattern {
        id: "gerund_noun",
        elements: &[req(ElementClass::Gerund), req(ElementClass::Noun)],
        verb_initial: false,
    },
    MwePattern {
        id: "num_noun",
        elements: &[req(ElementClass::Num), req(ElementClass::Noun)],
        verb_initial: false,
    },
    MwePattern {
        id: "verb_noun",
        elements: &[
            req(ElementClass::Verb),
            opt(ElementClass::Det),
            opt(ElementClass::Adj),
            req(ElementClass::Noun),
        ],
        verb_initial: true,
    },
    MwePattern {
        id: "verb_noun_prep_noun",
        elements: &[
            req(ElementClass::Verb),
            opt(ElementClass::Det),
            opt(ElementClass::Adj),
            req(ElementClass::Noun),
            opt_surf(ElementClass::Prep, TAIL_PREPS),
            opt(ElementClass::Noun),
        ],
        verb_initial: true,
    },
    MwePattern {
        id: "verb_prt_noun",
        elements: &[
            req(ElementClass::Verb),
            req_surf(ElementClass::Particle, &["up", "down", "out", "off", "in", "on"]),
            opt(ElementClass::Det),
            req(ElementClass::Noun),
        ],
        verb_initial: true,
    },
    MwePattern {
        id: "verb_to_verb",
        elements: &[
            req(ElementClass::Verb),
            req(ElementClass::To),
            req_surf(ElementClass::Verb, VERB_TO_VERB_ALLOW),
        ],
        verb_initial: true,
    },
];

/// Patterns whose matches behave as one nominal unit during chunking.
pub const NOMINAL_PATTERNS: &[&str] = &[
    "adj_noun",
    "adj_noun_noun",
    "adj_adj_noun",
    "noun_noun",
    "noun_noun_noun",
    "propn_propn",
    "noun_pos_noun",
    "noun_of_noun",
    "gerund_noun",
    "num_noun",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_count() {
        assert_eq!(PATTERNS.len(), 14);
    }

    #[test]
    fn test_ids_unique() {
        let mut ids: Vec<&str> = PATTERNS.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), PATTERNS.len());
    }

    #[test]
    fn test_pattern_lengths_bounded() {
        for pattern in PATTERNS {
            assert!(pattern.elements.len() <= 6, "{} too long", pattern.id);
            assert!(
                pattern.elements.iter().any(|e| !e.optional),
                "{} has no required elements",
                pattern.id
            );
        }
    }

    #[test]
    fn test_nominal_patterns_exist() {
        for id in NOMINAL_PATTERNS {
            assert!(PATTERNS.iter().any(|p| p.id == *id), "unknown pattern {id}");
        }
    }

    #[test]
    fn test_verb_initial_flag_matches_first_element() {
        for pattern in PATTERNS {
            let first_is_verb = pattern.elements[0].class == ElementClass::Verb;
            assert_eq!(first_is_verb, pattern.verb_initial, "{}", pattern.id);
        }
    }
}
