//! Stage context: injected external collaborators.
//!
//! The sentence splitter, tokenizer, and POS tagger are consumed through
//! narrow trait seams with deterministic rule-based defaults; callers may
//! inject alternatives (a wrapped third-party tagger, a fixture tagger in
//! tests) without touching stage code. The optional lexicon client rides
//! along for best-effort MWE evidence.

use crate::lexicon::LexiconClient;
use std::fmt;

/// A raw token emitted by a [`Tokenizer`]: byte offsets into the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    /// Start byte offset (inclusive), relative to the tokenized text.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
    /// Surface form; must equal the input sliced by `start..end`.
    pub surface: String,
}

impl RawToken {
    /// Construct a raw token over `text`.
    #[must_use]
    pub fn new(text: &str, start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            surface: text[start..end].to_string(),
        }
    }
}

/// Splits text into raw sentence byte ranges.
///
/// Ranges may include surrounding whitespace; the segmentation stage trims
/// them and drops empty results.
pub trait SentenceSplitter: fmt::Debug {
    /// Byte ranges of sentence-like chunks, in order.
    fn split(&self, text: &str) -> Vec<(usize, usize)>;
}

/// Splits text into word/punctuation tokens.
pub trait Tokenizer: fmt::Debug {
    /// Raw tokens with byte offsets into `text`, in order.
    fn tokenize(&self, text: &str) -> Vec<RawToken>;
}

/// Assigns one Penn-Treebank tag per token surface.
///
/// Called once per segment with the segment's full surface sequence so
/// implementations can use local context.
pub trait Tagger: fmt::Debug {
    /// One PTB tag per input surface, same length as `surfaces`.
    fn tag(&self, surfaces: &[&str]) -> Vec<String>;
}

/// Collaborators available to every stage.
#[derive(Debug)]
pub struct StageContext {
    /// Sentence boundary seam (segmentation stage).
    pub splitter: Box<dyn SentenceSplitter>,
    /// Tokenizer seam (tokenization stage).
    pub tokenizer: Box<dyn Tokenizer>,
    /// POS tagger seam (tagging stage).
    pub tagger: Box<dyn Tagger>,
    /// Optional lexicon client (MWE construction); `None` disables lookups.
    pub lexicon: Option<LexiconClient>,
}

impl Default for StageContext {
    fn default() -> Self {
        Self {
            splitter: Box::new(crate::pipeline::segment::RuleSplitter),
            tokenizer: Box::new(crate::pipeline::tokenize::UnicodeTokenizer),
            tagger: Box::new(crate::pipeline::tag::HeuristicTagger::new()),
            lexicon: None,
        }
    }
}

impl StageContext {
    /// Context with all default collaborators and no lexicon.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a lexicon client.
    #[must_use]
    pub fn with_lexicon(mut self, client: LexiconClient) -> Self {
        self.lexicon = Some(client);
        self
    }

    /// Replace the tagger seam.
    #[must_use]
    pub fn with_tagger(mut self, tagger: Box<dyn Tagger>) -> Self {
        self.tagger = tagger;
        self
    }

    /// Replace the tokenizer seam.
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Replace the sentence splitter seam.
    #[must_use]
    pub fn with_splitter(mut self, splitter: Box<dyn SentenceSplitter>) -> Self {
        self.splitter = splitter;
        self
    }
}
