//! Stage 01: canonicalization.
//!
//! Newline normalization (CRLF/CR → LF) followed by Unicode NFC. Runs under
//! the same one-way-door as surface normalization: all downstream spans
//! point into this text, so it must never change once structure exists.

use crate::document::{Document, Stage};
use crate::error::Result;
use crate::pipeline::{ensure_unenriched, StageContext};
use unicode_normalization::UnicodeNormalization;

/// Registry name of this stage.
pub const STAGE_NAME: &str = "canonicalization";

/// Run canonicalization.
pub fn run(doc: &Document, _ctx: &StageContext) -> Result<Document> {
    ensure_unenriched(doc, STAGE_NAME)?;
    let mut out = doc.clone();
    out.canonical_text = canonicalize_text(&doc.canonical_text);
    out.stage = Stage::Canonical;
    Ok(out)
}

/// Normalize newlines to LF, then apply NFC.
#[must_use]
pub fn canonicalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    unified.nfc().collect()
}
