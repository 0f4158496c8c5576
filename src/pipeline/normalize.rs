//! Stage 00: surface normalization.
//!
//! Tidies the raw text before any structure is built: trailing whitespace
//! trimmed per line, interior space/tab runs collapsed to a single space,
//! zero-width characters stripped. One-way-door: refuses documents that
//! already carry segments, tokens, or annotations, since re-normalizing
//! under existing spans would silently corrupt alignment.

use crate::document::{Document, Stage};
use crate::error::Result;
use crate::pipeline::{ensure_unenriched, StageContext};

/// Registry name of this stage.
pub const STAGE_NAME: &str = "surface-normalization";

/// Zero-width characters stripped from the surface.
const ZERO_WIDTH: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Run surface normalization.
pub fn run(doc: &Document, _ctx: &StageContext) -> Result<Document> {
    ensure_unenriched(doc, STAGE_NAME)?;
    let mut out = doc.clone();
    out.canonical_text = normalize_surface(&doc.canonical_text);
    out.stage = Stage::Canonical;
    Ok(out)
}

/// Normalize one text: per line, strip zero-width characters, collapse
/// space/tab runs, trim trailing whitespace.
#[must_use]
pub fn normalize_surface(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut first = true;
    for line in text.split('\n') {
        if !first {
            out.push('\n');
        }
        first = false;
        let mut pending_space = false;
        let mut line_out = String::with_capacity(line.len());
        for ch in line.chars() {
            if ZERO_WIDTH.contains(&ch) {
                continue;
            }
            if ch == ' ' || ch == '\t' {
                pending_space = true;
                continue;
            }
            if pending_space && !line_out.is_empty() {
                line_out.push(' ');
            }
            pending_space = false;
            line_out.push(ch);
        }
        out.push_str(&line_out);
    }
    out
}
