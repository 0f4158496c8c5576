//! Multiword-expression pipeline: extraction → construction → materialization.
//!
//! Three stages with a monotonic status progression: extraction proposes
//! `candidate` annotations from fixed POS-sequence patterns, construction
//! deduplicates and enriches them, materialization promotes survivors to
//! `accepted` (or demotes them to `observation`).

pub mod construct;
pub mod extract;
pub mod materialize;
pub mod patterns;

use crate::document::Token;

/// Canonical key for a token-id set: ids joined in document order.
#[must_use]
pub fn token_key(token_ids: &[String]) -> String {
    token_ids.join("+")
}

/// Candidate label: surfaces of non-determiner tokens joined by spaces.
#[must_use]
pub fn candidate_label(tokens: &[&Token]) -> String {
    let parts: Vec<&str> = tokens
        .iter()
        .filter(|t| t.tag() != Some("DT"))
        .map(|t| t.surface.as_str())
        .collect();
    parts.join(" ")
}
