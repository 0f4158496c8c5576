//! Structural schema validation.
//!
//! Checks the *shape* of a document: non-empty identifiers, well-formed
//! spans, anchors with at least one selector, bodies of the right JSON type.
//! Referential integrity and ordering live in [`crate::invariants`]; schema
//! languages cannot express those, and this module deliberately stays at the
//! level a JSON Schema could.
//!
//! Validation collects every issue before failing, so a single run reports
//! all structural problems at once.

use crate::annotation::AnnotationKind;
use crate::document::Document;
use crate::error::{Error, Result};
use serde_json::{json, Value};

/// One structural problem found during validation.
#[derive(Debug, Clone)]
pub struct SchemaIssue {
    /// Dotted path to the offending element, e.g. `tokens[3].surface`.
    pub path: String,
    /// What is wrong.
    pub message: String,
}

impl SchemaIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    fn to_value(&self) -> Value {
        json!({"path": self.path, "message": self.message})
    }
}

/// Validate the document's structural shape.
///
/// Pure check: never mutates, and running it twice on the same valid
/// document never errors.
pub fn validate_schema(doc: &Document) -> Result<()> {
    let issues = collect_issues(doc);
    if issues.is_empty() {
        return Ok(());
    }
    let details = json!({
        "count": issues.len(),
        "issues": issues.iter().map(SchemaIssue::to_value).collect::<Vec<_>>(),
    });
    Err(Error::schema(
        format!(
            "{} structural issue(s), first: {} at {}",
            issues.len(),
            issues[0].message,
            issues[0].path
        ),
        details,
    ))
}

/// Collect all structural issues without failing.
#[must_use]
pub fn collect_issues(doc: &Document) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();

    for (idx, segment) in doc.segments.iter().enumerate() {
        let path = format!("segments[{idx}]");
        if segment.id.is_empty() {
            issues.push(SchemaIssue::new(format!("{path}.id"), "empty id"));
        }
        if segment.text.is_empty() {
            issues.push(SchemaIssue::new(format!("{path}.text"), "empty text"));
        }
        if segment.span.start > segment.span.end {
            issues.push(SchemaIssue::new(
                format!("{path}.span"),
                "span start exceeds end",
            ));
        }
        if let Some(range) = segment.token_range {
            if range.start > range.end {
                issues.push(SchemaIssue::new(
                    format!("{path}.token_range"),
                    "range start exceeds end",
                ));
            }
        }
    }

    for (idx, token) in doc.tokens.iter().enumerate() {
        let path = format!("tokens[{idx}]");
        if token.id.is_empty() {
            issues.push(SchemaIssue::new(format!("{path}.id"), "empty id"));
        }
        if token.segment_id.is_empty() {
            issues.push(SchemaIssue::new(format!("{path}.segment_id"), "empty id"));
        }
        if token.surface.is_empty() {
            issues.push(SchemaIssue::new(format!("{path}.surface"), "empty surface"));
        }
        if token.span.start > token.span.end {
            issues.push(SchemaIssue::new(
                format!("{path}.span"),
                "span start exceeds end",
            ));
        }
        if let Some(pos) = &token.pos {
            if pos.tag.is_empty() {
                issues.push(SchemaIssue::new(format!("{path}.pos.tag"), "empty tag"));
            }
        }
    }

    for (idx, ann) in doc.annotations.iter().enumerate() {
        let path = format!("annotations[{idx}]");
        if ann.id.is_empty() {
            issues.push(SchemaIssue::new(format!("{path}.id"), "empty id"));
        }
        if ann.anchor.selectors.is_empty() {
            issues.push(SchemaIssue::new(
                format!("{path}.anchor"),
                "no selectors",
            ));
        }
        if let Some(token_ids) = ann.anchor.token_ids() {
            if token_ids.is_empty() {
                issues.push(SchemaIssue::new(
                    format!("{path}.anchor"),
                    "empty token selector",
                ));
            }
        }
        if let Some(span) = ann.anchor.span() {
            if span.start > span.end {
                issues.push(SchemaIssue::new(
                    format!("{path}.anchor"),
                    "span start exceeds end",
                ));
            }
        }
        for (sidx, source) in ann.sources.iter().enumerate() {
            if source.name.is_empty() {
                issues.push(SchemaIssue::new(
                    format!("{path}.sources[{sidx}].name"),
                    "empty name",
                ));
            }
            if source.kind.is_empty() {
                issues.push(SchemaIssue::new(
                    format!("{path}.sources[{sidx}].kind"),
                    "empty kind",
                ));
            }
        }
        // Structured kinds carry object bodies.
        let needs_object_body = matches!(
            ann.kind,
            AnnotationKind::Dependency | AnnotationKind::Chunk | AnnotationKind::ChunkHead
        );
        if needs_object_body && !ann.body.is_object() {
            issues.push(SchemaIssue::new(
                format!("{path}.body"),
                "expected object body",
            ));
        }
    }

    issues
}
