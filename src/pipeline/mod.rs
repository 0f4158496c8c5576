//! Stage registry and orchestrator.
//!
//! The registry is a fixed, ordered list of stages. Target resolution scans
//! it in order and stops at the FIRST entry whose target matches the
//! request, including the long-standing quirk that stage 09 (chunking)
//! declares target `heads_identified`: requesting `heads_identified` runs
//! through chunking only, `chunked` is not a valid target, and
//! head-identification runs only en route to `relations_extracted`.
//!
//! Around every stage the orchestrator runs schema validation and runtime
//! invariant validation, before and after, plus one entry pass and one
//! final pass. Any hook failure aborts the run with a phase-tagged error;
//! there is no partial output.

pub mod analyze;
pub mod canonicalize;
pub mod chunk;
pub mod context;
pub mod head;
pub mod mwe;
pub mod normalize;
pub mod relation;
pub mod segment;
pub mod tag;
pub mod tokenize;

pub use context::{RawToken, SentenceSplitter, StageContext, Tagger, Tokenizer};

use crate::document::{Document, Stage};
use crate::error::{Error, Result};
use crate::invariants::validate_invariants;
use crate::schema::validate_schema;
use serde_json::Value;

/// Stage function signature: pure `(document, context) → document`.
pub type StageFn = fn(&Document, &StageContext) -> Result<Document>;

/// One registry entry.
#[derive(Clone, Copy)]
pub struct StageDef {
    /// Position in the fixed order.
    pub index: u8,
    /// Stage name used in phase tags.
    pub name: &'static str,
    /// Target checkpoint this stage satisfies.
    pub target: &'static str,
    /// Stage marker the stage leaves on the document.
    pub produces: Stage,
    run: StageFn,
}

impl std::fmt::Debug for StageDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDef")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("target", &self.target)
            .finish()
    }
}

/// The fixed, ordered stage registry.
pub static REGISTRY: &[StageDef] = &[
    StageDef {
        index: 0,
        name: normalize::STAGE_NAME,
        target: "canonical",
        produces: Stage::Canonical,
        run: normalize::run,
    },
    StageDef {
        index: 1,
        name: canonicalize::STAGE_NAME,
        target: "canonical",
        produces: Stage::Canonical,
        run: canonicalize::run,
    },
    StageDef {
        index: 2,
        name: segment::STAGE_NAME,
        target: "segmented",
        produces: Stage::Segmented,
        run: segment::run,
    },
    StageDef {
        index: 3,
        name: tokenize::STAGE_NAME,
        target: "tokenized",
        produces: Stage::Tokenized,
        run: tokenize::run,
    },
    StageDef {
        index: 4,
        name: tag::STAGE_NAME,
        target: "pos_tagged",
        produces: Stage::PosTagged,
        run: tag::run,
    },
    StageDef {
        index: 5,
        name: mwe::extract::STAGE_NAME,
        target: "mwe_candidates",
        produces: Stage::MweCandidates,
        run: mwe::extract::run,
    },
    StageDef {
        index: 6,
        name: mwe::construct::STAGE_NAME,
        target: "mwe_constructed",
        produces: Stage::MweConstructed,
        run: mwe::construct::run,
    },
    StageDef {
        index: 7,
        name: mwe::materialize::STAGE_NAME,
        target: "mwe_materialized",
        produces: Stage::MweMaterialized,
        run: mwe::materialize::run,
    },
    StageDef {
        index: 8,
        name: analyze::STAGE_NAME,
        target: "analyzed",
        produces: Stage::Analyzed,
        run: analyze::run,
    },
    // Historical quirk, preserved deliberately: chunking already declares
    // the heads_identified target, so that name resolves here and stops.
    StageDef {
        index: 9,
        name: chunk::STAGE_NAME,
        target: "heads_identified",
        produces: Stage::Chunked,
        run: chunk::run,
    },
    StageDef {
        index: 10,
        name: head::STAGE_NAME,
        target: "heads_identified",
        produces: Stage::HeadsIdentified,
        run: head::run,
    },
    StageDef {
        index: 11,
        name: relation::STAGE_NAME,
        target: "relations_extracted",
        produces: Stage::RelationsExtracted,
        run: relation::run,
    },
];

/// Known target names, deduplicated in registry order.
#[must_use]
pub fn known_targets() -> Vec<&'static str> {
    let mut targets = Vec::new();
    for def in REGISTRY {
        if !targets.contains(&def.target) {
            targets.push(def.target);
        }
    }
    targets
}

/// Resolve a target name to the index of the FIRST matching registry entry.
pub fn resolve_target(target: &str) -> Result<usize> {
    REGISTRY
        .iter()
        .position(|def| def.target == target)
        .ok_or_else(|| Error::UnknownTarget {
            target: target.to_string(),
            known: known_targets().iter().map(ToString::to_string).collect(),
        })
}

/// Orchestrator options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Named pipeline checkpoint to run to.
    pub target: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            target: "relations_extracted".into(),
        }
    }
}

impl RunOptions {
    /// Options for a specific target.
    #[must_use]
    pub fn to_target(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

/// Pipeline input: raw text or a pre-existing (partial) document.
#[derive(Debug, Clone, Copy)]
pub enum PipelineInput<'a> {
    /// Raw text; becomes a seed document at stage `canonical`.
    Text(&'a str),
    /// An existing document, deep-cloned before any stage touches it.
    Document(&'a Document),
}

impl<'a> From<&'a str> for PipelineInput<'a> {
    fn from(text: &'a str) -> Self {
        PipelineInput::Text(text)
    }
}

impl<'a> From<&'a Document> for PipelineInput<'a> {
    fn from(doc: &'a Document) -> Self {
        PipelineInput::Document(doc)
    }
}

/// Run the pipeline to the requested target.
///
/// Hook sequence: `entry:schema` and `entry:invariants` once; per stage
/// `before:<name>:schema`, `before:<name>:invariants`, the stage function,
/// `after:<name>:schema`, `after:<name>:invariants`; then `final:schema`
/// and `final:invariants`. A failure at any hook aborts with a phase-tagged
/// error and no partial output.
///
/// A partial document resumes after the stages its `stage` marker shows as
/// complete; stages themselves still reject inconsistent input through
/// their one-way-door preconditions.
pub fn run<'a>(
    input: impl Into<PipelineInput<'a>>,
    options: &RunOptions,
    ctx: &StageContext,
) -> Result<Document> {
    let end = resolve_target(&options.target)?;
    let mut doc = match input.into() {
        PipelineInput::Text(text) => Document::from_text(text),
        PipelineInput::Document(existing) => existing.clone(),
    };

    hook("entry:schema", validate_schema(&doc))?;
    hook("entry:invariants", validate_invariants(&doc))?;

    let start = if doc.stage == Stage::Canonical {
        0
    } else {
        REGISTRY
            .iter()
            .position(|def| def.produces.rank() > doc.stage.rank())
            .unwrap_or(REGISTRY.len())
    };

    for def in REGISTRY.iter().take(end + 1).skip(start) {
        log::debug!("running stage {:02} {}", def.index, def.name);
        hook(format!("before:{}:schema", def.name), validate_schema(&doc))?;
        hook(
            format!("before:{}:invariants", def.name),
            validate_invariants(&doc),
        )?;
        doc = (def.run)(&doc, ctx)?;
        hook(format!("after:{}:schema", def.name), validate_schema(&doc))?;
        hook(
            format!("after:{}:invariants", def.name),
            validate_invariants(&doc),
        )?;
    }

    hook("final:schema", validate_schema(&doc))?;
    hook("final:invariants", validate_invariants(&doc))?;
    Ok(doc)
}

fn hook(phase: impl Into<String>, result: Result<()>) -> Result<()> {
    result.map_err(|e| Error::hook(phase, e))
}

// =============================================================================
// Shared stage preconditions
// =============================================================================

/// One-way-door violation: a stage found artifacts it is defined to produce.
pub(crate) fn one_way_door(stage: &str, message: &str, details: Value) -> Error {
    let mut details = details;
    if let Value::Object(map) = &mut details {
        map.insert("stage".into(), Value::String(stage.to_string()));
    }
    Error::invariant(format!("{stage}: {message}"), details)
}

/// Structural stages require a document with no structure at all.
pub(crate) fn ensure_unenriched(doc: &Document, stage: &str) -> Result<()> {
    if doc.segments.is_empty() && doc.tokens.is_empty() && doc.annotations.is_empty() {
        return Ok(());
    }
    Err(one_way_door(
        stage,
        "document already carries segments, tokens, or annotations",
        serde_json::json!({
            "segments": doc.segments.len(),
            "tokens": doc.tokens.len(),
            "annotations": doc.annotations.len(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_and_indices() {
        for (i, def) in REGISTRY.iter().enumerate() {
            assert_eq!(def.index as usize, i);
        }
        assert_eq!(REGISTRY.len(), 12);
    }

    #[test]
    fn test_known_targets_deduplicated() {
        let targets = known_targets();
        assert_eq!(
            targets,
            vec![
                "canonical",
                "segmented",
                "tokenized",
                "pos_tagged",
                "mwe_candidates",
                "mwe_constructed",
                "mwe_materialized",
                "analyzed",
                "heads_identified",
                "relations_extracted",
            ]
        );
    }

    #[test]
    fn test_unknown_target_fails_immediately() {
        let err = run(
            "Some text.",
            &RunOptions::to_target("chunked"),
            &StageContext::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownTarget { .. }));
    }

    #[test]
    fn test_heads_identified_resolves_to_chunking() {
        // First-match resolution: the quirk entry at index 9.
        assert_eq!(resolve_target("heads_identified").unwrap(), 9);
        assert_eq!(resolve_target("canonical").unwrap(), 0);
        assert_eq!(resolve_target("relations_extracted").unwrap(), 11);
    }

    #[test]
    fn test_run_to_relations() {
        let doc = run(
            "Alice sees Bob in Berlin.",
            &RunOptions::default(),
            &StageContext::new(),
        )
        .unwrap();
        assert_eq!(doc.stage, Stage::RelationsExtracted);
        assert!(!doc.annotations.is_empty());
    }

    #[test]
    fn test_partial_document_resumes() {
        let ctx = StageContext::new();
        let tokenized = run(
            "Alice sees Bob.",
            &RunOptions::to_target("tokenized"),
            &ctx,
        )
        .unwrap();
        assert_eq!(tokenized.stage, Stage::Tokenized);
        // Resuming from the tokenized document runs only later stages.
        let done = run(&tokenized, &RunOptions::default(), &ctx).unwrap();
        assert_eq!(done.stage, Stage::RelationsExtracted);
    }

    #[test]
    fn test_enriched_document_claiming_canonical_is_rejected() {
        let ctx = StageContext::new();
        let mut doc = run("Alice sees Bob.", &RunOptions::to_target("tokenized"), &ctx).unwrap();
        doc.stage = Stage::Canonical;
        let err = run(&doc, &RunOptions::default(), &ctx).unwrap_err();
        assert!(err.is_validation());
    }
}
