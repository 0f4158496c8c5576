//! # enrich
//!
//! Deterministic linguistic annotation pipeline: raw text in, a structured,
//! span-anchored annotation document out, through a fixed sequence of
//! stages: normalization, segmentation, tokenization, POS tagging,
//! multiword-expression detection, chunking, head identification, and
//! relation extraction.
//!
//! Design pillars:
//!
//! - **Seed document**: one immutable-per-stage [`Document`] value flows
//!   through the pipeline; each stage clones, enriches, and re-emits it.
//! - **Stage boundaries are consistency checkpoints**: schema and runtime
//!   invariant validation run before and after every stage.
//! - **One-way doors**: a stage refuses input that already carries its own
//!   output artifacts, so re-running can never silently corrupt spans.
//! - **Determinism**: content-addressed ids and fixed orderings make two
//!   runs over the same input byte-identical.
//!
//! ```
//! use enrich::pipeline::{self, RunOptions, StageContext};
//!
//! let doc = pipeline::run(
//!     "Alice sees Bob in Berlin.",
//!     &RunOptions::default(),
//!     &StageContext::new(),
//! )
//! .unwrap();
//! assert_eq!(doc.stage, enrich::Stage::RelationsExtracted);
//! ```

pub mod annotation;
pub mod document;
pub mod error;
pub mod ident;
pub mod invariants;
pub mod lexicon;
pub mod pipeline;
pub mod runtime;
pub mod schema;
pub mod span;

pub mod cli;

pub use annotation::{
    Anchor, Annotation, AnnotationKind, AnnotationStatus, ChunkBody, ChunkHeadBody,
    DependencyBody, HeadDecision, RelationBody, Selector, Source,
};
pub use document::{CoarsePos, Document, PosInfo, Segment, Stage, Token, TokenRange};
pub use error::{Error, Result};
pub use span::{IndexBasis, IndexUnit, OffsetTable, Span};
