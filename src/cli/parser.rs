//! CLI argument parsing and structure definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Deterministic linguistic annotation pipeline.
#[derive(Parser)]
#[command(name = "enrich")]
#[command(
    author,
    version,
    about = "Enrich raw text into a span-anchored linguistic annotation document",
    long_about = r#"
enrich - deterministic linguistic annotation pipeline

STAGES:
  surface-normalization → canonicalization → segmentation → tokenization
  → pos-tagging → mwe-extraction → mwe-construction → mwe-materialization
  → linguistic-analysis → chunking → head-identification → relation-extraction

EXAMPLES:
  enrich run -t "Alice sees Bob in Berlin."
  enrich run -i input.txt -o doc.json --pretty
  enrich run -t "Ships to Berlin" --target heads_identified
  enrich validate doc.json
  enrich doctor
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline over raw text or a partial document
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Validate a document file against schema and runtime invariants
    #[command(visible_alias = "v")]
    Validate(ValidateArgs),

    /// Probe the external runtime environment
    #[command(visible_alias = "d")]
    Doctor(DoctorArgs),
}

/// Arguments for `enrich run`.
#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Text to enrich (mutually exclusive with --input)
    #[arg(short, long)]
    pub text: Option<String>,

    /// Input file: raw text, or a partial document JSON with --resume
    #[arg(short, long, conflicts_with = "text")]
    pub input: Option<PathBuf>,

    /// Treat the input file as a partial document JSON and resume it
    #[arg(long, requires = "input")]
    pub resume: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target pipeline checkpoint
    #[arg(long, default_value = "relations_extracted")]
    pub target: String,

    /// Pretty-print the output JSON
    #[arg(short, long)]
    pub pretty: bool,

    /// Lexicon service endpoint (disabled when absent)
    #[arg(long)]
    pub lexicon_endpoint: Option<String>,

    /// Lexicon per-call timeout in milliseconds
    #[arg(long, default_value_t = 1500)]
    pub lexicon_timeout_ms: u64,
}

/// Arguments for `enrich validate`.
#[derive(Debug, clap::Args)]
pub struct ValidateArgs {
    /// Document JSON file to validate
    pub input: PathBuf,
}

/// Arguments for `enrich doctor`.
#[derive(Debug, clap::Args)]
pub struct DoctorArgs {
    /// Python interpreter to probe
    #[arg(long, default_value = "python3")]
    pub python_bin: String,

    /// Runtime script passed to the interpreter for a protocol ping
    #[arg(long)]
    pub runtime_script: Option<PathBuf>,

    /// Hard timeout for the protocol probe, in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Exit non-zero when any check fails
    #[arg(long)]
    pub strict: bool,
}
