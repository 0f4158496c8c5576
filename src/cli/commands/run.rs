//! `enrich run`: pipeline over raw text or a partial document.

use crate::cli::output::{read_document, read_text, write_document};
use crate::cli::parser::RunArgs;
use crate::error::{Error, Result};
use crate::lexicon::{LexiconClient, LexiconConfig};
use crate::pipeline::{self, PipelineInput, RunOptions, StageContext};
use std::io::Write;

/// Execute the run command. Returns the process exit code.
pub fn execute(args: &RunArgs) -> Result<i32> {
    let mut ctx = StageContext::new();
    if let Some(endpoint) = &args.lexicon_endpoint {
        ctx.lexicon = Some(LexiconClient::new(LexiconConfig {
            endpoint: endpoint.clone(),
            timeout_ms: args.lexicon_timeout_ms,
            limit: 10,
        }));
    }
    let options = RunOptions::to_target(args.target.clone());

    let doc = match (&args.text, &args.input) {
        (Some(text), _) => pipeline::run(text.as_str(), &options, &ctx)?,
        (None, Some(path)) if args.resume => {
            let seed = read_document(path)?;
            pipeline::run(PipelineInput::Document(&seed), &options, &ctx)?
        }
        (None, Some(path)) => {
            let text = read_text(path)?;
            pipeline::run(text.as_str(), &options, &ctx)?
        }
        (None, None) => {
            return Err(Error::invalid_input("provide --text or --input"));
        }
    };

    match &args.output {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            write_document(&doc, args.pretty, &mut file)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write_document(&doc, args.pretty, &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(0)
}
