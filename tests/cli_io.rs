//! CLI command functions exercised through temp files.

use enrich::cli::output::{read_document, write_document};
use enrich::pipeline::{self, RunOptions, StageContext};
use std::io::Write;

#[test]
fn written_document_reads_back() {
    let doc = pipeline::run(
        "Alice sees Bob.",
        &RunOptions::default(),
        &StageContext::new(),
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.json");
    let mut file = std::fs::File::create(&path).unwrap();
    write_document(&doc, true, &mut file).unwrap();
    file.flush().unwrap();
    let back = read_document(&path).unwrap();
    assert_eq!(doc, back);
}

#[test]
fn resumed_document_file_completes_pipeline() {
    let ctx = StageContext::new();
    let partial = pipeline::run(
        "Alice sees Bob in Berlin.",
        &RunOptions::to_target("tokenized"),
        &ctx,
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.json");
    let mut file = std::fs::File::create(&path).unwrap();
    write_document(&partial, false, &mut file).unwrap();
    file.flush().unwrap();

    let seed = read_document(&path).unwrap();
    let done = pipeline::run(&seed, &RunOptions::default(), &ctx).unwrap();
    assert_eq!(done.stage, enrich::Stage::RelationsExtracted);
}

#[test]
fn corrupted_document_fails_validation() {
    let doc = pipeline::run(
        "Alice sees Bob.",
        &RunOptions::default(),
        &StageContext::new(),
    )
    .unwrap();
    let mut corrupted = doc.clone();
    corrupted.tokens[0].id = corrupted.tokens[1].id.clone();
    assert!(enrich::invariants::validate_invariants(&corrupted).is_err());
}
