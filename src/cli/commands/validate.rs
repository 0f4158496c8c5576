//! `enrich validate`: schema and invariant validation of a document file.

use crate::cli::output::read_document;
use crate::cli::parser::ValidateArgs;
use crate::error::Result;
use crate::invariants;
use crate::schema;

/// Execute the validate command. Returns the process exit code.
pub fn execute(args: &ValidateArgs) -> Result<i32> {
    let doc = read_document(&args.input)?;

    let issues = schema::collect_issues(&doc);
    let violations = invariants::collect_violations(&doc);

    if issues.is_empty() && violations.is_empty() {
        println!(
            "ok: {} segment(s), {} token(s), {} annotation(s), stage {}",
            doc.segments.len(),
            doc.tokens.len(),
            doc.annotations.len(),
            doc.stage.as_str()
        );
        return Ok(0);
    }
    for issue in &issues {
        eprintln!("schema: {} at {}", issue.message, issue.path);
    }
    for violation in &violations {
        eprintln!("invariant: {} ({})", violation.message, violation.rule);
    }
    eprintln!(
        "{} schema issue(s), {} invariant violation(s)",
        issues.len(),
        violations.len()
    );
    Ok(1)
}
