//! `enrich doctor`: probe the external runtime environment.

use crate::cli::parser::DoctorArgs;
use crate::error::Result;
use crate::runtime::{self, PythonRuntime};
use std::time::Duration;

/// Execute the doctor command. Returns the process exit code.
pub fn execute(args: &DoctorArgs) -> Result<i32> {
    let runtime = PythonRuntime {
        python_bin: args.python_bin.clone(),
        args: args
            .runtime_script
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
        timeout: Duration::from_secs(args.timeout_secs),
    };

    let findings = runtime::doctor(&runtime);
    let mut failed = 0;
    for finding in &findings {
        let mark = if finding.ok { "ok" } else { "FAIL" };
        println!("{mark:>4}  {}: {}", finding.check, finding.detail);
        if !finding.ok {
            failed += 1;
        }
    }
    if failed > 0 && args.strict {
        return Ok(1);
    }
    Ok(0)
}
