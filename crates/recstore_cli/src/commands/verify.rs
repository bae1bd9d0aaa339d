//! Verify command implementation.

use super::open_existing;
use crate::error::{CliError, CliResult};
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Verification result.
#[derive(Debug, Serialize)]
pub struct VerifyResult {
    /// Number of live records walked.
    pub records_checked: u64,
    /// Number of free regions walked.
    pub free_regions_checked: u64,
    /// Every problem found.
    pub problems: Vec<String>,
}

/// Runs the verify command.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let engine = open_existing(path)?;
    let report = engine.verify()?;
    engine.close()?;

    let result = VerifyResult {
        records_checked: report.stats.record_count,
        free_regions_checked: report.stats.free_regions,
        problems: report.problems,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Verifying store at {:?}", path);
            println!();
            println!("  Records checked:      {}", result.records_checked);
            println!("  Free regions checked: {}", result.free_regions_checked);
            for problem in &result.problems {
                println!("  ERROR: {problem}");
            }
            println!();
            if result.problems.is_empty() {
                println!("✓ Store verification passed");
            } else {
                println!("✗ Store verification failed");
            }
        }
    }

    if result.problems.is_empty() {
        Ok(())
    } else {
        warn!(problems = result.problems.len(), "store verification failed");
        Err(CliError::VerificationFailed {
            problems: result.problems.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recstore_core::Engine;

    #[test]
    fn healthy_store_passes() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("store");
        let mut engine = Engine::open(&path).unwrap();
        for size in [1usize, 100, 3000] {
            let recid = engine.put(&vec![7; size]).unwrap();
            engine.update(recid, &vec![8; size / 2]).unwrap();
        }
        engine.commit().unwrap();
        engine.close().unwrap();

        assert!(run(&path, "text").is_ok());
        assert!(run(&path, "json").is_ok());
    }
}
