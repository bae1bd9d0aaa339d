//! Get command implementation.

use super::{open_existing, to_hex};
use crate::error::{CliError, CliResult};
use recstore_core::Recid;
use std::path::Path;

/// Runs the get command.
pub fn run(path: &Path, recid: u64, utf8: bool) -> CliResult<()> {
    let engine = open_existing(path)?;
    let record = engine.get(Recid::new(recid))?;
    engine.close()?;

    let Some(bytes) = record else {
        return Err(CliError::RecordNotFound { recid });
    };

    if utf8 {
        println!("{}", String::from_utf8_lossy(&bytes));
    } else {
        println!("{}", to_hex(&bytes));
    }
    Ok(())
}
