//! Dump log command implementation.
//!
//! Reads the transaction log without opening the engine, since opening
//! replays or discards whatever the log holds.

use super::existing_config;
use crate::error::{CliError, CliResult};
use recstore_core::layout::{check_header, HEADER_SIZE, LOG_MAGIC};
use recstore_core::log::{LogEntry, LogReader};
use recstore_core::{StoreDir, StoreError};
use recstore_storage::SegmentedSpace;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Log entry representation for output.
#[derive(Debug, Serialize)]
pub struct LogEntryInfo {
    /// Offset in the log file.
    pub offset: u64,
    /// Entry type.
    pub entry_type: String,
    /// Target offset (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u64>,
    /// Written value (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    /// Payload size in bytes (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<usize>,
}

impl From<(u64, LogEntry)> for LogEntryInfo {
    fn from((position, entry): (u64, LogEntry)) -> Self {
        let (entry_type, target, value, payload_size) = match entry {
            LogEntry::WriteIndexLong { offset, value } => {
                ("WriteIndexLong", Some(offset), Some(value), None)
            }
            LogEntry::WriteIndexZero { offset } => ("WriteIndexZero", Some(offset), None, None),
            LogEntry::WritePhysLong { offset, value } => {
                ("WritePhysLong", Some(offset), Some(value), None)
            }
            LogEntry::WritePhysByte { offset, value } => {
                ("WritePhysByte", Some(offset), Some(u64::from(value)), None)
            }
            LogEntry::WritePhysArray { offset, data } => {
                ("WritePhysArray", Some(offset), None, Some(data.len()))
            }
            LogEntry::Seal => ("Seal", None, None, None),
        };
        Self {
            offset: position,
            entry_type: entry_type.to_string(),
            target,
            value,
            payload_size,
        }
    }
}

/// Runs the dump-log command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> CliResult<()> {
    let (entries, error) = read_entries(path, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            print_text_output(&entries);
        }
    }

    match error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Decodes up to `limit` log entries, stopping at the first undecodable one.
///
/// Entries read before a decode failure are returned together with the
/// failure.
fn read_entries(
    path: &Path,
    limit: Option<usize>,
) -> CliResult<(Vec<LogEntryInfo>, Option<StoreError>)> {
    let dir = StoreDir::open(path, false)?;
    let config = existing_config(&dir)?;
    let log_path = dir.log_path();

    if !log_path.exists() {
        return Err(CliError::LogNotFound { path: log_path });
    }

    let space = SegmentedSpace::open_file(&log_path, config.space_options())?;
    check_header(&space, LOG_MAGIC, "log")?;

    let max_entries = limit.unwrap_or(usize::MAX);
    let mut entries = Vec::new();
    let mut error = None;
    for item in LogReader::new(&space, HEADER_SIZE).take(max_entries) {
        match item {
            Ok(entry) => entries.push(LogEntryInfo::from(entry)),
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }
    debug!(entries = entries.len(), complete = error.is_none(), "decoded log");
    Ok((entries, error))
}

fn print_text_output(entries: &[LogEntryInfo]) {
    println!("Transaction Log Entries");
    println!("=======================");
    println!();

    if entries.is_empty() {
        println!("Log is empty");
        return;
    }

    for entry in entries {
        print!("[{:>10}] {:<15}", entry.offset, entry.entry_type);
        if let Some(target) = entry.target {
            print!(" at={target}");
        }
        if let Some(value) = entry.value {
            print!(" value={value:#x}");
        }
        if let Some(size) = entry.payload_size {
            print!(" len={size}");
        }
        println!();
    }

    let sealed = entries.last().is_some_and(|e| e.entry_type == "Seal");
    println!();
    println!(
        "{} entries, {}",
        entries.len(),
        if sealed { "sealed" } else { "not sealed" }
    );
}
