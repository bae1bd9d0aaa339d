//! Inspect command implementation.

use super::{format_size, open_existing};
use crate::error::CliResult;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// On-disk format version.
    pub format_version: u16,
    /// Segment size in bytes.
    pub segment_size: u64,
    /// Index file size in bytes.
    pub index_file_size: u64,
    /// Data file size in bytes.
    pub data_file_size: u64,
    /// Log file size in bytes.
    pub log_file_size: u64,
    /// Logical size of the record index.
    pub index_size: u64,
    /// Logical size of the physical space.
    pub phys_size: u64,
    /// Number of live records.
    pub record_count: u64,
    /// Payload bytes held by live records.
    pub live_bytes: u64,
    /// Bytes in free regions.
    pub free_bytes: u64,
    /// Number of free regions.
    pub free_regions: u64,
    /// Number of free-list pages.
    pub stack_pages: u64,
    /// Recids waiting for reuse.
    pub free_recids: u64,
    /// Number of named roots.
    pub named_roots: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let engine = open_existing(path)?;
    let stats = engine.stats()?;
    let named = engine.named_roots()?;

    let file_size = |name: &str| fs::metadata(path.join(name)).map(|m| m.len()).unwrap_or(0);

    let result = InspectResult {
        path: path.display().to_string(),
        format_version: recstore_core::layout::FORMAT_VERSION,
        segment_size: engine.segment_size(),
        index_file_size: file_size("index.rst"),
        data_file_size: file_size("data.rst"),
        log_file_size: file_size("journal.rst"),
        index_size: stats.index_size,
        phys_size: stats.phys_size,
        record_count: stats.record_count,
        live_bytes: stats.live_bytes,
        free_bytes: stats.free_bytes,
        free_regions: stats.free_regions,
        stack_pages: stats.stack_pages,
        free_recids: stats.free_recids,
        named_roots: named.len(),
    };
    engine.close()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("recstore Inspection");
    println!("===================");
    println!();
    println!("Path:           {}", result.path);
    println!("Format version: {}", result.format_version);
    println!("Segment size:   {}", format_size(result.segment_size));
    println!();
    println!("Files:");
    println!("  index.rst:   {}", format_size(result.index_file_size));
    println!("  data.rst:    {}", format_size(result.data_file_size));
    println!("  journal.rst: {}", format_size(result.log_file_size));
    println!();
    println!("Spaces:");
    println!("  Index size:    {} bytes", result.index_size);
    println!("  Physical size: {} bytes", result.phys_size);
    println!();
    println!("Records:");
    println!("  Live records: {}", result.record_count);
    println!("  Live bytes:   {}", format_size(result.live_bytes));
    println!("  Named roots:  {}", result.named_roots);
    println!();
    println!("Free space:");
    println!(
        "  {} regions, {} ({} stack pages)",
        result.free_regions,
        format_size(result.free_bytes),
        result.stack_pages
    );
    println!("  Reusable recids: {}", result.free_recids);
}

#[cfg(test)]
mod tests {
    use super::*;
    use recstore_core::{Config, Engine};

    #[test]
    fn inspects_store_with_custom_segments() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("store");
        let mut engine =
            Engine::open_with_config(&path, Config::default().segment_shift(17)).unwrap();
        engine.put(b"inspected").unwrap();
        engine.commit().unwrap();
        engine.close().unwrap();

        assert!(run(&path, "text").is_ok());
        assert!(run(&path, "json").is_ok());
        assert!(run(&temp.path().join("absent"), "text").is_err());
    }
}
