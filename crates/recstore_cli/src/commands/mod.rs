//! CLI command implementations.

pub mod dump_log;
pub mod get;
pub mod inspect;
pub mod named;
pub mod verify;

use crate::error::{CliError, CliResult};
use recstore_core::{Config, Engine, StoreDir};
use std::path::Path;
use tracing::debug;

/// Builds a configuration matching the segment shift an existing store was
/// created with.
pub fn existing_config(dir: &StoreDir) -> CliResult<Config> {
    let shift = dir
        .stored_segment_shift()?
        .ok_or_else(|| CliError::NoStore {
            path: dir.path().to_path_buf(),
        })?;
    debug!(path = ?dir.path(), segment_shift = shift, "read stored segment shift");
    Ok(Config::default()
        .create_if_missing(false)
        .segment_shift(shift))
}

/// Opens an existing store for inspection.
///
/// Opening recovers a sealed log left by an interrupted commit, the same as
/// any other open.
pub fn open_existing(path: &Path) -> CliResult<Engine> {
    let config = {
        let dir = StoreDir::open(path, false)?;
        existing_config(&dir)?
    };
    Ok(Engine::open_with_config(path, config)?)
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Hex-encodes bytes.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
