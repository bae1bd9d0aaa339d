//! Transaction log.
//!
//! Every mutation of the index or data space is first appended to the log
//! as an absolute write. A commit appends a seal marker and then replays the
//! log into the primary spaces. On open, a sealed log is replayed again and
//! an unsealed one is discarded, so a transaction is applied either
//! completely or not at all.
//!
//! ## Layout
//!
//! ```text
//! | header (8) | entry | entry | ... | seal | 0 |
//! ```
//!
//! See [`LogEntry`] for the entry encoding.

mod entry;
mod reader;
mod writer;

pub use entry::{LogEntry, LogOpcode};
pub use reader::{replay, LogReader, ReplayOutcome};
pub use writer::TransactionLog;
