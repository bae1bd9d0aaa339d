//! # recstore Core
//!
//! Embedded persistent record store.
//!
//! This crate provides:
//! - A record index mapping recids to packed (size, offset) pointers
//! - A size-classed physical allocator with persistent free-list stacks
//! - A transaction log with seal-and-replay crash recovery
//! - The storage engine ([`Engine`]) and its thread-safe handle ([`Store`])
//! - The [`RecordManager`] contract consumed by collections
//! - A write-behind pipeline ([`WriteBehind`])
//!
//! ## Example
//!
//! ```rust
//! use recstore_core::{RecordManager, Store};
//!
//! let store = Store::open_in_memory()?;
//! let recid = store.put(b"hello")?;
//! store.update(recid, b"hi")?;
//! store.commit()?;
//! assert_eq!(store.get(recid)?, Some(b"hi".to_vec()));
//! # Ok::<(), recstore_core::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod engine;
mod error;
pub mod layout;
pub mod log;
mod manager;
mod named;
mod serializer;
mod store;
mod types;
mod write_behind;

pub use config::{Config, DEFAULT_WRITE_BEHIND_POOL};
pub use dir::StoreDir;
pub use engine::{Engine, StoreStats, VerifyReport};
pub use error::{StoreError, StoreResult};
pub use manager::{RecordManager, RecordManagerExt};
pub use named::{decode_table, encode_table, NamedRoots};
pub use serializer::{BytesSerializer, CborSerializer, Serializer, StringSerializer, U64Serializer};
pub use store::Store;
pub use types::{Recid, RecordPointer};
pub use write_behind::WriteBehind;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
