//! # recstore Testkit
//!
//! Test utilities for recstore.
//!
//! This crate provides:
//! - Temporary store fixtures
//! - Property-based test generators using proptest
//! - A reference model for checking operation sequences
//! - Crash simulation helpers
//! - Stress testing utilities for the write-behind pipeline
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recstore_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_temp_store(|store| {
//!         let recid = store.put(b"hello").unwrap();
//!         assert_eq!(store.get(recid).unwrap(), Some(b"hello".to_vec()));
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod model;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
    pub use crate::stress::*;
    pub use recstore_core::{RecordManager, RecordManagerExt};
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use model::*;
pub use stress::*;
