//! # filemeta testkit
//!
//! Test utilities for filemeta:
//! - Temporary stores that clean up after themselves
//! - proptest strategies for records and key prefixes
//! - Concurrent load helpers for the store handle
//!
//! ```rust,ignore
//! use filemeta_testkit::prelude::*;
//!
//! #[test]
//! fn with_store() {
//!     with_temp_store(|db| {
//!         db.insert(sample_record(0)).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
