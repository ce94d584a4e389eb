//! # ConfirmSync Testkit
//!
//! Test utilities for ConfirmSync.
//!
//! This crate provides:
//! - Annotation fixtures and wire body builders
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```
//! use confirmsync_testkit::prelude::*;
//!
//! let website = annotation("website", true, true, false);
//! assert_consistent(&website);
//! assert_eq!(website, confirmed("website"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
