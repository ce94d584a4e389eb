//! # ConfirmSync Protocol
//!
//! Field annotation types and review rules for ConfirmSync.
//!
//! This crate provides:
//! - `FieldAnnotation`, the per-field review record
//! - The toggle and auto-mark rules that keep annotations consistent
//! - `PendingChangeSet` for batching unflushed annotation deltas
//! - Remote store messages (fetch, bulk update) with JSON codecs
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - `is_confirmed` and `is_new_data` are never both set
//! - `is_pre_filled` is never cleared by a toggle
//! - `last_selected` names a set flag, or `none` when no flag is set

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod annotation;
mod error;
mod messages;
mod pending;

pub use annotation::{FieldAnnotation, FlagName, LastSelected, ToggleOutcome};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{BulkUpdateRequest, BulkUpdateResponse, FetchResponse};
pub use pending::PendingChangeSet;
