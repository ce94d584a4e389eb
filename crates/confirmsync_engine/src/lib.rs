//! # ConfirmSync Engine
//!
//! Client-side synchronization engine for field review annotations.
//!
//! This crate provides:
//! - A per-site annotation cache with optimistic updates
//! - Debounced, batched writes (idle → accumulating → flushing)
//! - A load guard that never lets a read overwrite a write in flight
//! - Remote store abstraction with HTTP and in-memory implementations
//! - Observer hooks for saves and failures
//!
//! ## Architecture
//!
//! Every mutation is applied to the local cache at once and staged in a
//! pending change set keyed by field name. A background worker waits for a
//! quiet period, takes the whole pending set and sends it as one bulk update.
//! Changes made while a batch is in flight accumulate and are written in a
//! follow-up round.
//!
//! ## Key Invariants
//!
//! - Flush rounds never overlap
//! - A load never overwrites the cache while a flush is in flight
//! - The local pending change for a field wins over a server echo
//! - Failed batches stay pending; retries follow user action only

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod http;
mod observer;
mod store;

pub use config::{EngineConfig, DEFAULT_DEBOUNCE};
pub use engine::{ConfirmationSyncEngine, EngineState, LoadOutcome, SyncStats};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpFailure, HttpRemoteStore, LoopbackClient, LoopbackServer};
pub use observer::{ChannelObserver, NoopObserver, SaveReport, SyncEvent, SyncObserver};
pub use store::{MemoryRemoteStore, RemoteStore};

pub use confirmsync_protocol::{FieldAnnotation, FlagName, LastSelected, ToggleOutcome};
