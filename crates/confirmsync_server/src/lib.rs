//! # ConfirmSync Server
//!
//! Reference annotation server for ConfirmSync.
//!
//! This crate provides:
//! - An in-memory, per-site annotation store
//! - Request handlers for fetch and bulk update
//! - Path routing for `GET /sites/{site}/field-confirmations` and
//!   `POST /sites/{site}/field-confirmations/bulk`
//!
//! # Write rules
//!
//! - Every stored annotation is normalized
//! - A stored `is_pre_filled` flag is never cleared by a write
//! - A bulk update may carry each field at most once

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;
mod store;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::{AnnotationServer, Route};
pub use store::AnnotationStore;
