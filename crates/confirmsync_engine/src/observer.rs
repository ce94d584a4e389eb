//! Observer hooks for engine outcomes.
//!
//! The engine never renders anything itself: loads, saves and failures are
//! reported through a [`SyncObserver`] so the UI layer can show toasts or
//! banners.

use crate::error::SyncError;
use tokio::sync::mpsc;

/// Summary of one successful flush round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Site the batch was written for.
    pub site_id: String,
    /// Count reported by the remote store.
    pub updated_count: u64,
    /// Fields carried by the batch.
    pub fields: Vec<String>,
    /// Deltas staged while the batch was in flight.
    pub still_pending: usize,
}

/// Receives engine outcomes. All methods default to doing nothing.
pub trait SyncObserver: Send + Sync {
    /// Called after a load replaced the local annotations.
    fn on_loaded(&self, _site_id: &str, _count: usize) {}

    /// Called after a flush round was written.
    fn on_saved(&self, _report: &SaveReport) {}

    /// Called when a load or a flush fails.
    fn on_error(&self, _error: &SyncError) {}
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

/// An engine outcome, as delivered by [`ChannelObserver`].
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A load finished.
    Loaded {
        /// Site that was loaded.
        site_id: String,
        /// Number of annotations now cached.
        count: usize,
    },
    /// A flush round finished.
    Saved(SaveReport),
    /// A load or flush failed.
    Failed(SyncError),
}

/// Forwards engine outcomes into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelObserver {
    /// Creates an observer and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: SyncEvent) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

impl SyncObserver for ChannelObserver {
    fn on_loaded(&self, site_id: &str, count: usize) {
        self.emit(SyncEvent::Loaded {
            site_id: site_id.to_string(),
            count,
        });
    }

    fn on_saved(&self, report: &SaveReport) {
        self.emit(SyncEvent::Saved(report.clone()));
    }

    fn on_error(&self, error: &SyncError) {
        self.emit(SyncEvent::Failed(error.clone()));
    }
}
