//! Remote store abstraction for annotation reads and writes.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use confirmsync_protocol::{BulkUpdateResponse, FieldAnnotation};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// A remote store holds the authoritative annotations of every site.
///
/// This trait abstracts the network layer, allowing for different implementations
/// (HTTP, in-memory for testing, etc.).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches every annotation of a site.
    async fn fetch(&self, site_id: &str) -> SyncResult<Vec<FieldAnnotation>>;

    /// Writes a batch of annotations and returns their stored state.
    async fn bulk_update(
        &self,
        site_id: &str,
        annotations: Vec<FieldAnnotation>,
    ) -> SyncResult<BulkUpdateResponse>;
}

#[async_trait]
impl<S: RemoteStore + ?Sized> RemoteStore for Arc<S> {
    async fn fetch(&self, site_id: &str) -> SyncResult<Vec<FieldAnnotation>> {
        (**self).fetch(site_id).await
    }

    async fn bulk_update(
        &self,
        site_id: &str,
        annotations: Vec<FieldAnnotation>,
    ) -> SyncResult<BulkUpdateResponse> {
        (**self).bulk_update(site_id, annotations).await
    }
}

/// An in-memory remote store for testing.
///
/// Records every bulk update it receives, can fail a number of upcoming
/// calls, and can hold calls in flight until released.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    sites: Mutex<HashMap<String, BTreeMap<String, FieldAnnotation>>>,
    bulk_requests: Mutex<Vec<Vec<FieldAnnotation>>>,
    fetch_count: AtomicUsize,
    failing_reads: AtomicUsize,
    failing_writes: AtomicUsize,
    hold_reads: watch::Sender<bool>,
    hold_writes: watch::Sender<bool>,
}

impl MemoryRemoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            sites: Mutex::new(HashMap::new()),
            bulk_requests: Mutex::new(Vec::new()),
            fetch_count: AtomicUsize::new(0),
            failing_reads: AtomicUsize::new(0),
            failing_writes: AtomicUsize::new(0),
            hold_reads: watch::Sender::new(false),
            hold_writes: watch::Sender::new(false),
        }
    }

    /// Stores an annotation directly, as another reviewer would.
    pub fn seed(&self, site_id: &str, annotation: FieldAnnotation) {
        self.sites
            .lock()
            .entry(site_id.to_string())
            .or_default()
            .insert(annotation.field_name.clone(), annotation);
    }

    /// Returns the stored annotation of a field.
    pub fn stored(&self, site_id: &str, field_name: &str) -> Option<FieldAnnotation> {
        self.sites
            .lock()
            .get(site_id)
            .and_then(|fields| fields.get(field_name))
            .cloned()
    }

    /// Returns every bulk update received so far, including failed ones.
    pub fn bulk_requests(&self) -> Vec<Vec<FieldAnnotation>> {
        self.bulk_requests.lock().clone()
    }

    /// Returns the number of bulk updates received so far.
    pub fn bulk_count(&self) -> usize {
        self.bulk_requests.lock().len()
    }

    /// Returns the number of fetches received so far.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Fails the next `count` fetches.
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Fails the next `count` bulk updates.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Holds fetches in flight until [`MemoryRemoteStore::release_reads`].
    pub fn hold_reads(&self) {
        self.hold_reads.send_replace(true);
    }

    /// Lets held fetches complete.
    pub fn release_reads(&self) {
        self.hold_reads.send_replace(false);
    }

    /// Holds bulk updates in flight until [`MemoryRemoteStore::release_writes`].
    pub fn hold_writes(&self) {
        self.hold_writes.send_replace(true);
    }

    /// Lets held bulk updates complete.
    pub fn release_writes(&self) {
        self.hold_writes.send_replace(false);
    }

    async fn wait_released(gate: &watch::Sender<bool>) {
        let mut rx = gate.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|held| !*held).await;
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch(&self, site_id: &str) -> SyncResult<Vec<FieldAnnotation>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let snapshot: Vec<FieldAnnotation> = self
            .sites
            .lock()
            .get(site_id)
            .map(|fields| fields.values().cloned().collect())
            .unwrap_or_default();

        Self::wait_released(&self.hold_reads).await;

        if Self::take_failure(&self.failing_reads) {
            return Err(SyncError::transport_retryable("simulated read failure"));
        }
        Ok(snapshot)
    }

    async fn bulk_update(
        &self,
        site_id: &str,
        annotations: Vec<FieldAnnotation>,
    ) -> SyncResult<BulkUpdateResponse> {
        self.bulk_requests.lock().push(annotations.clone());

        Self::wait_released(&self.hold_writes).await;

        if Self::take_failure(&self.failing_writes) {
            return Err(SyncError::transport_retryable("simulated write failure"));
        }

        let mut sites = self.sites.lock();
        let fields = sites.entry(site_id.to_string()).or_default();
        let stored = annotations
            .into_iter()
            .map(|annotation| {
                let annotation = annotation.normalized();
                fields.insert(annotation.field_name.clone(), annotation.clone());
                annotation
            })
            .collect();

        Ok(BulkUpdateResponse::new(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confirmsync_protocol::FlagName;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryRemoteStore::new();
        let confirmed = FieldAnnotation::pre_filled("website")
            .toggle(FlagName::Confirmed)
            .into_annotation();

        let response = store
            .bulk_update("site-1", vec![confirmed.clone()])
            .await
            .unwrap();
        assert_eq!(response.updated_count, 1);
        assert_eq!(response.annotations, vec![confirmed.clone()]);

        let fetched = store.fetch("site-1").await.unwrap();
        assert_eq!(fetched, vec![confirmed]);
        assert!(store.fetch("site-2").await.unwrap().is_empty());
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn memory_store_scripted_failures() {
        let store = MemoryRemoteStore::new();
        store.fail_next_writes(1);

        let batch = vec![FieldAnnotation::pre_filled("phone")];
        let err = store.bulk_update("site-1", batch.clone()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.stored("site-1", "phone").is_none());

        store.bulk_update("site-1", batch).await.unwrap();
        assert!(store.stored("site-1", "phone").is_some());
        assert_eq!(store.bulk_count(), 2);

        store.fail_next_reads(1);
        assert!(store.fetch("site-1").await.is_err());
        assert!(store.fetch("site-1").await.is_ok());
    }

    #[tokio::test]
    async fn memory_store_holds_writes() {
        let store = Arc::new(MemoryRemoteStore::new());
        store.hold_writes();

        let task = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .bulk_update("site-1", vec![FieldAnnotation::pre_filled("email")])
                    .await
            })
        };

        tokio::task::yield_now().await;
        assert_eq!(store.bulk_count(), 1);
        assert!(store.stored("site-1", "email").is_none());

        store.release_writes();
        task.await.unwrap().unwrap();
        assert!(store.stored("site-1", "email").is_some());
    }
}
