//! Field-confirmation sync engine.

use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::observer::{NoopObserver, SaveReport, SyncObserver};
use crate::store::RemoteStore;
use confirmsync_protocol::{
    FieldAnnotation, FlagName, PendingChangeSet, ProtocolError, ToggleOutcome,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Where the engine is in its write cycle.
///
/// `Idle -> Accumulating -> Flushing -> (Idle | Accumulating)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing pending, nothing in flight.
    Idle,
    /// Deltas are staged and a debounced flush is due.
    Accumulating,
    /// A batch is in flight; new deltas accumulate for the next round.
    Flushing,
}

impl EngineState {
    /// Returns true while a batch is in flight.
    pub fn is_saving(&self) -> bool {
        matches!(self, EngineState::Flushing)
    }
}

/// Statistics about engine activity.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Flush rounds written successfully.
    pub flushes: u64,
    /// Annotations the remote store reported as written.
    pub annotations_written: u64,
    /// Flush rounds that failed.
    pub failed_writes: u64,
    /// Loads applied to the cache.
    pub loads: u64,
    /// Loads that failed.
    pub failed_loads: u64,
    /// Loads discarded because a flush was in flight.
    pub skipped_loads: u64,
    /// Toggles rejected for unchecking `pre_filled` or a blank field name.
    pub rejected_mutations: u64,
    /// Last successful flush time.
    pub last_flush_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of [`ConfirmationSyncEngine::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The cache now mirrors the remote store; carries the annotation count.
    Loaded(usize),
    /// A flush was in flight, so the fetched data was discarded.
    Skipped,
}

struct Cache {
    annotations: HashMap<String, FieldAnnotation>,
    pending: PendingChangeSet,
    flushing: bool,
    /// Bumped every time a batch is taken for writing.
    flush_epoch: u64,
    loaded: bool,
}

impl Cache {
    fn state(&self) -> EngineState {
        if self.flushing {
            EngineState::Flushing
        } else if !self.pending.is_empty() {
            EngineState::Accumulating
        } else {
            EngineState::Idle
        }
    }

    fn apply(&mut self, annotation: FieldAnnotation) {
        self.annotations
            .insert(annotation.field_name.clone(), annotation.clone());
        self.pending.stage(annotation);
    }
}

struct Shared<S> {
    config: EngineConfig,
    store: S,
    observer: Arc<dyn SyncObserver>,
    cache: Mutex<Cache>,
    stats: RwLock<SyncStats>,
    /// Serializes flush rounds; held across the network call.
    flush_lock: tokio::sync::Mutex<()>,
    saving: watch::Sender<bool>,
    kicks: mpsc::UnboundedSender<()>,
}

impl<S: RemoteStore> Shared<S> {
    /// Bounds a read by the request timeout. Writes are never abandoned
    /// this way: a dropped bulk update may still be applied remotely.
    async fn bounded<T>(&self, call: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        match tokio::time::timeout(self.config.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout),
        }
    }

    fn record_error(&self, error: &SyncError) {
        self.stats.write().last_error = Some(error.to_string());
        self.observer.on_error(error);
    }

    /// Writes pending deltas until none are left or a write fails.
    ///
    /// Returns the number of annotations the store reported as written.
    async fn flush_cycle(&self) -> SyncResult<u64> {
        let _round = self.flush_lock.lock().await;
        let site_id = self.config.site_id.as_str();
        let mut written = 0u64;

        loop {
            let batch = {
                let mut cache = self.cache.lock();
                if cache.pending.is_empty() {
                    cache.flushing = false;
                    break;
                }
                cache.flushing = true;
                cache.flush_epoch += 1;
                cache.pending.take()
            };
            self.saving
                .send_if_modified(|saving| !std::mem::replace(saving, true));

            let fields: Vec<String> = batch.iter().map(|a| a.field_name.clone()).collect();
            debug!(site_id, fields = batch.len(), "flushing annotation batch");

            match self.store.bulk_update(site_id, batch.clone()).await {
                Ok(response) => {
                    let still_pending = {
                        let mut cache = self.cache.lock();
                        for annotation in response.annotations {
                            let annotation = annotation.normalized();
                            // A newer local click wins over the server's echo.
                            if !cache.pending.contains(&annotation.field_name) {
                                cache
                                    .annotations
                                    .insert(annotation.field_name.clone(), annotation);
                            }
                        }
                        cache.pending.len()
                    };

                    {
                        let mut stats = self.stats.write();
                        stats.flushes += 1;
                        stats.annotations_written += response.updated_count;
                        stats.last_flush_time = Some(Instant::now());
                        stats.last_error = None;
                    }
                    written += response.updated_count;

                    info!(
                        site_id,
                        updated = response.updated_count,
                        still_pending,
                        "annotation batch saved"
                    );
                    self.observer.on_saved(&SaveReport {
                        site_id: site_id.to_string(),
                        updated_count: response.updated_count,
                        fields,
                        still_pending,
                    });
                }
                Err(cause) => {
                    let error = SyncError::write(cause);
                    let restored = {
                        let mut cache = self.cache.lock();
                        cache.flushing = false;
                        cache.pending.restore(batch)
                    };
                    self.saving
                        .send_if_modified(|saving| std::mem::replace(saving, false));
                    self.stats.write().failed_writes += 1;

                    warn!(site_id, restored, %error, "annotation batch failed; kept pending");
                    self.record_error(&error);
                    return Err(error);
                }
            }
        }

        self.saving
            .send_if_modified(|saving| std::mem::replace(saving, false));
        Ok(written)
    }
}

/// Keeps a site's field annotations in a local cache and writes user changes
/// back to the remote store in debounced batches.
///
/// Mutations (`toggle`, `auto_mark_if_unset`) are applied to the cache
/// immediately and staged in a pending set. A background worker flushes the
/// pending set once no mutation arrived for [`EngineConfig::debounce`].
///
/// # Invariants
///
/// - At most one flush round is in flight at a time
/// - A batch is taken out of the pending set before it is sent
/// - A load never overwrites the cache while a flush is in flight
/// - A server echo never overwrites a field with a newer pending change
/// - Failed batches are kept pending; retries only follow a mutation or
///   [`ConfirmationSyncEngine::flush_now`]
pub struct ConfirmationSyncEngine<S: RemoteStore + 'static> {
    shared: Arc<Shared<S>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: RemoteStore + 'static> ConfirmationSyncEngine<S> {
    /// Creates a new engine that reports nothing.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(config: EngineConfig, store: S) -> Self {
        Self::with_observer(config, store, Arc::new(NoopObserver))
    }

    /// Creates a new engine reporting outcomes to `observer`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn with_observer(
        config: EngineConfig,
        store: S,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        let (kicks, kick_rx) = mpsc::unbounded_channel();
        let debounce = config.debounce;

        let shared = Arc::new(Shared {
            config,
            store,
            observer,
            cache: Mutex::new(Cache {
                annotations: HashMap::new(),
                pending: PendingChangeSet::new(),
                flushing: false,
                flush_epoch: 0,
                loaded: false,
            }),
            stats: RwLock::new(SyncStats::default()),
            flush_lock: tokio::sync::Mutex::new(()),
            saving: watch::Sender::new(false),
            kicks,
        });

        let worker = tokio::spawn(debounce_worker(Arc::downgrade(&shared), kick_rx, debounce));

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Returns the site this engine mirrors.
    pub fn site_id(&self) -> &str {
        &self.shared.config.site_id
    }

    /// Gets the current state.
    pub fn state(&self) -> EngineState {
        self.shared.cache.lock().state()
    }

    /// Returns true while a batch is in flight.
    pub fn is_saving(&self) -> bool {
        *self.shared.saving.borrow()
    }

    /// Watches the saving flag, e.g. to drive a spinner.
    pub fn subscribe_saving(&self) -> watch::Receiver<bool> {
        self.shared.saving.subscribe()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.read().clone()
    }

    /// Returns true once a load has been applied.
    pub fn is_loaded(&self) -> bool {
        self.shared.cache.lock().loaded
    }

    /// Returns the annotation of a field, if it has one.
    pub fn get_annotation(&self, field_name: &str) -> Option<FieldAnnotation> {
        self.shared.cache.lock().annotations.get(field_name).cloned()
    }

    /// Returns every cached annotation, sorted by field name.
    pub fn annotations(&self) -> Vec<FieldAnnotation> {
        let mut all: Vec<FieldAnnotation> =
            self.shared.cache.lock().annotations.values().cloned().collect();
        all.sort_by(|a, b| a.field_name.cmp(&b.field_name));
        all
    }

    /// Returns the number of deltas waiting for a flush.
    pub fn pending_count(&self) -> usize {
        self.shared.cache.lock().pending.len()
    }

    /// Returns true if deltas are waiting for a flush.
    pub fn has_pending(&self) -> bool {
        !self.shared.cache.lock().pending.is_empty()
    }

    /// Returns the staged delta of a field, if any.
    pub fn pending_annotation(&self, field_name: &str) -> Option<FieldAnnotation> {
        self.shared.cache.lock().pending.get(field_name).cloned()
    }

    /// Fetches the site's annotations and replaces the cache with them.
    ///
    /// The fetched data is discarded if a flush is in flight when the load
    /// starts or begins before the fetch returns. Fields with a pending
    /// local change keep their local state.
    #[instrument(skip(self), fields(site_id = %self.shared.config.site_id))]
    pub async fn load(&self) -> SyncResult<LoadOutcome> {
        let shared = &self.shared;
        let epoch = {
            let cache = shared.cache.lock();
            if cache.flushing {
                None
            } else {
                Some(cache.flush_epoch)
            }
        };
        let Some(epoch) = epoch else {
            shared.stats.write().skipped_loads += 1;
            debug!("flush in flight; load skipped");
            return Ok(LoadOutcome::Skipped);
        };

        let fetched = match shared.bounded(shared.store.fetch(&shared.config.site_id)).await {
            Ok(fetched) => fetched,
            Err(cause) => {
                let error = SyncError::read(cause);
                shared.stats.write().failed_loads += 1;
                warn!(%error, "annotation load failed");
                shared.record_error(&error);
                return Err(error);
            }
        };

        let count = {
            let mut cache = shared.cache.lock();
            if cache.flushing || cache.flush_epoch != epoch {
                None
            } else {
                let mut fresh: HashMap<String, FieldAnnotation> = fetched
                    .into_iter()
                    .map(FieldAnnotation::normalized)
                    .map(|a| (a.field_name.clone(), a))
                    .collect();
                for local in cache.pending.iter() {
                    fresh.insert(local.field_name.clone(), local.clone());
                }
                let count = fresh.len();
                cache.annotations = fresh;
                cache.loaded = true;
                Some(count)
            }
        };
        let Some(count) = count else {
            shared.stats.write().skipped_loads += 1;
            debug!("flush started during fetch; load discarded");
            return Ok(LoadOutcome::Skipped);
        };

        shared.stats.write().loads += 1;
        info!(count, "annotations loaded");
        shared.observer.on_loaded(&shared.config.site_id, count);
        Ok(LoadOutcome::Loaded(count))
    }

    /// Applies a reviewer click on `flag` of a field.
    ///
    /// The new state is cached and staged at once; the write follows after
    /// the debounce delay. Unchecking `pre_filled` or a blank field name is
    /// rejected and stages nothing.
    pub fn toggle(&self, field_name: &str, flag: FlagName) -> ToggleOutcome {
        if field_name.trim().is_empty() {
            self.shared.stats.write().rejected_mutations += 1;
            debug!(%flag, "blank field name; toggle rejected");
            return ToggleOutcome::Rejected(FieldAnnotation::new(field_name));
        }
        let outcome = {
            let mut cache = self.shared.cache.lock();
            let outcome = cache
                .annotations
                .get(field_name)
                .cloned()
                .unwrap_or_else(|| FieldAnnotation::new(field_name))
                .toggle(flag);
            if let ToggleOutcome::Applied(next) = &outcome {
                cache.apply(next.clone());
            }
            outcome
        };

        match &outcome {
            ToggleOutcome::Applied(next) => {
                debug!(field_name, %flag, last_selected = ?next.last_selected, "toggle staged");
                self.schedule_flush();
            }
            ToggleOutcome::Rejected(_) => {
                self.shared.stats.write().rejected_mutations += 1;
                debug!(field_name, %flag, "pre-filled flag cannot be cleared");
            }
        }
        outcome
    }

    /// Like [`ConfirmationSyncEngine::toggle`], parsing the flag name first.
    pub fn toggle_named(&self, field_name: &str, flag: &str) -> SyncResult<ToggleOutcome> {
        if field_name.trim().is_empty() {
            return Err(ProtocolError::EmptyFieldName.into());
        }
        let flag: FlagName = flag.parse()?;
        Ok(self.toggle(field_name, flag))
    }

    /// Marks a field pre-filled if it holds a value and has no flag set yet.
    ///
    /// Returns true if the field was marked. Blank field names are ignored.
    pub fn auto_mark_if_unset(&self, field_name: &str, value: &str) -> bool {
        let marked = {
            let mut cache = self.shared.cache.lock();
            Self::mark_locked(&mut cache, field_name, value)
        };
        if marked {
            debug!(field_name, "auto-marked pre-filled");
            self.schedule_flush();
        }
        marked
    }

    /// Marks every listed field that holds a value and has no flag set.
    ///
    /// Returns the names of the fields that were marked.
    pub fn auto_mark_many_if_unset<I, K, V>(&self, fields: I) -> Vec<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let marked: Vec<String> = {
            let mut cache = self.shared.cache.lock();
            fields
                .into_iter()
                .filter(|(name, value)| {
                    Self::mark_locked(&mut cache, name.as_ref(), value.as_ref())
                })
                .map(|(name, _)| name.as_ref().to_string())
                .collect()
        };
        if !marked.is_empty() {
            debug!(count = marked.len(), "auto-marked pre-filled fields");
            self.schedule_flush();
        }
        marked
    }

    /// Reacts to a form value change: a field going from empty to filled
    /// is marked pre-filled unless it already has a flag.
    pub fn observe_value_change(&self, field_name: &str, previous: &str, current: &str) -> bool {
        if !previous.trim().is_empty() {
            return false;
        }
        self.auto_mark_if_unset(field_name, current)
    }

    fn mark_locked(cache: &mut Cache, field_name: &str, value: &str) -> bool {
        if field_name.trim().is_empty() || value.trim().is_empty() {
            return false;
        }
        let marked = match cache.annotations.get(field_name) {
            Some(existing) => existing.mark_pre_filled_if_unset(),
            None => Some(FieldAnnotation::pre_filled(field_name)),
        };
        match marked {
            Some(annotation) => {
                cache.apply(annotation);
                true
            }
            None => false,
        }
    }

    /// Writes all pending deltas now, bypassing the debounce delay.
    ///
    /// Waits for an in-flight round first. Returns the number of
    /// annotations the store reported as written.
    #[instrument(skip(self), fields(site_id = %self.shared.config.site_id))]
    pub async fn flush_now(&self) -> SyncResult<u64> {
        self.shared.flush_cycle().await
    }

    /// Flushes what is pending and stops the debounce worker.
    ///
    /// The cache stays readable; later mutations are only written by
    /// [`ConfirmationSyncEngine::flush_now`].
    pub async fn shutdown(&self) -> SyncResult<()> {
        let result = self.flush_now().await.map(|_| ());
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
        result
    }

    fn schedule_flush(&self) {
        if self.shared.kicks.send(()).is_err() {
            debug!("debounce worker stopped; change stays pending");
        }
    }
}

impl<S: RemoteStore + 'static> Drop for ConfirmationSyncEngine<S> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.abort();
        }
    }
}

async fn debounce_worker<S: RemoteStore + 'static>(
    shared: Weak<Shared<S>>,
    mut kicks: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
) {
    while kicks.recv().await.is_some() {
        // Every further kick restarts the quiet period.
        loop {
            tokio::select! {
                kick = kicks.recv() => {
                    if kick.is_none() {
                        return;
                    }
                }
                _ = tokio::time::sleep(debounce) => break,
            }
        }

        let Some(shared) = shared.upgrade() else {
            return;
        };
        // Failures are reported to the observer by the cycle itself.
        let _ = shared.flush_cycle().await;
    }
}
