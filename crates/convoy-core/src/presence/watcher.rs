//! Liveness observer
//!
//! The watcher keeps the last liveness value it computed for every watched
//! key. All reads that may change that value happen under one async lock, and
//! flips are dispatched while the lock is held, so a subscriber always sees
//! changes relative to the value it was handed at registration.
//!
//! Flips shorter than one sweep interval may be missed entirely.

use super::{Change, Heartbeat, PRESENCE_COLLECTION, tick_period};
use crate::clock::Clock;
use crate::config::PresenceConfig;
use crate::error::{ConvoyError, ConvoyResult};
use crate::store::{Store, from_document};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<Change>,
}

struct WatcherInner {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    window_ms: i64,
    known: Mutex<HashMap<String, bool>>,
    subscribers: parking_lot::Mutex<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl WatcherInner {
    fn is_alive(&self, doc: Option<crate::store::Document>, now_ms: i64) -> ConvoyResult<bool> {
        match doc {
            Some(doc) => {
                let heartbeat: Heartbeat = from_document(doc)?;
                Ok(heartbeat.is_fresh(now_ms, self.window_ms))
            }
            None => Ok(false),
        }
    }

    async fn read_alive(&self, key: &str) -> ConvoyResult<bool> {
        let doc = self.store.find(PRESENCE_COLLECTION, key).await?;
        self.is_alive(doc, self.clock.now_millis())
    }

    /// Record a computed value, dispatching a change if it flipped
    fn observe(&self, known: &mut HashMap<String, bool>, key: &str, alive: bool) {
        let previous = known.insert(key.to_string(), alive);
        if previous.is_none_or(|p| p == alive) {
            return;
        }
        debug!("Presence of {} changed: alive={}", key, alive);
        let mut subscribers = self.subscribers.lock();
        if let Some(subs) = subscribers.get_mut(key) {
            let change = Change {
                key: key.to_string(),
                alive,
            };
            subs.retain(|s| s.tx.send(change.clone()).is_ok());
        }
    }

    async fn sweep(&self) -> ConvoyResult<()> {
        let mut known = self.known.lock().await;
        let keys: Vec<String> = self.subscribers.lock().keys().cloned().collect();
        known.retain(|k, _| keys.contains(k));
        if keys.is_empty() {
            return Ok(());
        }

        let mut docs: HashMap<String, _> = self
            .store
            .find_all(PRESENCE_COLLECTION)
            .await?
            .into_iter()
            .collect();
        let now_ms = self.clock.now_millis();
        for key in keys {
            let alive = self.is_alive(docs.remove(&key), now_ms)?;
            self.observe(&mut known, &key, alive);
        }
        Ok(())
    }

    fn unsubscribe(&self, key: &str, id: u64) {
        let mut subscribers = self.subscribers.lock();
        if let Some(subs) = subscribers.get_mut(key) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                subscribers.remove(key);
            }
        }
    }
}

/// A registration for liveness changes of one key
///
/// Dropping the subscription unregisters it.
pub struct Subscription {
    key: String,
    id: u64,
    alive: bool,
    rx: mpsc::UnboundedReceiver<Change>,
    watcher: Weak<WatcherInner>,
}

impl Subscription {
    /// The watched key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Liveness at registration; every later change flips relative to it
    pub fn alive(&self) -> bool {
        self.alive
    }

    /// Wait for the next change; `None` once the watcher has stopped
    pub async fn recv(&mut self) -> Option<Change> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.watcher.upgrade() {
            inner.unsubscribe(&self.key, self.id);
        }
    }
}

/// Computes liveness from heartbeats and notifies subscribers of flips
pub struct Watcher {
    inner: Arc<WatcherInner>,
    cancel: CancellationToken,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Watcher {
    /// Create a watcher and start its sweep task
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: &PresenceConfig) -> Self {
        let inner = Arc::new(WatcherInner {
            store,
            clock,
            window_ms: config.staleness_window.as_millis() as i64,
            known: Mutex::new(HashMap::new()),
            subscribers: parking_lot::Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        });

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::run(
            inner.clone(),
            cancel.clone(),
            tick_period(config.sweep_interval),
        ));

        Self {
            inner,
            cancel,
            task: parking_lot::Mutex::new(Some(task)),
        }
    }

    async fn run(inner: Arc<WatcherInner>, cancel: CancellationToken, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = inner.sweep().await {
                        warn!("Presence sweep failed: {}", e);
                    }
                }
            }
        }
    }

    /// Whether `key` had a heartbeat within the staleness window
    pub async fn alive(&self, key: &str) -> ConvoyResult<bool> {
        let mut known = self.inner.known.lock().await;
        let alive = self.inner.read_alive(key).await?;
        self.inner.observe(&mut known, key, alive);
        Ok(alive)
    }

    /// Register for liveness changes of `key`
    pub async fn watch(&self, key: &str) -> ConvoyResult<Subscription> {
        if self.cancel.is_cancelled() {
            return Err(ConvoyError::Cancelled);
        }
        let mut known = self.inner.known.lock().await;
        let alive = self.inner.read_alive(key).await?;
        self.inner.observe(&mut known, key, alive);

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        drop(known);

        Ok(Subscription {
            key: key.to_string(),
            id,
            alive,
            rx,
            watcher: Arc::downgrade(&self.inner),
        })
    }

    /// Block until `key` is alive or `timeout` elapses
    ///
    /// Returns at once if the key is already alive. A change event reporting
    /// "not alive" after a not-alive registration cannot happen while the
    /// watcher's bookkeeping is intact and is surfaced as a fatal
    /// [`ConvoyError::InvariantViolation`].
    pub async fn wait_alive(&self, key: &str, timeout: Duration) -> ConvoyResult<()> {
        let wait = async {
            let mut subscription = self.watch(key).await?;
            if subscription.alive() {
                return Ok(());
            }
            match subscription.recv().await {
                Some(change) if change.alive => Ok(()),
                Some(change) => Err(ConvoyError::invariant(format!(
                    "unexpected alive status {} of {}",
                    change.alive, key
                ))),
                None => Err(ConvoyError::Cancelled),
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(ConvoyError::timeout(
                format!("waiting for {}: still not alive", key),
                timeout.as_millis() as u64,
            )),
        }
    }

    /// Run one sweep immediately instead of waiting for the next tick
    pub async fn sync(&self) -> ConvoyResult<()> {
        self.inner.sweep().await
    }

    /// Deliver `change` to every subscriber of its key, bypassing the sweep
    #[cfg(test)]
    fn dispatch(&self, change: Change) {
        if let Some(subs) = self.inner.subscribers.lock().get_mut(&change.key) {
            subs.retain(|s| s.tx.send(change.clone()).is_ok());
        }
    }

    /// Number of live subscriptions for `key`
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .subscribers
            .lock()
            .get(key)
            .map_or(0, |subs| subs.len())
    }

    /// Stop sweeping and close every subscription
    pub fn stop(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        // Dropping the senders wakes every pending `recv` with `None`.
        self.inner.subscribers.lock().clear();
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}
