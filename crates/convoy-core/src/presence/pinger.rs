//! Heartbeat producer

use super::{Heartbeat, PRESENCE_COLLECTION, tick_period};
use crate::clock::Clock;
use crate::error::{ConvoyError, ConvoyResult};
use crate::store::{Assert, Condition, Op, Store, StoreError, Update, to_document};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
struct Beater {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    key: String,
    seq: Arc<AtomicU64>,
    /// Last heartbeat this pinger stored
    written: Arc<parking_lot::Mutex<Option<Heartbeat>>>,
}

impl Beater {
    async fn beat(&self) -> ConvoyResult<()> {
        let heartbeat = Heartbeat {
            beat: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
            at: self.clock.now_millis(),
        };
        let doc = to_document(&heartbeat)?;
        self.store
            .run(vec![
                Op::new(PRESENCE_COLLECTION, self.key.clone()).update(Update::Upsert(doc)),
            ])
            .await?;
        *self.written.lock() = Some(heartbeat);
        debug!("Heartbeat {} for {}", heartbeat.beat, self.key);
        Ok(())
    }
}

/// Publishes heartbeats for one presence key
pub struct Pinger {
    beater: Beater,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl Pinger {
    /// Create a stopped pinger for `key`
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            beater: Beater {
                store,
                clock,
                key: key.into(),
                seq: Arc::new(AtomicU64::new(0)),
                written: Arc::new(parking_lot::Mutex::new(None)),
            },
            interval: tick_period(interval),
            running: Mutex::new(None),
        }
    }

    /// The presence key this pinger publishes
    pub fn key(&self) -> &str {
        &self.beater.key
    }

    /// Whether the heartbeat task is running
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Write a first heartbeat, then keep beating in the background
    ///
    /// Fails with [`ConvoyError::AlreadyStarted`] if the pinger is running.
    pub async fn start(&self) -> ConvoyResult<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ConvoyError::AlreadyStarted {
                key: self.beater.key.clone(),
            });
        }

        self.beater.beat().await?;

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let beater = self.beater.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; the initial beat is already written.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = beater.beat().await {
                            warn!("Heartbeat for {} failed: {}", beater.key, e);
                        }
                    }
                }
            }
        });

        *running = Some(Running { cancel, handle });
        info!("Pinger started for {}", self.beater.key);
        Ok(())
    }

    /// Stop beating and remove the heartbeat record
    ///
    /// Only a record still holding this pinger's last heartbeat is removed;
    /// one rewritten by another pinger for the same key is left alone.
    /// Stopping a stopped pinger does nothing.
    pub async fn stop(&self) -> ConvoyResult<()> {
        if let Some(Running { cancel, handle }) = self.running.lock().await.take() {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!("Heartbeat task for {} ended abnormally: {}", self.beater.key, e);
            }
            info!("Pinger stopped for {}", self.beater.key);
        }

        let Some(last) = self.beater.written.lock().take() else {
            return Ok(());
        };
        let remove = Op::new(PRESENCE_COLLECTION, self.beater.key.clone())
            .assert(Assert::Matches(vec![
                Condition::eq("beat", last.beat),
                Condition::eq("at", last.at),
            ]))
            .update(Update::Remove);
        match self.beater.store.run(vec![remove]).await {
            Ok(()) => Ok(()),
            Err(StoreError::Aborted { .. }) => {
                debug!("Presence record of {} was rewritten elsewhere; kept", self.beater.key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for Pinger {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::store::MemoryStore;

    fn pinger(store: &Arc<MemoryStore>, interval: Duration) -> Pinger {
        Pinger::new(store.clone(), Arc::new(SystemClock), "m#0", interval)
    }

    async fn beat_of(store: &MemoryStore) -> Option<u64> {
        store
            .find(PRESENCE_COLLECTION, "m#0")
            .await
            .unwrap()
            .and_then(|doc| doc.get("beat").and_then(|v| v.as_u64()))
    }

    #[tokio::test]
    async fn test_start_writes_heartbeat() {
        let store = Arc::new(MemoryStore::new());
        let p = pinger(&store, Duration::from_secs(60));
        p.start().await.unwrap();
        assert_eq!(beat_of(&store).await, Some(1));
        assert!(p.is_running().await);
        p.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_start_fails() {
        let store = Arc::new(MemoryStore::new());
        let p = pinger(&store, Duration::from_secs(60));
        p.start().await.unwrap();
        let err = p.start().await.unwrap_err();
        assert!(matches!(err, ConvoyError::AlreadyStarted { .. }));
        p.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_heartbeats_advance() {
        let store = Arc::new(MemoryStore::new());
        let p = pinger(&store, Duration::from_millis(10));
        p.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(beat_of(&store).await.unwrap() > 1);
        p.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_removes_record() {
        let store = Arc::new(MemoryStore::new());
        let p = pinger(&store, Duration::from_millis(10));
        p.start().await.unwrap();
        p.stop().await.unwrap();
        assert_eq!(beat_of(&store).await, None);
        assert!(!p.is_running().await);

        p.stop().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(beat_of(&store).await, None);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let store = Arc::new(MemoryStore::new());
        let p = pinger(&store, Duration::from_secs(60));
        p.start().await.unwrap();
        p.stop().await.unwrap();
        p.start().await.unwrap();
        assert_eq!(beat_of(&store).await, Some(2));
        p.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start_keeps_foreign_record() {
        let store = Arc::new(MemoryStore::new());
        let owner = pinger(&store, Duration::from_secs(60));
        owner.start().await.unwrap();

        let idle = pinger(&store, Duration::from_secs(60));
        idle.stop().await.unwrap();
        assert_eq!(beat_of(&store).await, Some(1));
        owner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_keeps_record_rewritten_by_another_pinger() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let first = Pinger::new(store.clone(), clock.clone(), "m#0", Duration::from_secs(60));
        let second = Pinger::new(store.clone(), clock.clone(), "m#0", Duration::from_secs(60));

        first.start().await.unwrap();
        clock.advance(Duration::from_secs(1));
        second.start().await.unwrap();

        first.stop().await.unwrap();
        assert_eq!(beat_of(&store).await, Some(1));
        second.stop().await.unwrap();
        assert_eq!(beat_of(&store).await, None);
    }

    #[tokio::test]
    async fn test_zero_interval_still_beats() {
        let store = Arc::new(MemoryStore::new());
        let p = pinger(&store, Duration::ZERO);
        p.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(beat_of(&store).await.unwrap() > 1);
        p.stop().await.unwrap();
    }
}
