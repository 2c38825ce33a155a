//! Shared coordination context
//!
//! A [`Cluster`] bundles the store, clock, presence watcher and configuration
//! every entity handle needs. Clone it freely; clones share one watcher.

use crate::clock::Clock;
use crate::config::{ConvoyConfig, validate};
use crate::error::ConvoyResult;
use crate::leadership::{LeaseClaimer, StoreChecker};
use crate::presence::Watcher;
use crate::store::Store;
use std::sync::Arc;

struct ClusterInner {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: ConvoyConfig,
    watcher: Watcher,
}

/// Handle to the shared state of one cluster
#[derive(Clone)]
pub struct Cluster {
    inner: Arc<ClusterInner>,
}

impl Cluster {
    /// Validate `config`, then create a context and start its presence watcher
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: ConvoyConfig) -> ConvoyResult<Self> {
        validate(&config)?;
        let watcher = Watcher::new(store.clone(), clock.clone(), &config.presence);
        Ok(Self {
            inner: Arc::new(ClusterInner {
                store,
                clock,
                config,
                watcher,
            }),
        })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn config(&self) -> &ConvoyConfig {
        &self.inner.config
    }

    pub fn watcher(&self) -> &Watcher {
        &self.inner.watcher
    }

    pub fn lease_claimer(&self) -> LeaseClaimer {
        LeaseClaimer::new(self.store().clone(), self.clock().clone())
    }

    pub fn leadership_checker(&self) -> StoreChecker {
        StoreChecker::new(self.store().clone(), self.clock().clone())
    }

    /// Claim `scope` for `holder` for the configured lease duration
    pub async fn claim_leadership(&self, scope: &str, holder: &str) -> ConvoyResult<()> {
        self.lease_claimer()
            .claim(scope, holder, self.config().leadership.lease_duration)
            .await
    }
}
