//! Lease acquisition and release

use super::{LEASE_COLLECTION, Lease};
use crate::clock::Clock;
use crate::error::{ConvoyError, ConvoyResult};
use crate::store::{Assert, Condition, Op, Store, StoreError, Update, from_document, to_document};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Optimistic read-modify-write attempts before a claim gives up
const CLAIM_ATTEMPTS: usize = 3;

/// Grants, extends and releases scope leases
#[derive(Clone)]
pub struct LeaseClaimer {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl LeaseClaimer {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn read(&self, scope: &str) -> ConvoyResult<Option<Lease>> {
        match self.store.find(LEASE_COLLECTION, scope).await? {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// The holder of an unexpired lease on `scope`, if any
    pub async fn leader(&self, scope: &str) -> ConvoyResult<Option<String>> {
        let now = self.clock.now_millis();
        Ok(self
            .read(scope)
            .await?
            .filter(|lease| !lease.is_expired(now))
            .map(|lease| lease.holder))
    }

    /// Claim or extend leadership of `scope` for `duration`
    ///
    /// Succeeds when the scope is unheld, its lease expired, or `holder`
    /// already holds it. Fails with [`ConvoyError::ClaimDenied`] otherwise.
    pub async fn claim(&self, scope: &str, holder: &str, duration: Duration) -> ConvoyResult<()> {
        let mut current_holder = String::new();
        for attempt in 1..=CLAIM_ATTEMPTS {
            let now = self.clock.now_millis();
            let granted = Lease {
                holder: holder.to_string(),
                expiry: now + duration.as_millis() as i64,
            };
            let doc = to_document(&granted)?;

            let op = match self.read(scope).await? {
                None => Op::insert(LEASE_COLLECTION, scope, doc),
                Some(lease) if lease.holder == holder || lease.is_expired(now) => {
                    Op::new(LEASE_COLLECTION, scope)
                        .assert(unchanged(&lease))
                        .update(Update::Set(doc))
                }
                Some(lease) => {
                    return Err(ConvoyError::ClaimDenied {
                        scope: scope.to_string(),
                        holder: holder.to_string(),
                        current_holder: lease.holder,
                    });
                }
            };

            match self.store.run(vec![op]).await {
                Ok(()) => {
                    info!("{} leads {} until {}", holder, scope, granted.expiry);
                    return Ok(());
                }
                Err(StoreError::Aborted { .. }) => {
                    debug!("Lease claim of {} by {} raced (attempt {})", scope, holder, attempt);
                    current_holder = self
                        .read(scope)
                        .await?
                        .map(|lease| lease.holder)
                        .unwrap_or_default();
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ConvoyError::ClaimDenied {
            scope: scope.to_string(),
            holder: holder.to_string(),
            current_holder,
        })
    }

    /// Give up a lease `holder` owns
    ///
    /// Fails with [`ConvoyError::NotLeader`] if the lease is held by someone
    /// else or absent.
    pub async fn release(&self, scope: &str, holder: &str) -> ConvoyResult<()> {
        let op = Op::new(LEASE_COLLECTION, scope)
            .assert(Assert::Matches(vec![Condition::eq("holder", holder)]))
            .update(Update::Remove);
        match self.store.run(vec![op]).await {
            Ok(()) => {
                info!("{} released leadership of {}", holder, scope);
                Ok(())
            }
            Err(StoreError::Aborted { .. }) => Err(ConvoyError::not_leader(scope, holder)),
            Err(e) => Err(e.into()),
        }
    }
}

fn unchanged(lease: &Lease) -> Assert {
    Assert::Matches(vec![
        Condition::eq("holder", lease.holder.as_str()),
        Condition::eq("expiry", lease.expiry),
    ])
}
