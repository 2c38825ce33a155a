//! Entity lifecycle
//!
//! Every long-lived entity carries a [`Life`] that only moves forward:
//! `Alive -> Dying -> Dead`. Transitions are single conditional store
//! updates, so concurrent agents never see life go backwards and a
//! transition another agent already made is treated as done.

mod machine;
mod sequence;
mod unit;

pub use machine::Machine;
pub use unit::Unit;

use crate::context::Cluster;
use crate::error::{ConvoyError, ConvoyResult, ResultExt};
use crate::presence::Pinger;
use crate::store::{Assert, Condition, Op, Store, StoreError, Update, fields, from_document};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Attempts at a conditional update before giving up on a racing writer
pub(crate) const TXN_ATTEMPTS: usize = 3;

/// Lifecycle stage of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    Alive,
    Dying,
    Dead,
}

impl Life {
    pub const ALL: [Life; 3] = [Life::Alive, Life::Dying, Life::Dead];

    pub fn as_str(&self) -> &'static str {
        match self {
            Life::Alive => "alive",
            Life::Dying => "dying",
            Life::Dead => "dead",
        }
    }

    /// Stages from which a transition to `self` is allowed
    fn predecessors(self) -> impl Iterator<Item = &'static str> {
        Life::ALL
            .into_iter()
            .filter(move |life| *life < self)
            .map(|life| life.as_str())
    }
}

impl fmt::Display for Life {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Life {
    type Err = ConvoyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alive" => Ok(Life::Alive),
            "dying" => Ok(Life::Dying),
            "dead" => Ok(Life::Dead),
            other => Err(ConvoyError::invalid_state(format!("unknown life {:?}", other))),
        }
    }
}

#[derive(Deserialize)]
struct LifeField {
    life: Life,
}

/// Move the entity stored at `collection/id` to at least `target`
///
/// Returns the life the entity is known to have afterwards, which is
/// `target` or a later stage another writer already reached.
pub(crate) async fn ensure_life(
    store: &dyn Store,
    collection: &str,
    id: &str,
    what: &str,
    target: Life,
) -> ConvoyResult<Life> {
    let op = Op::new(collection, id)
        .assert(Assert::Matches(vec![Condition::one_of(
            "life",
            target.predecessors(),
        )]))
        .update(Update::Set(fields([("life", target.as_str())])));

    for _ in 0..TXN_ATTEMPTS {
        match store.run(vec![op.clone()]).await {
            Ok(()) => {
                debug!("{} is now {}", what, target);
                return Ok(target);
            }
            Err(StoreError::Aborted { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let Some(doc) = store.find(collection, id).await? else {
            return Err(ConvoyError::not_found(what));
        };
        let LifeField { life } = from_document(doc)?;
        if life >= target {
            debug!("{} already {}", what, life);
            return Ok(life);
        }
    }
    Err(ConvoyError::aborted(collection, id).with_context(format!("cannot make {} {}", what, target)))
}

/// Presence of the agent running on behalf of an entity
#[async_trait]
pub trait AgentPresence: fmt::Display + Send + Sync {
    /// Key under which the entity's agent publishes heartbeats
    fn global_key(&self) -> String;

    fn cluster(&self) -> &Cluster;

    /// Whether the entity's agent is currently heartbeating
    async fn agent_alive(&self) -> ConvoyResult<bool> {
        self.cluster().watcher().alive(&self.global_key()).await
    }

    /// Wait up to `timeout` for the entity's agent to come alive
    async fn wait_agent_alive(&self, timeout: Duration) -> ConvoyResult<()> {
        self.cluster()
            .watcher()
            .wait_alive(&self.global_key(), timeout)
            .await
            .with_context(|| format!("waiting for agent of {}", self))
    }

    /// Start signalling that the entity's agent is running
    ///
    /// The returned pinger keeps beating until it is stopped or dropped.
    async fn set_agent_alive(&self) -> ConvoyResult<Pinger> {
        let cluster = self.cluster();
        let pinger = Pinger::new(
            cluster.store().clone(),
            cluster.clock().clone(),
            self.global_key(),
            cluster.config().presence.heartbeat_interval,
        );
        pinger.start().await?;
        Ok(pinger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnifiedError;
    use crate::store::MemoryStore;
    use serde_json::json;

    async fn store_with(life: Life) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .run(vec![Op::insert("things", "a", fields([("life", life.as_str())]))])
            .await
            .unwrap();
        store
    }

    async fn life_of(store: &MemoryStore) -> Option<serde_json::Value> {
        store
            .find("things", "a")
            .await
            .unwrap()
            .and_then(|doc| doc.get("life").cloned())
    }

    #[test]
    fn test_life_ordering_and_names() {
        assert!(Life::Alive < Life::Dying && Life::Dying < Life::Dead);
        assert_eq!("dying".parse::<Life>().unwrap(), Life::Dying);
        assert!("zombie".parse::<Life>().unwrap_err().is_fatal());
        assert_eq!(serde_json::to_value(Life::Dead).unwrap(), json!("dead"));
        assert_eq!(Life::Dead.predecessors().collect::<Vec<_>>(), ["alive", "dying"]);
    }

    #[tokio::test]
    async fn test_ensure_life_advances() {
        let store = store_with(Life::Alive).await;
        let life = ensure_life(&store, "things", "a", "thing a", Life::Dying).await.unwrap();
        assert_eq!(life, Life::Dying);
        assert_eq!(life_of(&store).await, Some(json!("dying")));
    }

    #[tokio::test]
    async fn test_ensure_life_never_goes_back() {
        let store = store_with(Life::Dead).await;
        let life = ensure_life(&store, "things", "a", "thing a", Life::Dying).await.unwrap();
        assert_eq!(life, Life::Dead);
        assert_eq!(life_of(&store).await, Some(json!("dead")));
    }

    #[tokio::test]
    async fn test_ensure_life_on_missing_entity() {
        let store = MemoryStore::new();
        let err = ensure_life(&store, "things", "a", "thing a", Life::Dead)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "thing a not found");
    }

    #[tokio::test]
    async fn test_ensure_life_surfaces_store_errors() {
        let store = store_with(Life::Alive).await;
        store.set_unavailable(true);
        let err = ensure_life(&store, "things", "a", "thing a", Life::Dead)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvoyError::Store { .. }));
    }
}
