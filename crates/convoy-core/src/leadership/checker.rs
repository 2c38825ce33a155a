//! Store-backed leadership tokens

use super::{Checker, LEASE_COLLECTION, Lease, Token};
use crate::clock::Clock;
use crate::error::{ConvoyError, ConvoyResult};
use crate::store::{Store, from_document};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Issues [`StoreToken`]s
#[derive(Clone)]
pub struct StoreChecker {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl StoreChecker {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Same as [`Checker::leadership_check`] without boxing
    pub fn token(&self, scope: &str, holder: &str) -> StoreToken {
        StoreToken {
            store: self.store.clone(),
            clock: self.clock.clone(),
            scope: scope.to_string(),
            holder: holder.to_string(),
        }
    }
}

impl Checker for StoreChecker {
    fn leadership_check(&self, scope: &str, holder: &str) -> Box<dyn Token> {
        Box::new(self.token(scope, holder))
    }
}

/// Token re-reading the scope's lease on every check
pub struct StoreToken {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    scope: String,
    holder: String,
}

impl StoreToken {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }
}

#[async_trait]
impl Token for StoreToken {
    async fn check(&self) -> ConvoyResult<()> {
        let doc = self.store.find(LEASE_COLLECTION, &self.scope).await?;
        let Some(doc) = doc else {
            debug!("No lease for {}", self.scope);
            return Err(ConvoyError::not_leader(&self.scope, &self.holder));
        };
        let lease: Lease = from_document(doc)?;
        if lease.is_valid_for(&self.holder, self.clock.now_millis()) {
            Ok(())
        } else {
            debug!(
                "{} lost leadership of {} (lease held by {})",
                self.holder, self.scope, lease.holder
            );
            Err(ConvoyError::not_leader(&self.scope, &self.holder))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::leadership::{LeaseClaimer, MockToken};
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn setup() -> (LeaseClaimer, StoreChecker, Arc<ManualClock>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        (
            LeaseClaimer::new(store.clone(), clock.clone()),
            StoreChecker::new(store, clock.clone()),
            clock,
        )
    }

    #[tokio::test]
    async fn test_token_valid_while_lease_held() {
        let (claimer, checker, _clock) = setup();
        claimer
            .claim("mysql", "mysql/0", Duration::from_secs(30))
            .await
            .unwrap();

        let token = checker.leadership_check("mysql", "mysql/0");
        token.check().await.unwrap();
        token.check().await.unwrap();
    }

    #[tokio::test]
    async fn test_token_for_other_holder_fails() {
        let (claimer, checker, _clock) = setup();
        claimer
            .claim("mysql", "mysql/0", Duration::from_secs(30))
            .await
            .unwrap();

        let err = checker
            .leadership_check("mysql", "mysql/1")
            .check()
            .await
            .unwrap_err();
        assert!(err.is_not_leader());
    }

    #[tokio::test]
    async fn test_token_invalidated_by_takeover() {
        let (claimer, checker, clock) = setup();
        claimer
            .claim("mysql", "mysql/0", Duration::from_secs(30))
            .await
            .unwrap();
        let token = checker.token("mysql", "mysql/0");
        token.check().await.unwrap();

        clock.advance(Duration::from_secs(31));
        claimer
            .claim("mysql", "mysql/1", Duration::from_secs(30))
            .await
            .unwrap();

        let err = token.check().await.unwrap_err();
        assert!(matches!(
            err,
            ConvoyError::NotLeader { ref scope, ref holder } if scope == "mysql" && holder == "mysql/0"
        ));
        checker.token("mysql", "mysql/1").check().await.unwrap();
    }

    #[tokio::test]
    async fn test_token_invalidated_by_expiry() {
        let (claimer, checker, clock) = setup();
        claimer
            .claim("wordpress", "wordpress/2", Duration::from_secs(10))
            .await
            .unwrap();
        let token = checker.token("wordpress", "wordpress/2");
        token.check().await.unwrap();

        clock.advance(Duration::from_secs(10));
        assert!(token.check().await.unwrap_err().is_not_leader());
    }

    #[tokio::test]
    async fn test_token_without_lease_fails() {
        let (_claimer, checker, _clock) = setup();
        assert!(checker.token("none", "none/0").check().await.unwrap_err().is_not_leader());
    }

    #[tokio::test]
    async fn test_mock_token_can_stand_in() {
        let mut token = MockToken::new();
        token.expect_check().times(1).returning(|| Ok(()));
        let token: Box<dyn Token> = Box::new(token);
        token.check().await.unwrap();
    }
}
