//! Leadership leases
//!
//! A lease is one document per scope naming its holder and expiry. The
//! [`LeaseClaimer`] grants and releases leases with conditional store
//! updates; the [`Checker`] hands out [`Token`]s that re-validate the lease
//! every time they are checked.
//!
//! A successful check only says the holder led the scope when the check ran.
//! Check again right before every leader-only side effect.

mod checker;
mod claimer;

pub use checker::{StoreChecker, StoreToken};
pub use claimer::LeaseClaimer;

use crate::error::ConvoyResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Collection holding one lease document per scope
pub const LEASE_COLLECTION: &str = "leases";

/// Proof that a holder led a scope, re-validated on every check
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Token: Send + Sync {
    /// `Ok(())` while the lease is held; [`ConvoyError::NotLeader`] once it is not
    ///
    /// [`ConvoyError::NotLeader`]: crate::error::ConvoyError::NotLeader
    async fn check(&self) -> ConvoyResult<()>;
}

/// Issues leadership tokens
pub trait Checker: Send + Sync {
    /// A token for `holder` leading `scope`; validity is decided by [`Token::check`]
    fn leadership_check(&self, scope: &str, holder: &str) -> Box<dyn Token>;
}

/// Lease document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Lease {
    pub holder: String,
    /// Expiry in epoch milliseconds
    pub expiry: i64,
}

impl Lease {
    pub fn is_valid_for(&self, holder: &str, now_ms: i64) -> bool {
        self.holder == holder && now_ms < self.expiry
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expiry
    }
}
