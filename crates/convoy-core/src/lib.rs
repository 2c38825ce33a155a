//! Convoy Core Library
//!
//! Coordination primitives shared by every Convoy agent: a transactional
//! store boundary, entity lifecycle, agent presence, leadership leases and
//! the configuration and error types they share.

pub mod clock;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod leadership;
pub mod lifecycle;
pub mod presence;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConvoyConfig, LogFormat, LoggingConfig, load_config};
pub use context::Cluster;
pub use error::{ConvoyError, ConvoyResult, ResultExt, UnifiedError};
pub use leadership::{Checker, LeaseClaimer, StoreChecker, Token};
pub use lifecycle::{AgentPresence, Life, Machine, Unit};
pub use presence::{Change, Pinger, Subscription, Watcher};
pub use store::{MemoryStore, Store, StoreError};
