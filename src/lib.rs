//! Convoy
//!
//! Coordination core for orchestrator agents. Agents share one
//! transactional store and use it to:
//!
//! - move machines and units through their lifecycle ([`convoy_core::lifecycle`])
//! - learn whether peer agents are running ([`convoy_core::presence`])
//! - prove they still lead a scope before acting on it ([`convoy_core::leadership`])
//!
//! Unit agents run charm hooks through [`convoy_hook::HookRunner`], which records
//! each hook's progress so a restarted agent recovers correctly.

pub use convoy_core;
pub use convoy_hook;

pub use convoy_core::{Cluster, ConvoyConfig, ConvoyError, ConvoyResult};
pub use convoy_hook::{HookError, HookResult};
