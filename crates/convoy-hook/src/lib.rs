//! Convoy Hook Library
//!
//! Runs charm hooks for a unit agent and records each hook's progress on
//! local disk, so an agent restarted mid-hook knows exactly what recovery is
//! needed.

pub mod error;
pub mod exec;
pub mod info;
pub mod kind;
pub mod runner;
pub mod state;

pub use error::{HookError, HookResult};
pub use exec::{ExecContext, ExecInfo, HookExecutor, StaticContext};
pub use info::{Info, Settings};
pub use kind::{Kind, Status};
pub use runner::{HookRunner, Synchronizer};
pub use state::{Recovery, State, StateFile};
