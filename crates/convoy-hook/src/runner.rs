//! Driving hooks through their recorded states
//!
//! | From | Event | To |
//! |---|---|---|
//! | none or committed | hook about to run | started |
//! | started | hook exits 0 | succeeded |
//! | succeeded | bookkeeping synchronised | committed |
//!
//! A hook left `started` may have been interrupted half way; it is never
//! re-run or skipped automatically. A hook left `succeeded` only needs its
//! bookkeeping redone.

use crate::error::{HookError, HookResult};
use crate::exec::{ExecContext, ExecInfo, HookExecutor};
use crate::info::Info;
use crate::kind::Status;
use crate::state::{Recovery, StateFile};
use async_trait::async_trait;
use convoy_core::ConvoyResult;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Local bookkeeping done after a hook succeeds, such as recording
/// relation membership
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Synchronizer: Send + Sync {
    async fn synchronize(&self, info: &Info) -> ConvoyResult<()>;
}

/// Runs hooks for one unit, recording progress in its state file
#[derive(Debug, Clone)]
pub struct HookRunner {
    unit: String,
    charm_dir: PathBuf,
    agent_socket: String,
    state: StateFile,
    executor: HookExecutor,
}

impl HookRunner {
    pub fn new(
        unit: impl Into<String>,
        charm_dir: impl Into<PathBuf>,
        state: StateFile,
        executor: HookExecutor,
    ) -> Self {
        Self {
            unit: unit.into(),
            charm_dir: charm_dir.into(),
            agent_socket: String::new(),
            state,
            executor,
        }
    }

    /// Socket hook tools use to reach the agent
    pub fn with_agent_socket(mut self, socket: impl Into<String>) -> Self {
        self.agent_socket = socket.into();
        self
    }

    pub fn state_file(&self) -> &StateFile {
        &self.state
    }

    /// Run the hook described by `info`
    ///
    /// `relation` names the relation for relation hooks and selects the
    /// `<relation>-<kind>` hook program. Any pending recovery is handled
    /// first: an interrupted hook stops the run with
    /// [`HookError::NeedsResolution`], a succeeded one is resynchronised.
    pub async fn run(
        &self,
        info: &Info,
        relation: Option<&str>,
        ctx: &dyn ExecContext,
        sync: &dyn Synchronizer,
        cancel: &CancellationToken,
    ) -> HookResult<()> {
        info.validate()?;
        let hook_name = info.kind.hook_name(relation)?;
        self.resume(sync).await?;

        self.state.write(info, Status::Started).await?;

        let exec_info = ExecInfo {
            context_id: format!("{}-{}-{}", self.unit, hook_name, Uuid::new_v4()),
            agent_socket: self.agent_socket.clone(),
            charm_dir: self.charm_dir.clone(),
            remote_unit: info.remote_unit.clone(),
        };
        if let Err(e) = self.executor.exec(&hook_name, &exec_info, ctx, cancel).await {
            error!("Hook {} of {} failed: {}", hook_name, self.unit, e);
            return Err(e);
        }

        self.state.write(info, Status::Succeeded).await?;
        self.commit(info, sync).await?;
        info!("Hook {} of {} committed", hook_name, self.unit);
        Ok(())
    }

    /// Apply the recovery the recorded state calls for
    ///
    /// Returns the recovery that was carried out. An interrupted hook is
    /// reported as [`HookError::NeedsResolution`] and left as it is.
    pub async fn resume(&self, sync: &dyn Synchronizer) -> HookResult<Recovery> {
        let state = match self.state.read().await {
            Ok(state) => state,
            Err(HookError::NoStateFile) => return Ok(Recovery::Nothing),
            Err(e) => return Err(e),
        };

        match state.recovery() {
            Recovery::Nothing => Ok(Recovery::Nothing),
            Recovery::Resolve(info) => {
                warn!("Hook {} of {} was interrupted", info.kind, self.unit);
                Err(HookError::NeedsResolution {
                    hook: info.kind.to_string(),
                })
            }
            Recovery::Resynchronise(info) => {
                info!("Resynchronising after hook {} of {}", info.kind, self.unit);
                self.commit(&info, sync).await?;
                Ok(Recovery::Resynchronise(info))
            }
        }
    }

    /// Mark an interrupted hook as handled by the operator
    ///
    /// Returns whether there was anything to resolve.
    pub async fn resolve(&self) -> HookResult<bool> {
        match self.state.read().await {
            Ok(state) if state.status == Status::Started => {
                self.state.write(&state.info, Status::Committed).await?;
                info!("Hook {} of {} marked resolved", state.info.kind, self.unit);
                Ok(true)
            }
            Ok(_) | Err(HookError::NoStateFile) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn commit(&self, info: &Info, sync: &dyn Synchronizer) -> HookResult<()> {
        sync.synchronize(info)
            .await
            .map_err(|source| HookError::SynchronisationFailed {
                hook: info.kind.to_string(),
                source,
            })?;
        self.state.write(info, Status::Committed).await
    }
}
