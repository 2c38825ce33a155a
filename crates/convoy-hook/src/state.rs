//! Persistent hook state
//!
//! The state file records the latest hook an agent meant to run and how far
//! it got, so a restarted agent knows whether to resolve, resynchronise or do
//! nothing. Writes replace the file atomically; a reader sees either the old
//! state or the new one.

use crate::error::{HookError, HookResult};
use crate::info::Info;
use crate::kind::{Kind, Status};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// The latest hook and its execution status
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub info: Info,
    pub status: Status,
}

/// What a restarted agent must do about the recorded state
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// Nothing is pending
    Nothing,
    /// The hook may have been interrupted; an operator decides
    Resolve(Info),
    /// The hook succeeded; redo the bookkeeping, not the hook
    Resynchronise(Info),
}

impl State {
    pub fn recovery(&self) -> Recovery {
        match self.status {
            Status::Started => Recovery::Resolve(self.info.clone()),
            Status::Succeeded => Recovery::Resynchronise(self.info.clone()),
            Status::Committed => Recovery::Nothing,
        }
    }
}

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
struct StateDoc {
    kind: Kind,
    #[serde(rename = "relation-id", default, skip_serializing_if = "Option::is_none")]
    relation_id: Option<i64>,
    #[serde(rename = "remote-unit", default, skip_serializing_if = "Option::is_none")]
    remote_unit: Option<String>,
    #[serde(rename = "change-version", default, skip_serializing_if = "Option::is_none")]
    change_version: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    members: Vec<String>,
    status: Status,
}

/// Reads and writes the hook state at one path
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn preparing_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".preparing");
        PathBuf::from(name)
    }

    /// Read the recorded state
    ///
    /// Fails with [`HookError::NoStateFile`] before any state was written and
    /// with the fatal [`HookError::InvalidState`] if the file is corrupt.
    pub async fn read(&self) -> HookResult<State> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(HookError::NoStateFile),
            Err(e) => return Err(HookError::io(&self.path, e)),
        };

        let invalid = |message: String| HookError::InvalidState {
            path: self.path.clone(),
            message,
        };
        let doc: StateDoc = serde_yaml::from_str(&data).map_err(|e| invalid(e.to_string()))?;
        let info = Info {
            kind: doc.kind,
            relation_id: doc.relation_id,
            remote_unit: doc.remote_unit,
            change_version: doc.change_version,
            members: doc.members.into_iter().map(|m| (m, None)).collect(),
        };
        info.validate().map_err(|e| invalid(e.to_string()))?;

        Ok(State {
            info,
            status: doc.status,
        })
    }

    /// Atomically replace the recorded state
    ///
    /// Invalid info is rejected with [`HookError::InvalidInfo`] and nothing
    /// is written.
    pub async fn write(&self, info: &Info, status: Status) -> HookResult<()> {
        info.validate()?;
        let doc = StateDoc {
            kind: info.kind,
            relation_id: info.relation_id,
            remote_unit: info.remote_unit.clone(),
            change_version: info.change_version,
            members: info.members.keys().cloned().collect(),
            status,
        };
        let data = serde_yaml::to_string(&doc)?;

        let preparing = self.preparing_path();
        let mut file = tokio::fs::File::create(&preparing)
            .await
            .map_err(|e| HookError::io(&preparing, e))?;
        file.write_all(data.as_bytes())
            .await
            .map_err(|e| HookError::io(&preparing, e))?;
        file.sync_all()
            .await
            .map_err(|e| HookError::io(&preparing, e))?;
        drop(file);
        tokio::fs::rename(&preparing, &self.path)
            .await
            .map_err(|e| HookError::io(&self.path, e))?;

        debug!("Hook {} {} recorded at {}", info.kind, status, self.path.display());
        Ok(())
    }
}
