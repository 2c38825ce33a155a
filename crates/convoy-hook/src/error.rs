//! Hook error types

use convoy_core::{ConvoyError, UnifiedError};
use std::path::PathBuf;
use thiserror::Error;

pub type HookResult<T> = Result<T, HookError>;

/// Errors from recording and running hooks
#[derive(Error, Debug)]
pub enum HookError {
    /// No hook has ever been recorded
    #[error("hook state file does not exist")]
    NoStateFile,

    /// The state file holds something that is not a valid hook state; fatal
    #[error("invalid hook state at {path}: {message}")]
    InvalidState { path: PathBuf, message: String },

    /// Refused to record info that does not fit its kind; fatal
    #[error("invalid hook info: {0}")]
    InvalidInfo(String),

    /// The hook program ran and failed
    #[error("hook {hook} failed{}: {stderr}", .code.map(|c| format!(" with exit code {}", c)).unwrap_or_default())]
    ExecutionFailed {
        hook: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The hook program outlived its timeout and was killed
    #[error("hook {hook} timed out after {after_ms}ms")]
    Timeout { hook: String, after_ms: u64 },

    /// The hook program was killed because the agent is shutting down
    #[error("hook {hook} was cancelled")]
    Cancelled { hook: String },

    /// The hook succeeded but its context could not be written back
    #[error("flushing context of hook {hook} failed: {source}")]
    FlushFailed {
        hook: String,
        #[source]
        source: ConvoyError,
    },

    /// A previous hook was interrupted and needs an operator decision
    #[error("hook {hook} was interrupted and needs resolution")]
    NeedsResolution { hook: String },

    /// Local bookkeeping after a successful hook failed
    #[error("synchronising after hook {hook} failed: {source}")]
    SynchronisationFailed {
        hook: String,
        #[source]
        source: ConvoyError,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl HookError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_no_state_file(&self) -> bool {
        matches!(self, Self::NoStateFile)
    }
}

impl UnifiedError for HookError {
    fn error_code(&self) -> &str {
        match self {
            Self::NoStateFile => "HOOK_NO_STATE_FILE",
            Self::InvalidState { .. } => "HOOK_INVALID_STATE",
            Self::InvalidInfo(_) => "HOOK_INVALID_INFO",
            Self::ExecutionFailed { .. } => "HOOK_EXECUTION_FAILED",
            Self::Timeout { .. } => "HOOK_TIMEOUT",
            Self::Cancelled { .. } => "HOOK_CANCELLED",
            Self::FlushFailed { .. } => "HOOK_FLUSH_FAILED",
            Self::NeedsResolution { .. } => "HOOK_NEEDS_RESOLUTION",
            Self::SynchronisationFailed { .. } => "HOOK_SYNC_FAILED",
            Self::Io { .. } => "HOOK_IO",
            Self::Yaml(_) => "HOOK_YAML",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::NoStateFile => "hook state file does not exist",
            Self::InvalidState { message, .. } => message,
            Self::InvalidInfo(message) => message,
            Self::ExecutionFailed { .. } => "hook execution failed",
            Self::Timeout { .. } => "hook timed out",
            Self::Cancelled { .. } => "hook cancelled",
            Self::FlushFailed { .. } => "context flush failed",
            Self::NeedsResolution { .. } => "hook needs resolution",
            Self::SynchronisationFailed { .. } => "synchronisation failed",
            Self::Io { .. } => "IO error",
            Self::Yaml(_) => "YAML error",
        }
    }

    fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::InvalidInfo(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(HookError::InvalidInfo("x".into()).is_fatal());
        assert!(
            HookError::InvalidState {
                path: "/s".into(),
                message: "bad".into()
            }
            .is_fatal()
        );
        assert!(!HookError::NoStateFile.is_fatal());
        assert!(!HookError::NeedsResolution { hook: "install".into() }.is_fatal());
    }

    #[test]
    fn test_execution_failed_display() {
        let err = HookError::ExecutionFailed {
            hook: "start".into(),
            code: Some(3),
            stderr: "boom".into(),
        };
        assert_eq!(err.to_string(), "hook start failed with exit code 3: boom");
        assert_eq!(err.error_code(), "HOOK_EXECUTION_FAILED");
    }
}
