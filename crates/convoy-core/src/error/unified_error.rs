//! UnifiedError trait implementation for ConvoyError

use super::types::{ConvoyError, UnifiedError};

impl UnifiedError for ConvoyError {
    fn error_code(&self) -> &str {
        match self {
            Self::NotFound { .. } => "CONVOY_NOT_FOUND",
            Self::Aborted { .. } => "CONVOY_ABORTED",
            Self::NotAlive { .. } => "CONVOY_NOT_ALIVE",
            Self::Timeout { .. } => "CONVOY_TIMEOUT",
            Self::Cancelled => "CONVOY_CANCELLED",
            Self::InvalidState { .. } => "CONVOY_INVALID_STATE",
            Self::InvariantViolation { .. } => "CONVOY_INVARIANT",
            Self::NotLeader { .. } => "CONVOY_NOT_LEADER",
            Self::ClaimDenied { .. } => "CONVOY_CLAIM_DENIED",
            Self::AlreadyStarted { .. } => "CONVOY_ALREADY_STARTED",
            Self::Store { .. } => "CONVOY_STORE",
            Self::Config { .. } => "CONVOY_CONFIG",
            Self::Io { .. } => "CONVOY_IO",
            Self::Serialization { .. } => "CONVOY_SERIALIZATION",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::NotFound { message, .. } => message,
            Self::Aborted { .. } => "transaction aborted",
            Self::NotAlive { message, .. } => message,
            Self::Timeout { message, .. } => message,
            Self::Cancelled => "operation was cancelled",
            Self::InvalidState { message, .. } => message,
            Self::InvariantViolation { message, .. } => message,
            Self::NotLeader { .. } => "not leader",
            Self::ClaimDenied { .. } => "leadership claim denied",
            Self::AlreadyStarted { .. } => "already started",
            Self::Store { message, .. } => message,
            Self::Config { message, .. } => message,
            Self::Io { message, .. } => message,
            Self::Serialization { message, .. } => message,
        }
    }

    fn context(&self) -> Option<&str> {
        match self {
            Self::NotFound { context, .. } => context.as_deref(),
            Self::Aborted { context, .. } => context.as_deref(),
            Self::NotAlive { context, .. } => context.as_deref(),
            Self::Timeout { context, .. } => context.as_deref(),
            Self::InvalidState { context, .. } => context.as_deref(),
            Self::InvariantViolation { context, .. } => context.as_deref(),
            Self::Store { context, .. } => context.as_deref(),
            Self::Config { context, .. } => context.as_deref(),
            Self::Io { context, .. } => context.as_deref(),
            Self::Serialization { context, .. } => context.as_deref(),
            Self::Cancelled
            | Self::NotLeader { .. }
            | Self::ClaimDenied { .. }
            | Self::AlreadyStarted { .. } => None,
        }
    }

    fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. } | Self::InvariantViolation { .. }
        )
    }
}
