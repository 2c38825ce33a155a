//! Context management for ConvoyError

use super::types::ConvoyError;

impl ConvoyError {
    /// Add context to any error
    ///
    /// Context already present is kept as the inner part, so repeated wrapping
    /// reads outermost first.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        let slot = match &mut self {
            Self::NotFound { context: c, .. } => c,
            Self::Aborted { context: c, .. } => c,
            Self::NotAlive { context: c, .. } => c,
            Self::Timeout { context: c, .. } => c,
            Self::InvalidState { context: c, .. } => c,
            Self::InvariantViolation { context: c, .. } => c,
            Self::Store { context: c, .. } => c,
            Self::Config { context: c, .. } => c,
            Self::Io { context: c, .. } => c,
            Self::Serialization { context: c, .. } => c,
            Self::Cancelled
            | Self::NotLeader { .. }
            | Self::ClaimDenied { .. }
            | Self::AlreadyStarted { .. } => return self,
        };
        *slot = Some(match slot.take() {
            Some(inner) => format!("{}: {}", context, inner),
            None => context,
        });
        self
    }
}
