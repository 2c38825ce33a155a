//! Constructor methods for ConvoyError

use super::types::ConvoyError;

impl ConvoyError {
    /// Create a not-found error for the described resource
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            context: None,
        }
    }

    /// Create an aborted-transaction error
    pub fn aborted(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Aborted {
            collection: collection.into(),
            id: id.into(),
            context: None,
        }
    }

    /// Create a not-alive error for the described entity
    pub fn not_alive(message: impl Into<String>) -> Self {
        Self::NotAlive {
            message: message.into(),
            context: None,
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>, after_ms: u64) -> Self {
        Self::Timeout {
            message: message.into(),
            after_ms,
            context: None,
        }
    }

    /// Create an invalid-state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
            context: None,
        }
    }

    /// Create an invariant-violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
            context: None,
        }
    }

    /// Create a not-leader error
    pub fn not_leader(scope: impl Into<String>, holder: impl Into<String>) -> Self {
        Self::NotLeader {
            scope: scope.into(),
            holder: holder.into(),
        }
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error with context
    pub fn config_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create an IO error with a path
    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
            context: None,
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            context: None,
        }
    }

    /// Whether this is a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this reports lost leadership
    pub fn is_not_leader(&self) -> bool {
        matches!(self, Self::NotLeader { .. })
    }
}
