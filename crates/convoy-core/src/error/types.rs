//! Core error types and traits for Convoy

use thiserror::Error;

/// Result type alias for Convoy operations
pub type ConvoyResult<T> = Result<T, ConvoyError>;

/// Unified error trait implemented by the Convoy error types.
///
/// Gives every error a stable code for programmatic handling, the bare
/// message, the optional context it was wrapped with, and whether it must
/// halt the agent.
pub trait UnifiedError: std::error::Error + Send + Sync {
    /// Get the error code for programmatic handling
    fn error_code(&self) -> &str;

    /// Get the human-readable error message
    fn message(&self) -> &str;

    /// Get optional context about the error
    fn context(&self) -> Option<&str> {
        None
    }

    /// Whether the error signals a broken invariant rather than a runtime condition
    fn is_fatal(&self) -> bool {
        false
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<C: std::fmt::Display>(self, context: C) -> ConvoyResult<T>;

    /// Add context lazily (only evaluated on error)
    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, f: F) -> ConvoyResult<T>;
}

impl<T, E: Into<ConvoyError>> ResultExt<T> for Result<T, E> {
    fn context<C: std::fmt::Display>(self, context: C) -> ConvoyResult<T> {
        self.map_err(|e| e.into().with_context(context.to_string()))
    }

    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, f: F) -> ConvoyResult<T> {
        self.map_err(|e| e.into().with_context(f().to_string()))
    }
}

/// Extension trait for turning a missing value into a not-found error
pub trait OptionExt<T> {
    /// Convert `None` into a not-found error describing what was missing
    fn or_not_found<C: std::fmt::Display>(self, what: C) -> ConvoyResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found<C: std::fmt::Display>(self, what: C) -> ConvoyResult<T> {
        self.ok_or_else(|| ConvoyError::not_found(what.to_string()))
    }
}

/// Renders an optional context as a `"<context>: "` prefix
pub(crate) fn prefix(context: &Option<String>) -> String {
    match context {
        Some(ctx) => format!("{}: ", ctx),
        None => String::new(),
    }
}

/// Main error type for Convoy
#[derive(Error, Debug, Clone)]
pub enum ConvoyError {
    /// An entity or document vanished underneath a cached handle
    #[error("{}{message} not found", prefix(.context))]
    NotFound {
        message: String,
        context: Option<String>,
    },

    /// A conditional store update's assertion did not hold
    #[error("{}transaction aborted: assertion failed on {collection}/{id}", prefix(.context))]
    Aborted {
        collection: String,
        id: String,
        context: Option<String>,
    },

    /// An entity is not alive when the operation requires it to be
    #[error("{}{message} is not alive", prefix(.context))]
    NotAlive {
        message: String,
        context: Option<String>,
    },

    /// A bounded wait exceeded its deadline
    #[error("{}{message} after {after_ms}ms", prefix(.context))]
    Timeout {
        message: String,
        after_ms: u64,
        context: Option<String>,
    },

    /// The surrounding task was cancelled
    #[error("operation was cancelled")]
    Cancelled,

    /// Persisted or supplied data is malformed; fatal
    #[error("{}invalid state: {message}", prefix(.context))]
    InvalidState {
        message: String,
        context: Option<String>,
    },

    /// An internal invariant was violated; fatal
    #[error("{}invariant violated: {message}", prefix(.context))]
    InvariantViolation {
        message: String,
        context: Option<String>,
    },

    /// The holder no longer leads the scope
    #[error("{holder} is not leader of {scope}")]
    NotLeader { scope: String, holder: String },

    /// A lease claim was refused because another holder owns the scope
    #[error("leadership claim of {scope} by {holder} denied: held by {current_holder}")]
    ClaimDenied {
        scope: String,
        holder: String,
        current_holder: String,
    },

    /// A pinger was started twice
    #[error("pinger for {key} already started")]
    AlreadyStarted { key: String },

    /// Store backend failure
    #[error("{}store error: {message}", prefix(.context))]
    Store {
        message: String,
        context: Option<String>,
    },

    /// Configuration related errors
    #[error("{}configuration error: {message}", prefix(.context))]
    Config {
        message: String,
        context: Option<String>,
    },

    /// IO errors
    #[error("{}IO error: {message}", prefix(.context))]
    Io {
        message: String,
        path: Option<String>,
        context: Option<String>,
    },

    /// Serialization/deserialization errors
    #[error("{}serialization error: {message}", prefix(.context))]
    Serialization {
        message: String,
        context: Option<String>,
    },
}
