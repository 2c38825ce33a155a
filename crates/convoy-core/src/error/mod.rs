//! Error types for Convoy
//!
//! Every fallible operation in the coordination core returns a [`ConvoyError`].
//! Errors fall into a small taxonomy:
//! - recoverable conditions the caller decides about (not found, aborted
//!   assertions, timeouts, lost leadership)
//! - fatal conditions (invalid persisted state, broken invariants) that must
//!   stop processing; see [`ConvoyError::is_fatal`]

mod constructors;
mod context;
mod conversions;
mod types;
mod unified_error;

pub use types::{ConvoyError, ConvoyResult, OptionExt, ResultExt, UnifiedError};
