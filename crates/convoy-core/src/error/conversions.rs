//! Conversions from external error types into ConvoyError

use super::types::ConvoyError;
use crate::store::StoreError;

impl From<std::io::Error> for ConvoyError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
            path: None,
            context: None,
        }
    }
}

impl From<serde_json::Error> for ConvoyError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string())
    }
}

impl From<StoreError> for ConvoyError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Aborted { collection, id } => Self::aborted(collection, id),
            StoreError::Serialization(message) => Self::serialization(message),
            other => Self::store(other.to_string()),
        }
    }
}
