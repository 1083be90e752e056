// Errors - Store, subscription and shortlist failures

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Failure reported by a document store on a live notification channel.
///
/// Carried as state by [`crate::subscription::CollectionSubscription`],
/// never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The store refused to serve the collection.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The store could not be reached or is not configured.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The channel broke while delivering notifications.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl Serialize for SubscriptionError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Why a record could not be put on the shortlist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortlistError {
    #[error("no record {id} in {collection}")]
    NotFound { collection: String, id: String },

    /// Mirrors the disabled add button on out-of-stock cards.
    #[error("{0} is out of stock")]
    OutOfStock(String),
}

/// Store-side errors (SQLite store, importer).
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON payload (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reader error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Collection name not known to the importer.
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
}

impl From<StoreError> for SubscriptionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => SubscriptionError::Unavailable(e.to_string()),
            other => SubscriptionError::Transport(other.to_string()),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_error_serializes_as_message() {
        let err = SubscriptionError::PermissionDenied("medicine-1".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"permission denied: medicine-1\"");
    }

    #[test]
    fn test_store_error_maps_to_transport() {
        let err = StoreError::UnknownCollection("medicine-9".to_string());
        let sub: SubscriptionError = err.into();
        assert_eq!(
            sub,
            SubscriptionError::Transport("Unknown collection: medicine-9".to_string())
        );
    }
}
