//! Error types for the vmdns system
//!
//! Every failure is fatal to a reconciliation pass. Errors travel up as
//! values and the binary turns them into the exit status.

use thiserror::Error;

/// Result type alias for vmdns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the vmdns system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing variables, malformed endpoint URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inventory session could not be authenticated
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Inventory endpoint could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// Default datacenter could not be resolved
    #[error("Datacenter resolution failed: {0}")]
    NoDatacenter(String),

    /// Inventory listing or property retrieval failed
    #[error("Inventory query failed: {0}")]
    Query(String),

    /// Key-value store could not be dialed
    #[error("Store connect failed: {0}")]
    StoreConnect(String),

    /// Put or delete against the key-value store failed
    #[error("Store write failed for key {key}: {message}")]
    Write {
        /// Key being written
        key: String,
        /// Error message
        message: String,
    },

    /// One or more writes failed under the continue policy
    #[error("{failed} of {total} store writes failed")]
    PartialSync {
        /// Number of failed writes
        failed: usize,
        /// Number of attempted writes
        total: usize,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a datacenter resolution error
    pub fn no_datacenter(msg: impl Into<String>) -> Self {
        Self::NoDatacenter(msg.into())
    }

    /// Create an inventory query error
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create a store connect error
    pub fn store_connect(msg: impl Into<String>) -> Self {
        Self::StoreConnect(msg.into())
    }

    /// Create a store write error
    pub fn write(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_names_the_key() {
        let err = Error::write("/skydns/corp/app1", "connection reset");
        assert_eq!(
            err.to_string(),
            "Store write failed for key /skydns/corp/app1: connection reset"
        );
    }

    #[test]
    fn anyhow_errors_convert_to_other() {
        let err: Error = anyhow::anyhow!("boom").into();
        assert!(matches!(err, Error::Other(ref m) if m == "boom"));
    }
}
