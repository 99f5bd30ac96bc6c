//! Token store trait abstraction.

use async_trait::async_trait;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Name under which the bearer token is persisted.
pub const TOKEN_KEY: &str = "access_token";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Durable storage for the session's bearer token.
///
/// Tokens are never cleared automatically on expiry; only an explicit
/// `clear` removes them.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the persisted token, if any.
    async fn load(&self) -> Result<Option<String>>;

    /// Persist a token, replacing any previous one.
    async fn save(&self, token: &str) -> Result<()>;

    /// Remove the persisted token. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<()>;
}
