/// All errors that can be returned by an `AuditStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An entry could not be serialized or deserialized by the backend.
    #[error("audit entry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A backend-specific storage error (connection, I/O, etc.).
    #[error("audit store backend error: {0}")]
    Backend(String),
}
