use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The user identifier is not a valid UUID. Detected before any store access.
    #[error("invalid user id {input:?}: {source}")]
    InvalidUserId {
        input: String,
        #[source]
        source: uuid::Error,
    },
    /// Resolving the user's permission set failed.
    #[error("failed to load user permissions: {0}")]
    PermissionLoadFailed(#[source] StoreError),
    /// A read-only role query failed.
    #[error("failed to {operation}: {source}")]
    RoleQueryFailed {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
    /// A role assignment write failed.
    #[error("failed to {operation}: {source}")]
    RoleMutationFailed {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl Error {
    /// Returns true when the error originated in the store and the call may be retried.
    ///
    /// Invalid input is a caller bug and never retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidUserId { .. })
    }
}
