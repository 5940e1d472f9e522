//! Error types for the session layer.
//!
//! Most of the session layer never returns errors: renewal failures turn
//! into "no token" and store failures are logged and absorbed. What's left
//! is the token store itself, which callers may want to construct and
//! inspect directly.

/// Errors from a [`TokenStore`](crate::TokenStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("token store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but isn't a JSON object of strings.
    #[error("token store is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),

    /// No per-user data directory could be determined for this platform.
    #[error("no data directory available on this platform")]
    NoDataDir,
}
