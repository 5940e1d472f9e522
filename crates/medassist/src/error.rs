//! Unified error type for the MedAssist client.

use medassist_api::ApiError;
use medassist_session::StoreError;
use medassist_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `medassist` crate, you deal with this single error type
/// instead of importing errors from each layer. The `#[from]` attribute on
/// each variant generates the `From` impl, so `?` converts automatically.
#[derive(Debug, thiserror::Error)]
pub enum MedAssistError {
    /// A transport-level error (client setup, connect, decode).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The token store could not be opened or read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A backend call failed (status, sign-in required, bad input).
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl MedAssistError {
    /// Whether the user has to sign in again to continue.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(ApiError::Unauthorized))
    }
}
