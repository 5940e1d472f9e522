//! HTTP transport abstraction for MedAssist.
//!
//! Provides the [`Transport`] trait that the session layer issues every
//! network call through, plus fully-buffered [`Request`] / [`Response`]
//! types. Requests are cheap to clone and their bodies are replayable,
//! which is what lets the session layer retry a request after renewing
//! the access token.
//!
//! # Feature Flags
//!
//! - `reqwest` (default): [`ReqwestTransport`], backed by a cookie-aware
//!   `reqwest::Client`

mod error;
mod request;
mod response;
#[cfg(feature = "reqwest")]
mod reqwest_transport;

pub use error::TransportError;
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
pub use request::{Body, MultipartForm, Part, Request};
pub use response::Response;
#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;

use std::future::Future;
use std::sync::Arc;

/// Sends HTTP requests and returns buffered responses.
///
/// Implementations are responsible for the ambient credential: whatever
/// cookie jar the transport carries is attached to every request, whether
/// or not the request also has an `Authorization` header.
pub trait Transport: Send + Sync + 'static {
    /// Sends the request and waits for the full response body.
    ///
    /// Returns `Err` only when no response was received. Non-2xx statuses
    /// come back as `Ok`.
    fn send(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send {
        (**self).send(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Answers every request with the same status.
    struct FixedStatus(StatusCode);

    impl Transport for FixedStatus {
        async fn send(
            &self,
            _request: Request,
        ) -> Result<Response, TransportError> {
            Ok(Response::new(self.0, HeaderMap::new(), Vec::new()))
        }
    }

    #[tokio::test]
    async fn test_arc_transport_delegates_to_inner() {
        let transport = Arc::new(FixedStatus(StatusCode::IM_A_TEAPOT));

        let response = transport
            .send(Request::get("http://localhost/health"))
            .await
            .expect("fixed transport never fails");

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }
}
