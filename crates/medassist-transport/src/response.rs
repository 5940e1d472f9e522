//! Buffered response type.

use http::{HeaderMap, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use crate::TransportError;

/// A response with its body already read into memory.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Builds a response with a JSON body. Mostly useful for stub transports.
    ///
    /// # Errors
    /// Returns [`TransportError::Encode`] if `value` can't be serialized.
    pub fn from_json<T: Serialize>(
        status: StatusCode,
        value: &T,
    ) -> Result<Self, TransportError> {
        let body = serde_json::to_vec(value).map_err(TransportError::Encode)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        Ok(Self::new(status, headers, body))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// `true` for 401, the only status the session layer reacts to.
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    /// Returns [`TransportError::Decode`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(TransportError::Decode)
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
