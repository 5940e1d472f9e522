//! Outgoing request types.

use http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use serde::Serialize;

use crate::TransportError;

/// A fully-described HTTP request.
///
/// Everything is owned and `Clone`, so the same request can be sent twice
/// (once with the stale token, once with the renewed one).
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Adds (or replaces) a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the body.
    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Serializes `value` as the JSON body.
    ///
    /// # Errors
    /// Returns [`TransportError::Encode`] if `value` can't be serialized.
    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, TransportError> {
        Ok(self.body(Body::json(value)?))
    }

    /// Sets `Authorization: Bearer <token>`, replacing any existing value.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidHeader`] if the token contains
    /// characters that aren't allowed in a header value.
    pub fn set_bearer(&mut self, token: &str) -> Result<(), TransportError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TransportError::InvalidHeader(e.to_string()))?;
        value.set_sensitive(true);
        self.headers.insert(header::AUTHORIZATION, value);
        Ok(())
    }

    /// The bearer token currently attached, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }
}

/// A replayable request body.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    /// Raw bytes with an optional content type.
    Bytes {
        content_type: Option<String>,
        data: Vec<u8>,
    },
    /// `multipart/form-data`. The boundary is chosen by the transport.
    Multipart(MultipartForm),
}

impl Body {
    /// JSON-encodes `value` into a `Bytes` body.
    ///
    /// # Errors
    /// Returns [`TransportError::Encode`] if serialization fails.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, TransportError> {
        let data = serde_json::to_vec(value).map_err(TransportError::Encode)?;
        Ok(Self::Bytes {
            content_type: Some("application/json".to_string()),
            data,
        })
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Bytes { data, .. } => data.is_empty(),
            Self::Multipart(form) => form.parts.is_empty(),
        }
    }
}

/// An owned multipart form.
///
/// `reqwest::multipart::Form` is consumed on send and can't be cloned, so
/// forms are kept in this shape and converted per attempt.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub parts: Vec<Part>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plain text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Appends a file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        mime: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.parts.push(Part::File {
            name: name.into(),
            filename: filename.into(),
            mime: mime.into(),
            data,
        });
        self
    }

    /// Looks up a text field by name.
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            Part::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }
}

/// One field of a [`MultipartForm`].
#[derive(Debug, Clone)]
pub enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        mime: String,
        data: Vec<u8>,
    },
}
