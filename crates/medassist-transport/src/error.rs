/// Errors that can occur in the transport layer.
///
/// HTTP status codes are never errors here: a 401 or a 500 is a perfectly
/// good [`Response`](crate::Response). Only failures to produce a response
/// at all end up in this enum.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never got a response (DNS, connect, TLS, reset...).
    #[error("request failed: {0}")]
    Request(String),

    /// A header value could not be represented on the wire.
    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    /// A URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Serializing a request body failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// A response body didn't match the expected shape.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
