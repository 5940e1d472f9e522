//! [`Transport`] implementation on top of `reqwest`.

use std::sync::Arc;

use reqwest::cookie::Jar;

use crate::{Body, Part, Request, Response, Transport, TransportError};

/// A cookie-aware `reqwest` client.
///
/// The cookie jar is the ambient credential: the refresh endpoint's cookie
/// set by the server (or seeded with [`with_cookie`](Self::with_cookie))
/// is sent on every request.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl ReqwestTransport {
    /// Builds a client with an empty cookie jar.
    ///
    /// # Errors
    /// Returns [`TransportError::Request`] if the TLS backend fails to
    /// initialize.
    pub fn new() -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client, jar })
    }

    /// Seeds the jar with a `Set-Cookie`-style string scoped to `url`.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidUrl`] if `url` doesn't parse.
    pub fn with_cookie(self, cookie: &str, url: &str) -> Result<Self, TransportError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        self.jar.add_cookie_str(cookie, &url);
        tracing::debug!(%url, "seeded cookie jar");
        Ok(self)
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let Request {
            method,
            url,
            headers,
            body,
        } = request;

        tracing::trace!(%method, %url, "sending request");

        let mut builder = self.client.request(method, &url).headers(headers);
        builder = match body {
            Body::Empty => builder,
            Body::Bytes { content_type, data } => {
                if let Some(content_type) = content_type {
                    builder = builder.header(http::header::CONTENT_TYPE, content_type);
                }
                builder.body(data)
            }
            Body::Multipart(form) => builder.multipart(into_reqwest_form(form.parts)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        tracing::trace!(%status, len = body.len(), "received response");
        Ok(Response::new(status, headers, body.to_vec()))
    }
}

fn into_reqwest_form(
    parts: Vec<Part>,
) -> Result<reqwest::multipart::Form, TransportError> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match part {
            Part::Text { name, value } => form.text(name, value),
            Part::File {
                name,
                filename,
                mime,
                data,
            } => {
                let file = reqwest::multipart::Part::bytes(data)
                    .file_name(filename)
                    .mime_str(&mime)
                    .map_err(|e| TransportError::InvalidHeader(e.to_string()))?;
                form.part(name, file)
            }
        };
    }
    Ok(form)
}
