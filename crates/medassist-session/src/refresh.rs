//! Single-flight token renewal.
//!
//! Both the proactive timer and any number of requests that just got a
//! 401 may want a new token at the same moment. They must all share one
//! call to the refresh endpoint: refresh tokens may rotate server-side,
//! and a second concurrent call could invalidate the first one's result.
//!
//! The in-flight call is stored as a [`Shared`] future. The first caller
//! creates it; later callers clone it and await the same output. Whoever
//! observes completion first clears the slot, so the next caller after
//! that starts a fresh call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use medassist_transport::{Request, Transport};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::AccessToken;

type InFlight = Shared<BoxFuture<'static, Option<AccessToken>>>;

/// Body of a successful refresh response.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Issues refresh calls, at most one at a time.
pub(crate) struct Refresher<T: Transport> {
    transport: Arc<T>,
    url: String,
    in_flight: Mutex<Option<InFlight>>,
}

impl<T: Transport> Refresher<T> {
    pub(crate) fn new(transport: Arc<T>, url: String) -> Self {
        Self {
            transport,
            url,
            in_flight: Mutex::new(None),
        }
    }

    /// Returns a new access token, or `None` if renewal failed.
    ///
    /// Joins the in-flight call if there is one.
    pub(crate) async fn refresh(&self) -> Option<AccessToken> {
        let call = {
            let mut slot = self.slot();
            match slot.as_ref() {
                Some(call) => {
                    debug!("joining in-flight token refresh");
                    call.clone()
                }
                None => {
                    let call = request_token(Arc::clone(&self.transport), self.url.clone())
                        .boxed()
                        .shared();
                    *slot = Some(call.clone());
                    call
                }
            }
        };

        let outcome = call.clone().await;

        // Settled: clear the marker unless someone already replaced it.
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&call)) {
            *slot = None;
        }
        outcome
    }

    /// Whether a refresh call is currently pending.
    pub(crate) fn is_in_flight(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One call to the refresh endpoint. Every failure becomes `None`.
///
/// No `Authorization` header: the refresh endpoint authenticates with
/// the transport's cookie, never with the (possibly expired) access token.
async fn request_token<T: Transport>(transport: Arc<T>, url: String) -> Option<AccessToken> {
    info!("renewing access token");
    let response = match transport.send(Request::post(url)).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "token refresh request failed");
            return None;
        }
    };

    if !response.is_success() {
        info!(status = %response.status(), "token refresh rejected");
        return None;
    }

    match response.json::<RefreshResponse>() {
        Ok(RefreshResponse {
            access_token: Some(token),
        }) if !token.is_empty() => {
            debug!("token refresh succeeded");
            Some(AccessToken::new(token))
        }
        Ok(_) => {
            warn!("token refresh response carried no access token");
            None
        }
        Err(e) => {
            warn!(error = %e, "token refresh response was malformed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use medassist_transport::{HeaderMap, Response, StatusCode, TransportError};
    use tokio::sync::Notify;

    use super::*;

    /// Counts calls and answers each one after `gate` is notified.
    struct GatedTransport {
        calls: AtomicUsize,
        gate: Notify,
        reply: fn(usize) -> Result<Response, TransportError>,
    }

    impl GatedTransport {
        fn new(reply: fn(usize) -> Result<Response, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
                reply,
            })
        }
    }

    impl Transport for GatedTransport {
        async fn send(&self, request: Request) -> Result<Response, TransportError> {
            assert_eq!(request.bearer_token(), None, "refresh must not send the access token");
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.gate.notified().await;
            (self.reply)(n)
        }
    }

    fn token_reply(n: usize) -> Result<Response, TransportError> {
        Response::from_json(
            StatusCode::OK,
            &serde_json::json!({ "access_token": format!("token-{n}") }),
        )
    }

    fn refresher(transport: &Arc<GatedTransport>) -> Refresher<GatedTransport> {
        Refresher::new(Arc::clone(transport), "http://api/auth/refresh".into())
    }

    #[tokio::test]
    async fn test_refresh_concurrent_callers_share_one_call() {
        let transport = GatedTransport::new(token_reply);
        let refresher = refresher(&transport);

        let (a, b, _) = tokio::join!(refresher.refresh(), refresher.refresh(), async {
            // Let both callers reach the transport before answering.
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            transport.gate.notify_one();
        });

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, Some(AccessToken::new("token-1")));
        assert_eq!(a, b);
        assert!(!refresher.is_in_flight());
    }

    #[tokio::test]
    async fn test_refresh_after_settle_issues_new_call() {
        let transport = GatedTransport::new(token_reply);
        let refresher = refresher(&transport);

        transport.gate.notify_one();
        let first = refresher.refresh().await;
        transport.gate.notify_one();
        let second = refresher.refresh().await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(first, Some(AccessToken::new("token-1")));
        assert_eq!(second, Some(AccessToken::new("token-2")));
    }

    #[tokio::test]
    async fn test_refresh_rejected_returns_none() {
        let transport = GatedTransport::new(|_| {
            Ok(Response::new(StatusCode::UNAUTHORIZED, HeaderMap::new(), Vec::new()))
        });
        let refresher = refresher(&transport);

        transport.gate.notify_one();

        assert_eq!(refresher.refresh().await, None);
    }

    #[tokio::test]
    async fn test_refresh_network_error_returns_none() {
        let transport =
            GatedTransport::new(|_| Err(TransportError::Request("connection reset".into())));
        let refresher = refresher(&transport);

        transport.gate.notify_one();

        assert_eq!(refresher.refresh().await, None);
    }

    #[tokio::test]
    async fn test_refresh_missing_or_malformed_body_returns_none() {
        let missing = GatedTransport::new(|_| {
            Response::from_json(StatusCode::OK, &serde_json::json!({ "token_type": "bearer" }))
        });
        let malformed = GatedTransport::new(|_| {
            Ok(Response::new(StatusCode::OK, HeaderMap::new(), b"ok".to_vec()))
        });

        missing.gate.notify_one();
        malformed.gate.notify_one();

        assert_eq!(refresher(&missing).refresh().await, None);
        assert_eq!(refresher(&malformed).refresh().await, None);
    }
}
