//! The session manager: owns the access token and everything that touches it.
//!
//! Responsibilities:
//! - Picking up the initial token (URL fragment, then token store)
//! - Loading the user profile once at startup
//! - Renewing the token before it expires (timer) and after a 401
//! - Attaching the token to every request made through [`SessionManager::fetch`]
//! - Logging out
//!
//! # Concurrency note
//!
//! All mutable state sits behind one `tokio::sync::Mutex`, and neither
//! network calls nor token-store I/O happen while it is held. Store writes
//! queue on a separate lock and always write the token that is current
//! when their turn comes, so the store converges on the in-memory token.
//! Renewal is single-flight (see [`refresh`](crate::refresh)). Ending a
//! session bumps an epoch counter, and a renewal that started in an
//! earlier epoch never re-installs its token.

use std::sync::{Arc, Weak};

use medassist_transport::{
    Body, HeaderMap, HeaderName, HeaderValue, Method, Request, Response, Transport,
    TransportError,
};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::refresh::Refresher;
use crate::timer::RenewalTimer;
use crate::{
    AccessToken, Clock, MemoryTokenStore, Navigator, SessionConfig, SessionSnapshot,
    StaticNavigator, SystemClock, TokenStore, UserProfile, take_fragment_token,
};

// ---------------------------------------------------------------------------
// FetchOptions
// ---------------------------------------------------------------------------

/// Method, headers and body for [`SessionManager::fetch`].
///
/// Defaults to a bodiless `GET`.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Body,
}

impl FetchOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self::with_method(Method::POST)
    }

    pub fn delete() -> Self {
        Self::with_method(Method::DELETE)
    }

    pub fn with_method(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Sets a JSON body.
    ///
    /// # Errors
    /// Returns [`TransportError::Encode`] if `value` can't be serialized.
    pub fn json<B: Serialize>(self, value: &B) -> Result<Self, TransportError> {
        Ok(self.body(Body::json(value)?))
    }

    fn into_request(self, url: String) -> Request {
        Request {
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`SessionManager`].
///
/// Everything but the transport has a default: [`SessionConfig::default`],
/// an in-memory token store, a navigator with no URL, and the system clock.
pub struct SessionManagerBuilder<T: Transport> {
    transport: T,
    config: SessionConfig,
    store: Option<Arc<dyn TokenStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    clock: Option<Arc<dyn Clock>>,
}

impl<T: Transport> SessionManagerBuilder<T> {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> SessionManager<T> {
        let config = self.config.validated();
        let transport = Arc::new(self.transport);
        let refresher = Refresher::new(Arc::clone(&transport), config.refresh_url());
        let (snapshot, _) = watch::channel(SessionSnapshot::default());

        SessionManager {
            inner: Arc::new(Inner {
                transport,
                refresher,
                store: self.store.unwrap_or_else(|| Arc::new(MemoryTokenStore::new())),
                navigator: self.navigator.unwrap_or_else(|| Arc::new(StaticNavigator::new())),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                config,
                state: Mutex::new(State::default()),
                store_lock: Mutex::new(()),
                snapshot,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// The single owner of the access token.
///
/// Cheap to clone; every clone talks to the same session. Construct one at
/// startup and hand clones to whatever needs to call the backend.
///
/// ## Lifecycle
///
/// ```text
/// builder().build() ──→ initialize() ──→ fetch() ... fetch() ──→ logout()
///                           │                 │
///                           ▼                 ▼
///                    timer armed ──→ renew ──→ timer re-armed
///                                      │
///                                      ▼ (renewal failed)
///                                  signed out
/// ```
pub struct SessionManager<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for SessionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> SessionManager<T> {
    /// Starts building a manager around `transport`.
    pub fn builder(transport: T) -> SessionManagerBuilder<T> {
        SessionManagerBuilder {
            transport,
            config: SessionConfig::default(),
            store: None,
            navigator: None,
            clock: None,
        }
    }

    /// Restores the session: picks up the initial token, loads the
    /// profile, arms the renewal timer.
    ///
    /// Only the first call does anything; later calls return the current
    /// snapshot.
    pub async fn initialize(&self) -> SessionSnapshot {
        self.inner.initialize().await
    }

    /// Calls a protected endpoint with the current token attached.
    ///
    /// `path` is either an absolute URL or a path under the API root. A
    /// token that is about to expire is renewed first; a 401 triggers one
    /// renewal and one retry. HTTP errors come back as `Ok(response)`.
    ///
    /// # Errors
    /// Only when the resource request itself gets no response, or the
    /// token can't be put in a header.
    pub async fn fetch(
        &self,
        path: &str,
        options: FetchOptions,
    ) -> Result<Response, TransportError> {
        self.inner.fetch(path, options).await
    }

    /// `fetch` with [`FetchOptions::get`].
    pub async fn get(&self, path: &str) -> Result<Response, TransportError> {
        self.fetch(path, FetchOptions::get()).await
    }

    /// Leaves for the identity provider's login page.
    pub fn login(&self) {
        self.inner.login();
    }

    /// Ends the session locally, telling the server on a best-effort basis.
    pub async fn logout(&self) {
        self.inner.logout().await;
    }

    /// The current access token, if any.
    pub async fn token(&self) -> Option<AccessToken> {
        self.inner.state.lock().await.token.clone()
    }

    /// The profile loaded during initialization, if any.
    pub async fn user(&self) -> Option<UserProfile> {
        self.inner.state.lock().await.user.clone()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Receives a new snapshot on every session change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Whether a proactive renewal timer is pending.
    pub async fn renewal_scheduled(&self) -> bool {
        self.inner.state.lock().await.timer.is_armed()
    }

    /// Whether a refresh call is currently in flight.
    pub fn renewal_in_flight(&self) -> bool {
        self.inner.refresher.is_in_flight()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct State {
    token: Option<AccessToken>,
    user: Option<UserProfile>,
    initialized: bool,
    loaded: bool,
    /// Bumped whenever the session is cleared. Renewals started in an
    /// older epoch are discarded.
    epoch: u64,
    timer: RenewalTimer,
}

impl State {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            authenticated: self.token.is_some(),
            user: self.user.clone(),
            loading: !self.loaded,
        }
    }
}

struct Inner<T: Transport> {
    config: SessionConfig,
    transport: Arc<T>,
    refresher: Refresher<T>,
    store: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    /// Serializes token-store writes.
    store_lock: Mutex<()>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl<T: Transport> Inner<T> {
    async fn initialize(self: &Arc<Self>) -> SessionSnapshot {
        {
            let mut state = self.state.lock().await;
            if state.initialized {
                debug!("session already initialized");
                return state.snapshot();
            }
            state.initialized = true;
        }

        let (token, from_fragment) = match self.fragment_token() {
            Some(token) => (Some(token), true),
            None => (self.stored_token(), false),
        };

        match token {
            Some(token) => {
                let epoch = {
                    let mut state = self.state.lock().await;
                    state.token = Some(token);
                    self.publish(&state);
                    state.epoch
                };
                if from_fragment {
                    self.sync_store().await;
                }

                match self.load_profile().await {
                    Some(profile) => {
                        let mut state = self.state.lock().await;
                        if state.epoch == epoch {
                            if let Some(token) = state.token.clone() {
                                info!(user_id = profile.id, "session restored");
                                state.user = Some(profile);
                                self.schedule_renewal(&mut state, &token);
                            }
                        }
                    }
                    None => self.clear_session().await,
                }
            }
            None => debug!("no access token found, starting signed out"),
        }

        let mut state = self.state.lock().await;
        state.loaded = true;
        self.publish(&state);
        state.snapshot()
    }

    /// Takes a token out of the launch URL, scrubbing it from the address.
    fn fragment_token(&self) -> Option<AccessToken> {
        let url = self.navigator.current_url()?;
        let (token, stripped) = take_fragment_token(&url)?;
        info!("access token delivered in URL fragment");
        self.navigator.replace_url(&stripped);
        Some(AccessToken::new(token))
    }

    fn stored_token(&self) -> Option<AccessToken> {
        match self.store.load() {
            Ok(token) => token.filter(|t| !t.is_empty()).map(AccessToken::new),
            Err(e) => {
                warn!(error = %e, "could not read token store");
                None
            }
        }
    }

    async fn load_profile(self: &Arc<Self>) -> Option<UserProfile> {
        let path = self.config.profile_path.clone();
        match self.fetch(&path, FetchOptions::get()).await {
            Ok(response) if response.is_success() => match response.json::<UserProfile>() {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(error = %e, "profile response was malformed");
                    None
                }
            },
            Ok(response) => {
                info!(status = %response.status(), "profile request rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "profile request failed");
                None
            }
        }
    }

    async fn fetch(
        self: &Arc<Self>,
        path: &str,
        options: FetchOptions,
    ) -> Result<Response, TransportError> {
        let request = options.into_request(self.config.resolve(path));

        let mut token = self.current_token().await;
        let expiring = token.as_ref().is_some_and(|t| {
            t.is_expiring_soon(self.clock.now_millis(), self.config.expiry_buffer)
        });
        if expiring {
            debug!(url = %request.url, "access token expiring soon, renewing first");
            match self.renew().await {
                Some(renewed) => token = Some(renewed),
                None => debug!("pre-flight renewal failed, sending current token"),
            }
        }

        let response = self.transport.send(authorized(&request, token.as_ref())?).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        info!(url = %request.url, "request unauthorized, renewing access token");
        match self.renew().await {
            Some(renewed) => {
                debug!(url = %request.url, "retrying with renewed token");
                self.transport.send(authorized(&request, Some(&renewed))?).await
            }
            None => {
                self.clear_session().await;
                Ok(response)
            }
        }
    }

    /// In-memory token, falling back to the store.
    async fn current_token(&self) -> Option<AccessToken> {
        let token = self.state.lock().await.token.clone();
        token.or_else(|| self.stored_token())
    }

    /// Runs (or joins) a renewal and installs the result.
    async fn renew(self: &Arc<Self>) -> Option<AccessToken> {
        let epoch = self.state.lock().await.epoch;
        let token = self.refresher.refresh().await?;
        self.install_token(token, epoch).await
    }

    async fn install_token(
        self: &Arc<Self>,
        token: AccessToken,
        epoch: u64,
    ) -> Option<AccessToken> {
        {
            let mut state = self.state.lock().await;
            if state.epoch != epoch {
                debug!("session ended during renewal, discarding renewed token");
                return None;
            }
            // Every caller that joined the same refresh lands here; only the
            // first one has anything to do.
            if state.token.as_ref() == Some(&token) {
                return Some(token);
            }

            state.token = Some(token.clone());
            self.schedule_renewal(&mut state, &token);
            self.publish(&state);
        }

        self.sync_store().await;
        debug!("renewed access token installed");
        Some(token)
    }

    /// Arms the proactive timer for `token`, replacing any pending one.
    fn schedule_renewal(self: &Arc<Self>, state: &mut State, token: &AccessToken) {
        state.timer.cancel();

        let now = self.clock.now_millis();
        let Some(delay) = token.renewal_delay(now, self.config.expiry_buffer) else {
            debug!("token expiry unknown or inside the buffer, renewal timer not armed");
            return;
        };

        let generation = state.timer.next_generation();
        let session: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = session.upgrade() {
                inner.on_timer_fired(generation).await;
            }
        });
        state.timer.arm(generation, handle);
        debug!(generation, delay_secs = delay.as_secs(), "renewal timer armed");
    }

    async fn on_timer_fired(self: &Arc<Self>, generation: u64) {
        if !self.state.lock().await.timer.claim(generation) {
            debug!(generation, "superseded renewal timer fired, ignoring");
            return;
        }

        info!(generation, "renewal timer fired");
        if self.renew().await.is_none() {
            warn!("proactive renewal failed, ending session");
            self.clear_session().await;
        }
    }

    fn login(&self) {
        let url = self.config.login_url();
        info!(%url, "navigating to identity provider");
        self.navigator.navigate(&url);
    }

    async fn logout(&self) {
        let token = self.state.lock().await.token.clone();
        let token = token.or_else(|| self.stored_token());

        self.clear_session().await;
        self.notify_logout(token.as_ref()).await;
        // A request made while the notification was out may have renewed
        // its way back in. That token belongs to the ended session too.
        self.clear_session().await;
        info!("signed out");
    }

    /// Best-effort revoke call. Never fails the logout.
    async fn notify_logout(&self, token: Option<&AccessToken>) {
        let request = match authorized(&Request::post(self.config.logout_url()), token) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "skipping logout notification");
                return;
            }
        };
        match self.transport.send(request).await {
            Ok(response) => debug!(status = %response.status(), "logout notification sent"),
            Err(e) => warn!(error = %e, "logout notification failed, signing out locally"),
        }
    }

    /// Drops the token and profile and ends the current epoch.
    async fn clear_session(&self) {
        {
            let mut state = self.state.lock().await;
            state.epoch += 1;
            state.timer.cancel();
            let had_session = state.token.is_some() || state.user.is_some();
            state.token = None;
            state.user = None;
            self.publish(&state);
            if had_session {
                info!("session cleared");
            }
        }
        self.sync_store().await;
    }

    /// Writes the current in-memory token to the store, or clears the store
    /// when there is none.
    ///
    /// Store failures are non-fatal: the in-memory session carries on.
    async fn sync_store(&self) {
        let _turn = self.store_lock.lock().await;
        let token = self.state.lock().await.token.clone();
        match token {
            Some(token) => {
                if let Err(e) = self.store.save(token.as_str()) {
                    warn!(error = %e, "could not persist access token, keeping it in memory only");
                }
            }
            None => {
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "could not clear token store");
                }
            }
        }
    }

    fn publish(&self, state: &State) {
        self.snapshot.send_replace(state.snapshot());
    }
}

impl<T: Transport> Drop for Inner<T> {
    fn drop(&mut self) {
        self.state.get_mut().timer.cancel();
    }
}

/// A copy of `request` carrying `token` as its bearer credential.
fn authorized(request: &Request, token: Option<&AccessToken>) -> Result<Request, TransportError> {
    let mut request = request.clone();
    if let Some(token) = token {
        request.set_bearer(token.as_str())?;
    }
    Ok(request)
}
