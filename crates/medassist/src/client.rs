//! `MedAssistClient` builder and handle.
//!
//! This is the entry point for talking to a MedAssist backend. It ties
//! together all the layers: transport → session → API.

use std::path::PathBuf;
use std::sync::Arc;

use medassist_api::ApiClient;
use medassist_session::{
    FileTokenStore, MemoryTokenStore, Navigator, SessionConfig, SessionManager, SessionSnapshot,
    StaticNavigator, TokenStore, UserProfile,
};
use medassist_transport::ReqwestTransport;

use crate::MedAssistError;

/// Where the access token is kept between runs.
#[derive(Debug, Clone, Default)]
enum Storage {
    /// `<data dir>/medassist/session.json`.
    #[default]
    DataDir,
    File(PathBuf),
    Memory,
}

/// Builder for configuring a [`MedAssistClient`].
///
/// # Example
///
/// ```rust,no_run
/// use medassist::prelude::*;
///
/// # async fn run() -> Result<(), MedAssistError> {
/// let client = MedAssistClient::builder()
///     .api_url("https://medassist.example.com")
///     .build()?;
/// client.initialize().await;
/// let conversations = client.api().list_conversations().await?;
/// # Ok(())
/// # }
/// ```
pub struct MedAssistClientBuilder {
    config: SessionConfig,
    storage: Storage,
    navigator: Option<Arc<dyn Navigator>>,
    refresh_cookie: Option<String>,
}

impl MedAssistClientBuilder {
    /// Creates a builder configured from the environment
    /// (see [`SessionConfig::from_env`]).
    pub fn new() -> Self {
        Self {
            config: SessionConfig::from_env(),
            storage: Storage::default(),
            navigator: None,
            refresh_cookie: None,
        }
    }

    /// Sets the backend root URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    /// Replaces the whole session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Keeps the token in `path` instead of the platform data directory.
    pub fn token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage = Storage::File(path.into());
        self
    }

    /// Keeps the token in memory only.
    pub fn in_memory(mut self) -> Self {
        self.storage = Storage::Memory;
        self
    }

    /// Sets how the client reads its launch URL and starts login.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Seeds the cookie jar with the refresh credential, as a
    /// `Set-Cookie`-style string (`name=value; Path=/auth`).
    pub fn refresh_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.refresh_cookie = Some(cookie.into());
        self
    }

    /// Builds the client. Nothing is sent until the first call.
    ///
    /// # Errors
    /// - [`MedAssistError::Transport`] if the HTTP client can't be built or
    ///   the API URL doesn't parse for the refresh cookie.
    /// - [`MedAssistError::Store`] if there is no platform data directory.
    pub fn build(self) -> Result<MedAssistClient, MedAssistError> {
        let config = self.config.validated();

        let mut transport = ReqwestTransport::new()?;
        if let Some(cookie) = &self.refresh_cookie {
            transport = transport.with_cookie(cookie, &config.api_base_url)?;
        }

        let store: Arc<dyn TokenStore> = match self.storage {
            Storage::DataDir => Arc::new(FileTokenStore::in_data_dir(config.storage_key.clone())?),
            Storage::File(path) => Arc::new(FileTokenStore::new(path, config.storage_key.clone())),
            Storage::Memory => Arc::new(MemoryTokenStore::new()),
        };
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(StaticNavigator::new()));

        tracing::debug!(api = %config.api_base_url, "building MedAssist client");
        let session = SessionManager::builder(transport)
            .config(config)
            .store(store)
            .navigator(navigator)
            .build();

        Ok(MedAssistClient {
            api: ApiClient::new(session),
        })
    }
}

impl Default for MedAssistClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A ready-to-use MedAssist client.
///
/// Call [`initialize()`](Self::initialize) once at startup to restore the
/// session, then make calls through [`api()`](Self::api).
#[derive(Clone)]
pub struct MedAssistClient {
    api: ApiClient<ReqwestTransport>,
}

impl MedAssistClient {
    /// Creates a new builder.
    pub fn builder() -> MedAssistClientBuilder {
        MedAssistClientBuilder::new()
    }

    /// The typed backend endpoints.
    pub fn api(&self) -> &ApiClient<ReqwestTransport> {
        &self.api
    }

    /// The session behind every call.
    pub fn session(&self) -> &SessionManager<ReqwestTransport> {
        self.api.session()
    }

    /// Restores the session (launch URL token, then stored token).
    pub async fn initialize(&self) -> SessionSnapshot {
        self.session().initialize().await
    }

    /// The signed-in user, as loaded by [`initialize()`](Self::initialize).
    pub async fn user(&self) -> Option<UserProfile> {
        self.session().user().await
    }

    /// Starts the identity provider login.
    pub fn login(&self) {
        self.session().login();
    }

    /// Signs out locally and tells the server.
    pub async fn logout(&self) {
        self.session().logout().await;
    }
}
