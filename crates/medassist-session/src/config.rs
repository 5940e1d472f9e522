//! Session configuration.

use std::time::Duration;

use tracing::warn;

/// Endpoint layout and renewal tuning for a [`SessionManager`](crate::SessionManager).
///
/// Paths are relative to `api_base_url`. Use [`Default`] and override the
/// fields you care about, or [`from_env`](Self::from_env).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Root every relative request path is resolved against.
    pub api_base_url: String,
    /// `POST` here with the refresh cookie to get a new access token.
    pub refresh_path: String,
    /// Best-effort `POST` on logout.
    pub logout_path: String,
    /// Returns the signed-in user's profile.
    pub profile_path: String,
    /// Where login navigates to (identity provider redirect).
    pub login_path: String,
    /// Token store key holding the access token.
    pub storage_key: String,
    /// How long before expiry a token counts as "expiring soon".
    ///
    /// Default: 60 seconds.
    pub expiry_buffer: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: Self::DEFAULT_API_BASE_URL.to_string(),
            refresh_path: "/auth/refresh".to_string(),
            logout_path: "/auth/logout".to_string(),
            profile_path: "/auth/me".to_string(),
            login_path: "/auth/google".to_string(),
            storage_key: "token".to_string(),
            expiry_buffer: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    pub const DEFAULT_API_BASE_URL: &'static str = "http://localhost:8000";

    /// Largest accepted expiry buffer. Access tokens live 30 minutes by
    /// default; a buffer longer than that would renew on every request.
    pub const MAX_EXPIRY_BUFFER: Duration = Duration::from_secs(15 * 60);

    /// Environment variable overriding `api_base_url`.
    pub const ENV_API_URL: &'static str = "MEDASSIST_API_URL";

    /// Environment variable overriding `expiry_buffer` (whole seconds).
    pub const ENV_EXPIRY_BUFFER_SECS: &'static str = "MEDASSIST_EXPIRY_BUFFER_SECS";

    /// Creates a config pointing at `api_base_url` with default paths.
    pub fn with_api_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Default::default()
        }
    }

    /// Reads overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup` (an environment stand-in).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(Self::ENV_API_URL) {
            config.api_base_url = url;
        }
        if let Some(raw) = lookup(Self::ENV_EXPIRY_BUFFER_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => config.expiry_buffer = Duration::from_secs(secs),
                Err(_) => warn!(
                    value = %raw,
                    var = Self::ENV_EXPIRY_BUFFER_SECS,
                    "ignoring unparseable expiry buffer"
                ),
            }
        }
        config.validated()
    }

    /// Normalizes the config so it is safe to use.
    ///
    /// Called automatically by the session manager builder. Rules:
    /// - Trailing `/` stripped from `api_base_url`; empty falls back to the default.
    /// - Empty paths fall back to their defaults; a missing leading `/` is added.
    /// - `expiry_buffer` capped to [`Self::MAX_EXPIRY_BUFFER`].
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        let trimmed = self.api_base_url.trim().trim_end_matches('/');
        self.api_base_url = if trimmed.is_empty() {
            defaults.api_base_url.clone()
        } else {
            trimmed.to_string()
        };

        normalize_path(&mut self.refresh_path, &defaults.refresh_path);
        normalize_path(&mut self.logout_path, &defaults.logout_path);
        normalize_path(&mut self.profile_path, &defaults.profile_path);
        normalize_path(&mut self.login_path, &defaults.login_path);

        if self.storage_key.trim().is_empty() {
            self.storage_key = defaults.storage_key;
        }

        if self.expiry_buffer > Self::MAX_EXPIRY_BUFFER {
            warn!(
                buffer_secs = self.expiry_buffer.as_secs(),
                max_secs = Self::MAX_EXPIRY_BUFFER.as_secs(),
                "expiry buffer exceeds maximum, clamping"
            );
            self.expiry_buffer = Self::MAX_EXPIRY_BUFFER;
        }
        self
    }

    /// Resolves `path` against the API root. Absolute URLs pass through.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.api_base_url)
        } else {
            format!("{}/{path}", self.api_base_url)
        }
    }

    pub fn refresh_url(&self) -> String {
        self.resolve(&self.refresh_path)
    }

    pub fn logout_url(&self) -> String {
        self.resolve(&self.logout_path)
    }

    pub fn login_url(&self) -> String {
        self.resolve(&self.login_path)
    }
}

fn normalize_path(path: &mut String, default: &str) {
    let trimmed = path.trim();
    *path = if trimmed.is_empty() {
        default.to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
}
