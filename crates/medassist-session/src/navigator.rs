//! Navigation hooks: where the app was opened from, and where login goes.
//!
//! Login is not a network call. The identity provider flow is a full
//! navigation away from the app, and it comes back by re-opening the app
//! with the new token in the URL fragment (`#token=<value>`). The
//! [`Navigator`] trait is how the session manager reads that launch URL,
//! scrubs the token out of it, and starts the login navigation.

use std::sync::{Mutex, PoisonError};

/// The app's view of its own location.
pub trait Navigator: Send + Sync + 'static {
    /// The URL the app is currently showing, if it has one.
    fn current_url(&self) -> Option<String>;

    /// Replaces the visible URL without navigating (history replace).
    fn replace_url(&self, url: &str);

    /// Leaves the app for `url`. Control is not expected to come back.
    fn navigate(&self, url: &str);
}

/// A navigator backed by a plain string. Records every navigation.
///
/// Useful for native front ends that receive the callback URL from a deep
/// link or the command line, and in tests.
#[derive(Debug, Default)]
pub struct StaticNavigator {
    current: Mutex<Option<String>>,
    navigations: Mutex<Vec<String>>,
}

impl StaticNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A navigator whose current URL is `url`.
    pub fn at(url: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(Some(url.into())),
            navigations: Mutex::default(),
        }
    }

    /// Every URL passed to [`Navigator::navigate`], oldest first.
    pub fn navigations(&self) -> Vec<String> {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for StaticNavigator {
    fn current_url(&self) -> Option<String> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace_url(&self, url: &str) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(url.to_string());
    }

    fn navigate(&self, url: &str) {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        self.replace_url(url);
    }
}

/// Pulls a `token=<value>` parameter out of `url`'s fragment.
///
/// Returns the (percent-decoded) token and the URL with that parameter
/// removed. Other fragment parameters are kept; if none are left, the `#`
/// goes too. Returns `None` when there is no non-empty `token` parameter.
pub fn take_fragment_token(url: &str) -> Option<(String, String)> {
    let (base, fragment) = url.split_once('#')?;

    let mut token = None;
    let mut rest = Vec::new();
    for param in fragment.split('&') {
        match param.strip_prefix("token=") {
            Some(value) if token.is_none() && !value.is_empty() => {
                let decoded = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                token = Some(decoded);
            }
            Some(_) => {}
            None if param.is_empty() => {}
            None => rest.push(param),
        }
    }

    let token = token?;
    let stripped = if rest.is_empty() {
        base.to_string()
    } else {
        format!("{base}#{}", rest.join("&"))
    };
    Some((token, stripped))
}
