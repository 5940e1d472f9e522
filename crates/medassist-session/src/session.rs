//! Session types: who is signed in, and what the UI should show.

use serde::{Deserialize, Serialize};

/// The signed-in user, as returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Best human-readable label: name, then email, then the numeric id.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| format!("user #{}", self.id))
    }
}

/// A point-in-time view of the session, published on every change.
///
/// ```text
///   loading ──(initialize)──→ authenticated ──(logout / renewal failure)──→ signed out
///      │                                                                       ↑
///      └──────────────(no token / profile fetch failed)────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// A token is held (it may still turn out to be stale).
    pub authenticated: bool,
    /// The profile fetched during initialization, if any.
    pub user: Option<UserProfile>,
    /// `true` until [`initialize`](crate::SessionManager::initialize) resolves.
    pub loading: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            authenticated: false,
            user: None,
            loading: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_deserializes_with_nulls() {
        let profile: UserProfile = serde_json::from_value(serde_json::json!({
            "id": 4,
            "email": "olena@example.com",
            "name": null,
            "avatar_url": null
        }))
        .unwrap();

        assert_eq!(profile.id, 4);
        assert_eq!(profile.display_name(), "olena@example.com");
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let profile = UserProfile {
            id: 9,
            email: None,
            name: None,
            avatar_url: None,
        };

        assert_eq!(profile.display_name(), "user #9");
    }

    #[test]
    fn test_default_snapshot_is_loading() {
        let snapshot = SessionSnapshot::default();

        assert!(snapshot.loading);
        assert!(!snapshot.authenticated);
        assert_eq!(snapshot.user, None);
    }
}
