//! Access-token session management for MedAssist.
//!
//! This crate owns the client side of authentication:
//!
//! 1. **Token lifecycle**: picking the token up from the login redirect
//!    or the [`TokenStore`], decoding its expiry, renewing it before it
//!    runs out ([`SessionManager`])
//! 2. **Authenticated fetch**: attaching the token to every backend call and
//!    recovering from a 401 with one renewal and one retry
//! 3. **Sign-in and sign-out**: navigating to the identity provider
//!    ([`Navigator`]) and ending the session
//!
//! # How it fits in the stack
//!
//! ```text
//! API Layer (above)  ← typed endpoints, all calls go through SessionManager::fetch
//!     ↕
//! Session Layer (this crate)  ← token, profile, renewal timer
//!     ↕
//! Transport Layer (below)  ← one HTTP exchange per Request
//! ```

mod config;
mod error;
mod manager;
mod navigator;
mod refresh;
mod session;
mod store;
mod timer;
mod token;

pub use config::SessionConfig;
pub use error::StoreError;
pub use manager::{FetchOptions, SessionManager, SessionManagerBuilder};
pub use navigator::{Navigator, StaticNavigator, take_fragment_token};
pub use session::{SessionSnapshot, UserProfile};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{
    AccessToken, Clock, ManualClock, SystemClock, decode_expiry_millis, is_expiring_soon,
};
