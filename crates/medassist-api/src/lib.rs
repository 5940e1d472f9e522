//! Typed endpoints of the MedAssist backend.
//!
//! - **Types** ([`Conversation`], [`ChatRequest`], [`ChatReply`], ...):
//!   the JSON bodies the backend speaks.
//! - **Client** ([`ApiClient`]): one async method per endpoint, all
//!   authenticated through a [`SessionManager`](medassist_session::SessionManager).
//! - **Errors** ([`ApiError`]): HTTP statuses become errors at this layer.
//!
//! ```text
//! ApiClient::ask ──→ SessionManager::fetch ──→ Transport::send
//!                      (token, renewal, retry)
//! ```

mod client;
mod error;
mod types;

pub use client::ApiClient;
pub use error::ApiError;
pub use types::{
    ChatMessage, ChatReply, ChatRequest, Conversation, ConversationId, HealthStatus,
    IdentifyRequest, ImageUpload, Role,
};
