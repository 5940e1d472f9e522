//! # MedAssist
//!
//! Client for the MedAssist medical-assistant backend.
//!
//! MedAssist keeps the user signed in without them noticing: the access
//! token is restored at startup, renewed shortly before it expires, and
//! renewed again (once) if the server rejects it. Your code just calls the
//! typed endpoints.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medassist::prelude::*;
//!
//! # async fn run() -> Result<(), MedAssistError> {
//! let client = MedAssistClient::builder().build()?;
//! let snapshot = client.initialize().await;
//! if !snapshot.authenticated {
//!     client.login();
//!     return Ok(());
//! }
//! let reply = client.api().ask(&ChatRequest::new("Чи можна ібупрофен?")).await?;
//! println!("{}", reply.reply);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod logging;

pub use client::{MedAssistClient, MedAssistClientBuilder};
pub use error::MedAssistError;
pub use logging::init_logging;

pub use medassist_api as api;
pub use medassist_session as session;
pub use medassist_transport as transport;

/// Everything a typical client needs, in one import.
pub mod prelude {
    pub use crate::{MedAssistClient, MedAssistClientBuilder, MedAssistError, init_logging};
    pub use medassist_api::{
        ApiClient, ApiError, ChatMessage, ChatReply, ChatRequest, Conversation, ConversationId,
        HealthStatus, IdentifyRequest, ImageUpload, Role,
    };
    pub use medassist_session::{
        AccessToken, FileTokenStore, MemoryTokenStore, Navigator, SessionConfig, SessionManager,
        SessionSnapshot, StaticNavigator, TokenStore, UserProfile,
    };
    pub use medassist_transport::{ReqwestTransport, StatusCode, Transport, TransportError};
}
