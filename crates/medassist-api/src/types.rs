//! Request and response bodies for the MedAssist backend.
//!
//! Every type here mirrors one JSON shape the backend sends or accepts.
//! Field names match the wire exactly, so most types derive serde with
//! no renames at all.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies one conversation.
///
/// A newtype over the backend's integer id, so a conversation id can't be
/// mixed up with a user id. `#[serde(transparent)]` keeps it a plain
/// number on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate so width and alignment flags apply.
        fmt::Display::fmt(&self.0, f)
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

/// A saved conversation. Timestamps are passed through as the server
/// formats them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Who said a [`ChatMessage`].
///
/// Serialized lowercase (`"user"`, `"assistant"`). Roles this client
/// doesn't know about deserialize as `Other` instead of failing the
/// whole history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Other => "other",
        })
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `GET /conversations/{id}/messages`.
#[derive(Debug, Deserialize)]
pub(crate) struct MessagesPage {
    pub(crate) messages: Vec<ChatMessage>,
}

/// Body of `DELETE /conversations/{id}`.
#[derive(Debug, Deserialize)]
pub(crate) struct DeleteAck {
    #[serde(default)]
    pub(crate) ok: bool,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Body of `POST /chat/ask`.
///
/// Without a `conversation_id` the server picks (or creates) an empty
/// conversation and says which in the reply. With one, the server loads
/// context from its own history and `history` is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            history: Vec::new(),
        }
    }

    pub fn in_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

/// Reply from `POST /chat/ask` and `POST /chat/find`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    /// The conversation the exchange was saved to.
    pub conversation_id: ConversationId,
}

// ---------------------------------------------------------------------------
// Image identification
// ---------------------------------------------------------------------------

/// A photo to identify, with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    /// Must start with `image/`; checked before sending.
    pub mime: String,
    pub data: Vec<u8>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            data,
        }
    }

    /// Guesses the content type from the file extension.
    ///
    /// Unknown extensions get `application/octet-stream`. Anything that
    /// isn't an `image/*` type is rejected by the upload check.
    pub fn from_filename(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let filename = filename.into();
        let mime = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();
        Self::new(filename, mime, data)
    }
}

/// Arguments for `POST /chat/find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyRequest {
    pub image: ImageUpload,
    /// Defaults server-side to asking what the medicine is.
    pub question: Option<String>,
    pub conversation_id: Option<ConversationId>,
}

impl IdentifyRequest {
    pub fn new(image: ImageUpload) -> Self {
        Self {
            image,
            question: None,
            conversation_id: None,
        }
    }

    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    pub fn in_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }
}
