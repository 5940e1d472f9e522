//! Typed calls to the MedAssist backend.
//!
//! Every call goes through [`SessionManager::fetch`], so the access token,
//! pre-flight renewal and the 401 retry are handled in one place. This
//! module only shapes requests and interprets statuses.

use medassist_session::{FetchOptions, SessionManager, UserProfile};
use medassist_transport::{Body, MultipartForm, Response, Transport};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::ApiError;
use crate::types::{
    ChatMessage, ChatReply, ChatRequest, Conversation, ConversationId, DeleteAck, HealthStatus,
    IdentifyRequest, MessagesPage,
};

/// Client for the MedAssist resource endpoints.
///
/// Cheap to clone; clones share the session.
pub struct ApiClient<T: Transport> {
    session: SessionManager<T>,
}

impl<T: Transport> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(session: SessionManager<T>) -> Self {
        Self { session }
    }

    /// The session every call authenticates with.
    pub fn session(&self) -> &SessionManager<T> {
        &self.session
    }

    /// `GET /health`. Needs no sign-in.
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.call("/health", FetchOptions::get()).await
    }

    /// `GET /auth/me`: the signed-in user.
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        let path = self.session.config().profile_path.clone();
        self.call(&path, FetchOptions::get()).await
    }

    /// `GET /conversations`, newest first as the server orders them.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.call("/conversations", FetchOptions::get()).await
    }

    /// `POST /conversations?title=...`.
    ///
    /// The server hands back an existing empty conversation rather than
    /// creating a second one, so the returned id may be an old one.
    pub async fn create_conversation(&self, title: Option<&str>) -> Result<Conversation, ApiError> {
        let path = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => format!("/conversations?title={}", urlencoding::encode(title)),
            None => "/conversations".to_string(),
        };
        self.call(&path, FetchOptions::post()).await
    }

    /// `GET /conversations/{id}/messages`, oldest first.
    pub async fn conversation_messages(
        &self,
        id: ConversationId,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let page: MessagesPage = self
            .call(&format!("/conversations/{id}/messages"), FetchOptions::get())
            .await?;
        Ok(page.messages)
    }

    /// `DELETE /conversations/{id}`.
    pub async fn delete_conversation(&self, id: ConversationId) -> Result<(), ApiError> {
        let ack: DeleteAck = self
            .call(&format!("/conversations/{id}"), FetchOptions::delete())
            .await?;
        if !ack.ok {
            warn!(conversation = %id, "delete acknowledged without ok flag");
        }
        Ok(())
    }

    /// `POST /chat/ask`: a text question.
    pub async fn ask(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        let options = FetchOptions::post().json(request)?;
        self.call("/chat/ask", options).await
    }

    /// `POST /chat/find`: identify a medicine from a photo.
    ///
    /// # Errors
    /// [`ApiError::InvalidInput`] without sending anything if the upload is
    /// empty or its content type isn't `image/*`.
    pub async fn identify(&self, request: IdentifyRequest) -> Result<ChatReply, ApiError> {
        let IdentifyRequest {
            image,
            question,
            conversation_id,
        } = request;

        if !image.mime.starts_with("image/") {
            return Err(ApiError::InvalidInput(format!(
                "{} is {}, not an image",
                image.filename, image.mime
            )));
        }
        if image.data.is_empty() {
            return Err(ApiError::InvalidInput(format!("{} is empty", image.filename)));
        }

        let mut form = MultipartForm::new().file("image", image.filename, image.mime, image.data);
        if let Some(question) = question.filter(|q| !q.trim().is_empty()) {
            form = form.text("question", question);
        }
        if let Some(id) = conversation_id {
            form = form.text("conversation_id", id.to_string());
        }

        self.call("/chat/find", FetchOptions::post().body(Body::Multipart(form)))
            .await
    }

    async fn call<R: DeserializeOwned>(
        &self,
        path: &str,
        options: FetchOptions,
    ) -> Result<R, ApiError> {
        let response = self.session.fetch(path, options).await?;
        let response = check_status(response)?;
        debug!(path, status = %response.status(), "api call succeeded");
        Ok(response.json()?)
    }
}

/// Turns a non-2xx response into an [`ApiError`].
fn check_status(response: Response) -> Result<Response, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    if response.is_unauthorized() {
        return Err(ApiError::Unauthorized);
    }
    Err(ApiError::Status {
        status: response.status(),
        message: error_message(&response),
    })
}

/// The backend reports errors as `{"detail": ...}`. Falls back to the raw
/// body, then to the status reason.
fn error_message(response: &Response) -> String {
    let detail = response
        .json::<serde_json::Value>()
        .ok()
        .and_then(|body| body.get("detail").cloned());
    match detail {
        Some(serde_json::Value::String(message)) => message,
        Some(other) => other.to_string(),
        None => {
            let text = response.text();
            let text = text.trim();
            if text.is_empty() {
                response
                    .status()
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                text.to_string()
            }
        }
    }
}
