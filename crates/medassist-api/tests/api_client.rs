//! Integration tests for `ApiClient` over a real HTTP transport and a
//! wiremock backend.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use medassist_api::*;
use medassist_session::{MemoryTokenStore, SessionConfig, SessionManager, TokenStore};
use medassist_transport::{ReqwestTransport, StatusCode};
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =========================================================================
// Helpers
// =========================================================================

/// A token that stays valid for an hour of real time.
fn fresh_token(tag: &str) -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    let payload = serde_json::json!({ "sub": tag, "exp": now + 3600 }).to_string();
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#),
        URL_SAFE_NO_PAD.encode(payload.as_bytes())
    )
}

async fn setup(token: Option<&str>) -> (MockServer, ApiClient<ReqwestTransport>, Arc<MemoryTokenStore>) {
    let server = MockServer::start().await;
    let store = Arc::new(match token {
        Some(token) => MemoryTokenStore::with_token(token),
        None => MemoryTokenStore::new(),
    });
    let session = SessionManager::builder(ReqwestTransport::new().unwrap())
        .config(SessionConfig::with_api_url(server.uri()))
        .store(store.clone())
        .build();
    (server, ApiClient::new(session), store)
}

fn conversation_json(id: i64, title: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "created_at": "2025-03-01 09:00:00",
        "updated_at": "2025-03-01 09:10:00"
    })
}

// =========================================================================
// Plain endpoints
// =========================================================================

#[tokio::test]
async fn test_health_without_session() {
    let (server, api, _) = setup(None).await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let health = api.health().await.unwrap();

    assert!(health.is_ok());
}

#[tokio::test]
async fn test_profile_returns_signed_in_user() {
    let token = fresh_token("me");
    let (server, api, _) = setup(Some(token.as_str())).await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 5, "email": "taras@example.com", "name": null, "avatar_url": null
        })))
        .mount(&server)
        .await;

    let profile = api.profile().await.unwrap();

    assert_eq!(profile.id, 5);
    assert_eq!(profile.display_name(), "taras@example.com");
}

#[tokio::test]
async fn test_list_conversations_sends_bearer() {
    let token = fresh_token("list");
    let (server, api, _) = setup(Some(token.as_str())).await;
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            conversation_json(2, "Ібупрофен"),
            conversation_json(1, "Нова розмова"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let conversations = api.list_conversations().await.unwrap();

    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0].id, ConversationId(2));
    assert_eq!(conversations[0].title, "Ібупрофен");
}

#[tokio::test]
async fn test_create_conversation_encodes_title() {
    let (server, api, _) = setup(Some(fresh_token("new").as_str())).await;
    Mock::given(method("POST"))
        .and(path("/conversations"))
        .and(query_param("title", "Біль у горлі & кашель"))
        .respond_with(ResponseTemplate::new(200).set_body_json(conversation_json(8, "Біль у горлі & кашель")))
        .expect(1)
        .mount(&server)
        .await;

    let conversation = api
        .create_conversation(Some("Біль у горлі & кашель"))
        .await
        .unwrap();

    assert_eq!(conversation.id, ConversationId(8));
}

#[tokio::test]
async fn test_create_conversation_without_title_omits_query() {
    let (server, api, _) = setup(Some(fresh_token("new").as_str())).await;
    Mock::given(method("POST"))
        .and(path("/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(conversation_json(9, "Нова розмова")))
        .mount(&server)
        .await;

    let conversation = api.create_conversation(Some("   ")).await.unwrap();

    assert_eq!(conversation.title, "Нова розмова");
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn test_conversation_messages_unwraps_page() {
    let (server, api, _) = setup(Some(fresh_token("history").as_str())).await;
    Mock::given(method("GET"))
        .and(path("/conversations/4/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messages": [
                { "role": "user", "content": "Що таке амоксицилін?" },
                { "role": "assistant", "content": "Антибіотик пеніцилінової групи." }
            ]
        })))
        .mount(&server)
        .await;

    let messages = api.conversation_messages(ConversationId(4)).await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_delete_missing_conversation_reports_detail() {
    let (server, api, _) = setup(Some(fresh_token("delete").as_str())).await;
    Mock::given(method("DELETE"))
        .and(path("/conversations/77"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "detail": "Conversation not found" })),
        )
        .mount(&server)
        .await;

    let err = api.delete_conversation(ConversationId(77)).await.unwrap_err();

    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(message, "Conversation not found");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_conversation_succeeds() {
    let (server, api, _) = setup(Some(fresh_token("delete").as_str())).await;
    Mock::given(method("DELETE"))
        .and(path("/conversations/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    api.delete_conversation(ConversationId(3)).await.unwrap();
}

// =========================================================================
// Chat
// =========================================================================

#[tokio::test]
async fn test_ask_posts_json_and_returns_reply() {
    let (server, api, _) = setup(Some(fresh_token("ask").as_str())).await;
    Mock::given(method("POST"))
        .and(path("/chat/ask"))
        .and(body_json(serde_json::json!({
            "message": "Дозування парацетамолу?",
            "conversation_id": 6
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "reply": "Дорослим до 4 г на добу.",
            "conversation_id": 6
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = api
        .ask(&ChatRequest::new("Дозування парацетамолу?").in_conversation(ConversationId(6)))
        .await
        .unwrap();

    assert_eq!(reply.conversation_id, ConversationId(6));
    assert!(reply.reply.contains("4 г"));
}

#[tokio::test]
async fn test_identify_sends_multipart_fields() {
    let (server, api, _) = setup(Some(fresh_token("find").as_str())).await;
    Mock::given(method("POST"))
        .and(path("/chat/find"))
        .and(body_string_contains("name=\"image\"; filename=\"pack.jpg\""))
        .and(body_string_contains("name=\"question\""))
        .and(body_string_contains("Що це?"))
        .and(body_string_contains("name=\"conversation_id\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "reply": "Це німесулід.",
            "conversation_id": 11
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = IdentifyRequest::new(ImageUpload::new("pack.jpg", "image/jpeg", b"jpeg-bytes".to_vec()))
        .question("Що це?")
        .in_conversation(ConversationId(11));
    let reply = api.identify(request).await.unwrap();

    assert_eq!(reply.reply, "Це німесулід.");
}

#[tokio::test]
async fn test_identify_uploads_tiff_photo_named_by_extension() {
    let (server, api, _) = setup(Some(fresh_token("find").as_str())).await;
    Mock::given(method("POST"))
        .and(path("/chat/find"))
        .and(body_string_contains("filename=\"pill.tiff\""))
        .and(body_string_contains("image/tiff"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "reply": "Схоже на аспірин.",
            "conversation_id": 12
        })))
        .expect(1)
        .mount(&server)
        .await;

    let upload = ImageUpload::from_filename("pill.tiff", b"tiff-bytes".to_vec());
    let reply = api.identify(IdentifyRequest::new(upload)).await.unwrap();

    assert_eq!(reply.conversation_id, ConversationId(12));
}

#[tokio::test]
async fn test_identify_rejects_non_image_without_sending() {
    let (server, api, _) = setup(Some(fresh_token("find").as_str())).await;
    Mock::given(method("POST"))
        .and(path("/chat/find"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let not_image = api
        .identify(IdentifyRequest::new(ImageUpload::new("notes.pdf", "application/pdf", vec![1])))
        .await;
    let empty = api
        .identify(IdentifyRequest::new(ImageUpload::new("empty.png", "image/png", Vec::new())))
        .await;

    assert!(matches!(not_image, Err(ApiError::InvalidInput(_))));
    assert!(matches!(empty, Err(ApiError::InvalidInput(_))));
}

// =========================================================================
// Session interplay
// =========================================================================

#[tokio::test]
async fn test_unauthorized_then_renewal_retries_with_new_token() {
    let stale = fresh_token("stale");
    let renewed = fresh_token("renewed");
    let (server, api, store) = setup(Some(stale.as_str())).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access_token": renewed })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .and(header("authorization", format!("Bearer {renewed}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({ "detail": "Token expired" })))
        .expect(1)
        .mount(&server)
        .await;

    let conversations = api.list_conversations().await.unwrap();

    assert!(conversations.is_empty());
    assert_eq!(store.load().unwrap(), Some(renewed));
}

#[tokio::test]
async fn test_unauthorized_with_failed_renewal_is_unauthorized() {
    let (server, api, store) = setup(Some(fresh_token("revoked").as_str())).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = api.list_conversations().await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(store.load().unwrap(), None);
    assert!(!api.session().snapshot().authenticated);
}

#[tokio::test]
async fn test_malformed_body_is_transport_decode_error() {
    let (server, api, _) = setup(None).await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = api.health().await.unwrap_err();

    assert!(matches!(
        err,
        ApiError::Transport(medassist_transport::TransportError::Decode(_))
    ));
}
