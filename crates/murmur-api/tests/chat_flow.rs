use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{TimeDelta, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use murmur_api::{Chat, ChatConfig, routes};
use murmur_crypto::{CipherGateway, EVENT_KEY_ID, KeystreamCipher};
use murmur_gateway::{FormatGateway, Formatter, GatewayError};
use murmur_store::Store;

/// Formatter that wraps messages in brackets and greets with a fixed line.
struct Brackets;

#[async_trait]
impl FormatGateway for Brackets {
    async fn call(&self, request_line: &str) -> Result<String, GatewayError> {
        let mut parts = request_line.split('|');
        match parts.next() {
            Some("FORMAT") => {
                let author = parts.next().unwrap_or_default();
                let text = parts.next().unwrap_or_default();
                Ok(format!("OK|[{}] {}\n", author, text))
            }
            Some("MOTD") => Ok("OK|hello from the formatter\n".into()),
            Some("STATUS") => Ok("OK|formatter healthy\n".into()),
            _ => Ok("ERR|unknown".into()),
        }
    }
}

fn app(formatter: Formatter) -> (Router, Arc<Chat>) {
    let cipher = CipherGateway::new(Arc::new(KeystreamCipher), EVENT_KEY_ID, Duration::from_secs(1));
    let chat = Arc::new(Chat::new(
        Store::new(500, 64, cipher),
        formatter,
        ChatConfig::default(),
    ));
    (routes::router(chat.clone()), chat)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn post(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::post(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    call(app, request).await
}

async fn poll(app: &Router, token: &str, after: u64) -> (StatusCode, Value) {
    let request = Request::get(format!("/api/poll?token={}&after={}", token, after))
        .body(Body::empty())
        .unwrap();
    call(app, request).await
}

async fn login(app: &Router, nickname: &str) -> String {
    let (status, body) = post(app, "/api/login", json!({ "nickname": nickname })).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["token"].as_str().unwrap().to_string()
}

fn texts(body: &Value) -> Vec<String> {
    body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["text"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_check() {
    let (app, _) = app(Formatter::disabled());
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn three_users_chat_and_whisper() {
    let (app, _) = app(Formatter::new(Arc::new(Brackets)));

    let (status, body) = post(&app, "/api/login", json!({ "nickname": "alice" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["room"], "general");
    assert_eq!(body["greeting"], "hello from the formatter");
    let alice = body["token"].as_str().unwrap().to_string();

    let bob = login(&app, "bob").await;
    let carol = login(&app, "carol").await;

    let (status, body) = post(&app, "/api/send", json!({ "token": alice, "text": "hi all" })).await;
    assert_eq!(status, StatusCode::OK);
    let broadcast_id = body["id"].as_u64().unwrap();

    let (status, body) = post(&app, "/api/send", json!({ "token": bob, "text": "/w carol secret" })).await;
    assert_eq!(status, StatusCode::OK);
    let whisper_id = body["id"].as_u64().unwrap();
    assert!(whisper_id > broadcast_id);

    let (_, body) = poll(&app, &carol, 0).await;
    assert_eq!(
        texts(&body),
        vec![
            "alice joined #general",
            "bob joined #general",
            "carol joined #general",
            "[alice] hi all",
            "secret",
        ]
    );
    let whisper = &body["events"][4];
    assert_eq!(whisper["kind"], "whisper");
    assert_eq!(whisper["author"], "bob");
    assert_eq!(whisper["target"], "carol");
    assert!(whisper.get("ciphertext").is_none());

    let (_, body) = poll(&app, &alice, broadcast_id).await;
    assert!(texts(&body).is_empty());

    let (_, body) = poll(&app, &bob, broadcast_id).await;
    assert_eq!(texts(&body), vec!["secret"]);
}

#[tokio::test]
async fn errors_carry_status_and_message() {
    let (app, _) = app(Formatter::disabled());
    let alice = login(&app, "alice").await;

    let (status, body) = post(&app, "/api/login", json!({ "nickname": "Alice" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "nick 'Alice' already taken");

    let (status, _) = post(&app, "/api/send", json!({ "token": "nope", "text": "hi" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post(&app, "/api/send", json!({ "token": alice, "text": "/w ghost boo" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "user 'ghost' not found");

    let (status, _) = post(&app, "/api/send", json!({ "token": alice, "text": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post(&app, "/api/cmd", json!({ "token": alice, "command": "/dance" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown command 'dance'");

    let (status, body) = post(&app, "/api/send", json!({ "token": alice })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);

    let (status, _) = poll(&app, "nope", 0).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_poll_queries_get_json_errors() {
    let (app, _) = app(Formatter::disabled());
    let alice = login(&app, "alice").await;

    for uri in [
        "/api/poll".to_string(),
        format!("/api/poll?token={}&after=soon", alice),
        format!("/api/poll?token={}&limit=-3", alice),
    ] {
        let response = app
            .clone()
            .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(response.headers()["content-type"], "application/json", "{}", uri);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    }
}

#[tokio::test]
async fn rooms_and_commands() {
    let (app, _) = app(Formatter::new(Arc::new(Brackets)));
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;

    let (status, body) = post(&app, "/api/cmd", json!({ "token": bob, "command": "/join #lounge" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("text").is_none());

    let (_, body) = post(&app, "/api/cmd", json!({ "token": alice, "command": "/rooms" })).await;
    assert_eq!(body["text"], "== Active Rooms == #general(1) #lounge(1)");

    let (_, body) = post(&app, "/api/cmd", json!({ "token": bob, "command": "/users" })).await;
    assert_eq!(body["text"], "== Users in #lounge == bob");

    let (_, body) = post(&app, "/api/cmd", json!({ "token": alice, "command": "/status" })).await;
    let status_line = body["text"].as_str().unwrap();
    assert!(status_line.starts_with("== SERVER STATUS == Online: 2"));
    assert!(status_line.ends_with("Formatter: formatter healthy"));

    let (_, body) = poll(&app, &alice, 0).await;
    assert_eq!(
        texts(&body),
        vec!["alice joined #general", "bob joined #general", "bob left #general"]
    );

    let (_, body) = poll(&app, &bob, 0).await;
    assert_eq!(texts(&body), vec!["bob joined #lounge"]);
}

#[tokio::test]
async fn logout_and_timeout_free_nicknames() {
    let (app, chat) = app(Formatter::disabled());
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;

    let (status, body) = post(&app, "/api/logout", json!({ "token": bob })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, _) = post(&app, "/api/logout", json!({ "token": bob })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = poll(&app, &alice, 0).await;
    assert_eq!(texts(&body).last().unwrap(), "bob left");

    login(&app, "bob").await;

    let expired = chat.sweep(Utc::now() + TimeDelta::seconds(121)).unwrap();
    assert_eq!(expired, 2);

    let (status, _) = poll(&app, &alice, 0).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let carol = login(&app, "alice").await;
    let (_, body) = poll(&app, &carol, 0).await;
    let seen = texts(&body);
    assert!(seen.contains(&"alice timed out".to_string()));
    assert!(seen.contains(&"bob timed out".to_string()));
}
