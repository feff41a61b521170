use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;

use pregon_backend::error::Result;
use pregon_backend::models::message::{MessageCategory, MessageStatus, NewMessage, Recurrence};
use pregon_backend::services::transport::Transport;
use pregon_backend::store::memory::{
    MemoryDeliveryStore, MemoryMessageStore, MemorySubscriberStore,
};
use pregon_backend::store::MessageStore;
use pregon_backend::{app, AppSettings, AppState};

struct StubTransport;

#[async_trait]
impl Transport for StubTransport {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send_text(&self, to: &str, _body: &str) -> Result<String> {
        Ok(format!("wamid.{to}"))
    }
}

fn setup_app(environment: &str, cron_secret: Option<&str>) -> (Router, MemoryMessageStore) {
    let messages = MemoryMessageStore::new();
    let subscribers = MemorySubscriberStore::new();
    subscribers.seed("5491155551234", Some("Ana"), true);
    let state = AppState::from_parts(
        Arc::new(messages.clone()),
        Arc::new(subscribers),
        Arc::new(MemoryDeliveryStore::new()),
        Arc::new(StubTransport),
        AppSettings {
            whatsapp_verify_token: "verify-secret".to_string(),
            cron_secret: cron_secret.map(str::to_string),
            environment: environment.to_string(),
        },
        10,
    );
    (app(state), messages)
}

async fn seed_due_message(messages: &MemoryMessageStore) {
    messages
        .insert(NewMessage {
            contenido: "Recolección de residuos".to_string(),
            categoria: MessageCategory::Residuos,
            estado: MessageStatus::Scheduled,
            programado_para: Some(Utc::now() - Duration::minutes(5)),
            recurrencia: Recurrence::None,
            plantilla_id: None,
        })
        .await
        .unwrap();
}

async fn trigger_sweep(app: &Router, auth: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri("/api/cron/send-scheduled");
    if let Some(value) = auth {
        builder = builder.header("authorization", value);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn development_sweeps_run_unauthenticated() {
    let (app, messages) = setup_app("development", None);
    seed_due_message(&messages).await;

    let (status, body) = trigger_sweep(&app, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["results"][0]["status"], "sent");
    assert_eq!(body["results"][0]["enviados"], 1);

    let stored = messages.snapshot();
    assert_eq!(stored[0].estado, MessageStatus::Sent);
}

#[tokio::test]
async fn production_rejects_missing_or_wrong_secrets() {
    let (app, messages) = setup_app("production", Some("s3cret"));
    seed_due_message(&messages).await;

    let (status, _) = trigger_sweep(&app, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = trigger_sweep(&app, Some("Bearer wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nothing was dispatched by the rejected calls.
    assert_eq!(messages.snapshot()[0].estado, MessageStatus::Scheduled);
}

#[tokio::test]
async fn production_accepts_the_bearer_secret() {
    let (app, messages) = setup_app("production", Some("s3cret"));
    seed_due_message(&messages).await;

    let (status, body) = trigger_sweep(&app, Some("Bearer s3cret")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);
    assert_eq!(messages.snapshot()[0].estado, MessageStatus::Sent);
}

#[tokio::test]
async fn production_without_a_configured_secret_is_an_error() {
    let (app, _) = setup_app("production", None);

    let (status, _) = trigger_sweep(&app, Some("Bearer anything")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn sweeping_with_nothing_due_reports_zero() {
    let (app, _) = setup_app("development", None);

    let (status, body) = trigger_sweep(&app, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 0);
}
