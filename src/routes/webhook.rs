use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use crate::dto::webhook_dto::{ChangeValue, VerifyParams, WebhookPayload};
use crate::utils::phone::normalize_phone;
use crate::AppState;

/// Meta's webhook verification handshake: echo the challenge back only for a
/// `subscribe` request carrying the configured verify token.
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    let token_matches = params.verify_token.as_deref()
        == Some(state.settings.whatsapp_verify_token.as_str());

    if params.mode.as_deref() == Some("subscribe") && token_matches {
        info!("webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default())
    } else {
        warn!("webhook verification failed");
        (StatusCode::FORBIDDEN, "Forbidden".to_string())
    }
}

/// Event delivery. Meta retries aggressively on anything but a 200, so this
/// handler acknowledges unconditionally: the body is parsed by hand and every
/// per-event failure is logged instead of surfaced.
pub async fn receive_events(State(state): State<AppState>, body: String) -> StatusCode {
    let payload: WebhookPayload = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "unparseable webhook payload, acknowledging anyway");
            return StatusCode::OK;
        }
    };

    for entry in &payload.entry {
        for change in &entry.changes {
            if change.field != "messages" {
                continue;
            }
            handle_incoming_messages(&state, &change.value).await;
            handle_status_updates(&state, &change.value).await;
        }
    }

    StatusCode::OK
}

enum SubscriptionCommand {
    OptIn,
    OptOut,
}

fn parse_command(text: &str) -> Option<SubscriptionCommand> {
    match text.trim().to_uppercase().as_str() {
        "ALTA" | "SUSCRIBIR" | "HOLA" => Some(SubscriptionCommand::OptIn),
        "BAJA" | "DESUSCRIBIR" | "SALIR" => Some(SubscriptionCommand::OptOut),
        _ => None,
    }
}

async fn handle_incoming_messages(state: &AppState, value: &ChangeValue) {
    for message in &value.messages {
        if message.kind != "text" {
            continue;
        }
        let Some(text) = message.text.as_ref().map(|t| t.body.as_str()) else {
            continue;
        };
        let telefono = normalize_phone(&message.from);
        let nombre = value
            .contacts
            .iter()
            .find(|c| c.wa_id == message.from)
            .and_then(|c| c.profile.as_ref())
            .and_then(|p| p.name.as_deref());

        match parse_command(text) {
            Some(SubscriptionCommand::OptIn) => {
                match state.subscribers.upsert_active(&telefono, nombre).await {
                    Ok(subscriber) => info!(
                        telefono = %subscriber.telefono,
                        "subscriber opted in"
                    ),
                    Err(err) => warn!(telefono = %telefono, error = %err, "opt-in failed"),
                }
            }
            Some(SubscriptionCommand::OptOut) => {
                match state.subscribers.deactivate(&telefono).await {
                    Ok(true) => info!(telefono = %telefono, "subscriber opted out"),
                    Ok(false) => info!(telefono = %telefono, "opt-out for unknown phone, ignoring"),
                    Err(err) => warn!(telefono = %telefono, error = %err, "opt-out failed"),
                }
            }
            None => {}
        }
    }
}

async fn handle_status_updates(state: &AppState, value: &ChangeValue) {
    for status in &value.statuses {
        if let Err(err) = state.reconciler.apply(status).await {
            warn!(provider_id = %status.id, error = %err, "status reconciliation failed");
        }
    }
}
