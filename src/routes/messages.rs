use axum::{extract::State, Json};
use chrono::Utc;
use validator::Validate;

use crate::dto::message_dto::{CreateMessageRequest, MessageResponse};
use crate::error::{Error, Result};
use crate::models::message::{Message, MessageCategory, MessageStatus, NewMessage, Recurrence};
use crate::services::dispatch::DispatchOutcome;
use crate::AppState;

/// Latest messages for the dashboard feed.
pub async fn list_messages(State(state): State<AppState>) -> Result<Json<Vec<Message>>> {
    let messages = state.messages.list_recent(50).await?;
    Ok(Json(messages))
}

/// Creates a message and either schedules it or dispatches it immediately.
/// Degraded sends (no credentials, empty roster) are not HTTP failures: the
/// message was saved, so the warning travels in the 200 body.
pub async fn create_message(
    State(state): State<AppState>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;
    let contenido = req.contenido.trim().to_string();
    if contenido.is_empty() {
        return Err(Error::BadRequest("contenido is required".to_string()));
    }

    let categoria = req.categoria.unwrap_or(MessageCategory::General);
    let recurrencia = req.recurrencia.unwrap_or(Recurrence::None);

    if let Some(at) = req.programado_para {
        if at <= Utc::now() {
            return Err(Error::BadRequest(
                "programado_para must be in the future".to_string(),
            ));
        }
        let message = state
            .messages
            .insert(NewMessage {
                contenido,
                categoria,
                estado: MessageStatus::Scheduled,
                programado_para: Some(at),
                recurrencia,
                plantilla_id: req.plantilla_id,
            })
            .await?;
        return Ok(Json(MessageResponse::from(message)));
    }

    if recurrencia != Recurrence::None {
        return Err(Error::BadRequest(
            "recurrencia requires programado_para".to_string(),
        ));
    }

    let message = state
        .messages
        .insert(NewMessage {
            contenido,
            categoria,
            estado: MessageStatus::Draft,
            programado_para: None,
            recurrencia: Recurrence::None,
            plantilla_id: req.plantilla_id,
        })
        .await?;

    let outcome = state.dispatch_service.dispatch_now(&message).await?;
    let fresh = state.messages.get(message.id).await?.unwrap_or(message);

    let mut response = MessageResponse::from(fresh);
    match outcome {
        DispatchOutcome::Completed {
            enviados: 0,
            fallidos: 0,
        } => {
            response.warning =
                Some("Mensaje guardado pero no hay suscriptores activos".to_string());
        }
        DispatchOutcome::Completed { enviados, fallidos } => {
            response.enviados = Some(enviados);
            response.fallidos = Some(fallidos);
        }
        DispatchOutcome::NotConfigured => {
            response.warning =
                Some("Mensaje guardado pero WhatsApp no está configurado".to_string());
        }
        DispatchOutcome::AlreadyHandled => {}
    }
    Ok(Json(response))
}
