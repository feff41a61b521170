use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::message::{Message, MessageCategory, Recurrence};

/// Body of `POST /api/messages`. No `programado_para` means "send now".
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageRequest {
    // WhatsApp caps a text body at 4096 characters.
    #[validate(length(min = 1, max = 4096))]
    pub contenido: String,
    pub categoria: Option<MessageCategory>,
    pub programado_para: Option<DateTime<Utc>>,
    pub recurrencia: Option<Recurrence>,
    pub plantilla_id: Option<Uuid>,
}

/// The created message plus send-outcome counts, or a degraded-send warning.
/// Warnings ride inside the success body: the message itself was saved.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    #[serde(flatten)]
    pub mensaje: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enviados: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallidos: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<Message> for MessageResponse {
    fn from(mensaje: Message) -> Self {
        Self {
            mensaje,
            enviados: None,
            fallidos: None,
            warning: None,
        }
    }
}
