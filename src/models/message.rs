use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Message lifecycle. Wire values stay in Spanish to match the existing
/// database and dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "estado_mensaje")]
pub enum MessageStatus {
    #[serde(rename = "borrador")]
    #[sqlx(rename = "borrador")]
    Draft,
    #[serde(rename = "programado")]
    #[sqlx(rename = "programado")]
    Scheduled,
    #[serde(rename = "enviado")]
    #[sqlx(rename = "enviado")]
    Sent,
    #[serde(rename = "fallido")]
    #[sqlx(rename = "fallido")]
    Failed,
}

impl MessageStatus {
    /// Validated transition table. An immediate send goes Draft -> Sent;
    /// everything else moves through Scheduled. Sent and Failed are terminal.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        matches!(
            (self, next),
            (MessageStatus::Draft, MessageStatus::Scheduled)
                | (MessageStatus::Draft, MessageStatus::Sent)
                | (MessageStatus::Scheduled, MessageStatus::Sent)
                | (MessageStatus::Scheduled, MessageStatus::Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "categoria_mensaje", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
    General,
    Residuos,
    Vacunacion,
    Seguridad,
    Eventos,
    Emergencia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tipo_recurrencia")]
pub enum Recurrence {
    #[serde(rename = "ninguna")]
    #[sqlx(rename = "ninguna")]
    None,
    #[serde(rename = "diaria")]
    #[sqlx(rename = "diaria")]
    Daily,
    #[serde(rename = "semanal")]
    #[sqlx(rename = "semanal")]
    Weekly,
    #[serde(rename = "mensual")]
    #[sqlx(rename = "mensual")]
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub contenido: String,
    pub categoria: MessageCategory,
    pub estado: MessageStatus,
    pub programado_para: Option<DateTime<Utc>>,
    pub enviado_en: Option<DateTime<Utc>>,
    pub recurrencia: Recurrence,
    pub plantilla_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub contenido: String,
    pub categoria: MessageCategory,
    pub estado: MessageStatus,
    pub programado_para: Option<DateTime<Utc>>,
    pub recurrencia: Recurrence,
    pub plantilla_id: Option<Uuid>,
}
