use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-recipient delivery state. Progression is monotonic: enviado ->
/// entregado -> leido, or enviado -> fallido. Status callbacks may never move
/// a record backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "estado_envio")]
pub enum DeliveryStatus {
    #[serde(rename = "enviado")]
    #[sqlx(rename = "enviado")]
    Sent,
    #[serde(rename = "entregado")]
    #[sqlx(rename = "entregado")]
    Delivered,
    #[serde(rename = "leido")]
    #[sqlx(rename = "leido")]
    Read,
    #[serde(rename = "fallido")]
    #[sqlx(rename = "fallido")]
    Failed,
}

impl DeliveryStatus {
    fn rank(self) -> u8 {
        match self {
            DeliveryStatus::Sent => 0,
            DeliveryStatus::Delivered => 1,
            DeliveryStatus::Read => 2,
            DeliveryStatus::Failed => 3,
        }
    }

    /// Whether a status callback is allowed to move a record to `next`.
    /// Failed and Read are terminal; otherwise only forward moves apply.
    pub fn can_advance_to(self, next: DeliveryStatus) -> bool {
        match self {
            DeliveryStatus::Read | DeliveryStatus::Failed => false,
            _ => next.rank() > self.rank(),
        }
    }

    /// Maps the provider's status vocabulary onto ours, 1:1.
    pub fn from_provider(raw: &str) -> Option<DeliveryStatus> {
        match raw {
            "sent" => Some(DeliveryStatus::Sent),
            "delivered" => Some(DeliveryStatus::Delivered),
            "read" => Some(DeliveryStatus::Read),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

/// One row per (message, subscriber) pair, written exactly once at dispatch
/// time and only touched afterwards by the status reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub mensaje_id: Uuid,
    pub suscriptor_id: Uuid,
    pub estado: DeliveryStatus,
    pub whatsapp_message_id: Option<String>,
    pub whatsapp_status: Option<String>,
    pub error_mensaje: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDeliveryRecord {
    pub mensaje_id: Uuid,
    pub suscriptor_id: Uuid,
    pub estado: DeliveryStatus,
    pub whatsapp_message_id: Option<String>,
    pub error_mensaje: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_progression_is_monotonic() {
        assert!(DeliveryStatus::Sent.can_advance_to(DeliveryStatus::Delivered));
        assert!(DeliveryStatus::Sent.can_advance_to(DeliveryStatus::Read));
        assert!(DeliveryStatus::Sent.can_advance_to(DeliveryStatus::Failed));
        assert!(DeliveryStatus::Delivered.can_advance_to(DeliveryStatus::Read));
    }

    #[test]
    fn read_and_failed_records_never_regress() {
        assert!(!DeliveryStatus::Read.can_advance_to(DeliveryStatus::Delivered));
        assert!(!DeliveryStatus::Read.can_advance_to(DeliveryStatus::Sent));
        assert!(!DeliveryStatus::Failed.can_advance_to(DeliveryStatus::Delivered));
        assert!(!DeliveryStatus::Delivered.can_advance_to(DeliveryStatus::Sent));
    }

    #[test]
    fn provider_vocabulary_maps_one_to_one() {
        assert_eq!(
            DeliveryStatus::from_provider("delivered"),
            Some(DeliveryStatus::Delivered)
        );
        assert_eq!(DeliveryStatus::from_provider("read"), Some(DeliveryStatus::Read));
        assert_eq!(DeliveryStatus::from_provider("deleted"), None);
    }
}
