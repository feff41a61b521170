use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An opted-in phone subscriber. `telefono` is the canonical phone produced by
/// `utils::phone::normalize_phone` and is unique across active and inactive
/// rows; opt-out flips `activo` instead of deleting.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscriber {
    pub id: Uuid,
    pub telefono: String,
    pub nombre: Option<String>,
    pub activo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
