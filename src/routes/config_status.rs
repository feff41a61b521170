use axum::{extract::State, Json};
use serde_json::json;

use crate::AppState;

/// Configuration report for the dashboard's status page. Never exposes the
/// secrets themselves, only whether they are present.
pub async fn config_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "whatsapp": state.transport.is_configured(),
        "webhook_verify": !state.settings.whatsapp_verify_token.is_empty(),
        "cron_protegido": state.settings.cron_secret.is_some(),
        "environment": state.settings.environment,
    }))
}
