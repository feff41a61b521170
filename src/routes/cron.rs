use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use chrono::Utc;

use crate::error::{Error, Result};
use crate::services::scheduler::SweepReport;
use crate::{AppSettings, AppState};

/// External periodic trigger for the scheduler sweep. Authenticated by a
/// shared secret in production; development allows unauthenticated calls.
pub async fn send_scheduled(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepReport>> {
    authorize_sweep(&state.settings, &headers)?;
    let report = state.scheduler_service.run_sweep(Utc::now()).await?;
    Ok(Json(report))
}

fn authorize_sweep(settings: &AppSettings, headers: &HeaderMap) -> Result<()> {
    if settings.environment != "production" {
        return Ok(());
    }
    let Some(secret) = settings.cron_secret.as_deref() else {
        return Err(Error::Config(
            "CRON_SECRET is required in production".to_string(),
        ));
    };
    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided != format!("Bearer {}", secret) {
        return Err(Error::Unauthorized("invalid cron secret".to_string()));
    }
    Ok(())
}
