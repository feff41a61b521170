use axum::{extract::State, Json};

use crate::error::Result;
use crate::models::subscriber::Subscriber;
use crate::AppState;

pub async fn list_subscribers(State(state): State<AppState>) -> Result<Json<Vec<Subscriber>>> {
    let subscribers = state.subscribers.list().await?;
    Ok(Json(subscribers))
}
