use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::state::SharedState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

pub async fn database_health(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    if let Err(err) = state.services.health().ping().await {
        tracing::error!(error = %err, "database health check failed");
        return Err(ApiError::Unavailable("database unavailable".to_string()));
    }
    Ok(Json(json!({
        "status": "ok",
        "database": "connected",
        "timestamp": Utc::now(),
    })))
}
