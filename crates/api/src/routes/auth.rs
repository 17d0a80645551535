use axum::{Json, extract::State};
use serde_json::{Value, json};

use services::{LoginCredentials, LoginSession};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::SharedState;

pub async fn login(
    State(state): State<SharedState>,
    ApiJson(credentials): ApiJson<LoginCredentials>,
) -> Result<Json<LoginSession>, ApiError> {
    let session = state.services.auth().sign_in(credentials).await?;
    Ok(Json(session))
}

pub async fn logout(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    state.services.auth().logout(&current.token).await?;
    tracing::info!(user_id = %current.user.id, "user signed out");
    Ok(Json(json!({ "success": true })))
}

pub async fn me(current: CurrentUser) -> Json<Value> {
    Json(json!({ "authenticated": true, "user": current.user }))
}
