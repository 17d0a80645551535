use axum::{Json, extract::State, http::StatusCode};

use services::ai::{GenerationReport, GenerationRequest};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::SharedState;

pub async fn generate_questions(
    State(state): State<SharedState>,
    current: CurrentUser,
    ApiJson(request): ApiJson<GenerationRequest>,
) -> Result<(StatusCode, Json<GenerationReport>), ApiError> {
    let report = state
        .services
        .generation()
        .generate(&current.user, request)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}
