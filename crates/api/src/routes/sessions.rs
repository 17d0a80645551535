use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use prep_core::model::{AnswerSubmission, SessionId, StudySession};
use services::{AnswerOutcome, CompletedSession, SessionAction, StartSession};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct UpdateSession {
    pub action: SessionAction,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextParams {
    pub limit: Option<u32>,
}

pub async fn create_session(
    State(state): State<SharedState>,
    current: CurrentUser,
    ApiJson(request): ApiJson<StartSession>,
) -> Result<(StatusCode, Json<StudySession>), ApiError> {
    let session = state
        .services
        .sessions()
        .create(current.user.id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(state): State<SharedState>,
    current: CurrentUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<StudySession>, ApiError> {
    let session = state
        .services
        .sessions()
        .get(current.user.id, SessionId::new(id))
        .await?;
    Ok(Json(session))
}

pub async fn update_session(
    State(state): State<SharedState>,
    current: CurrentUser,
    ApiPath(id): ApiPath<u64>,
    ApiJson(update): ApiJson<UpdateSession>,
) -> Result<Json<StudySession>, ApiError> {
    let session = state
        .services
        .sessions()
        .apply(current.user.id, SessionId::new(id), update.action)
        .await?;
    Ok(Json(session))
}

pub async fn record_answer(
    State(state): State<SharedState>,
    current: CurrentUser,
    ApiPath(id): ApiPath<u64>,
    ApiJson(submission): ApiJson<AnswerSubmission>,
) -> Result<(StatusCode, Json<AnswerOutcome>), ApiError> {
    let outcome = state
        .services
        .sessions()
        .record_answer(current.user.id, SessionId::new(id), submission)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn next_questions(
    State(state): State<SharedState>,
    current: CurrentUser,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(params): ApiQuery<NextParams>,
) -> Result<Json<Value>, ApiError> {
    let questions = state
        .services
        .sessions()
        .next_questions(current.user.id, SessionId::new(id), params.limit)
        .await?;
    Ok(Json(json!({
        "session_id": id,
        "questions": questions,
        "count": questions.len(),
    })))
}

pub async fn complete_session(
    State(state): State<SharedState>,
    current: CurrentUser,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<CompletedSession>, ApiError> {
    let completed = state
        .services
        .sessions()
        .complete(current.user.id, SessionId::new(id))
        .await?;
    Ok(Json(completed))
}
