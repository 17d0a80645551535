use axum::{
    Json,
    extract::{
        State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use services::{
    AiClientError, AuthError, DashboardError, GenerationError, SessionError, StudyError,
};
use storage::StorageError;

use crate::state::SharedState;

const INTERNAL_MESSAGE: &str = "internal server error";

/// Detail of a 500 response, kept out of the body unless the router exposes it.
#[derive(Debug, Clone)]
struct InternalDetail(String);

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::BadRequest(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::RateLimited(_) => "rate_limited",
            ApiError::Unavailable(_) => "service_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Unauthorized(message) => json!({
                "authenticated": false,
                "message": message,
            }),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                let mut response =
                    (status, Json(json!({ "error": self.code(), "message": INTERNAL_MESSAGE })))
                        .into_response();
                response
                    .extensions_mut()
                    .insert(InternalDetail(detail.clone()));
                return response;
            }
            other => {
                tracing::warn!(status = status.as_u16(), error = %other, "request rejected");
                json!({ "error": other.code(), "message": other.to_string() })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Response middleware: outside production, put the detail back into 500 bodies.
pub async fn expose_internal_details(
    State(state): State<SharedState>,
    response: Response,
) -> Response {
    if state.config.is_production() {
        return response;
    }
    match response.extensions().get::<InternalDetail>().cloned() {
        Some(InternalDetail(detail)) => (
            response.status(),
            Json(json!({ "error": "internal_error", "message": detail })),
        )
            .into_response(),
        None => response,
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::NotFound("not found".to_string()),
            StorageError::Conflict => ApiError::Conflict("conflict".to_string()),
            other => ApiError::internal(other),
        }
    }
}

impl From<StudyError> for ApiError {
    fn from(err: StudyError) -> Self {
        match err {
            StudyError::ExamNotFound => ApiError::NotFound(err.to_string()),
            StudyError::Selection(_) => ApiError::BadRequest(err.to_string()),
            StudyError::Storage(storage) => storage.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound | SessionError::ExamNotFound | SessionError::QuestionNotFound => {
                ApiError::NotFound(err.to_string())
            }
            SessionError::AlreadyOpen | SessionError::Completed | SessionError::NotActive(_) => {
                ApiError::Conflict(err.to_string())
            }
            SessionError::ExamInactive
            | SessionError::InvalidQuestionCount
            | SessionError::QuestionNotInExam
            | SessionError::SelectionOutOfRange { .. }
            | SessionError::Answer(_)
            | SessionError::State(_) => ApiError::BadRequest(err.to_string()),
            SessionError::Study(study) => study.into(),
            SessionError::Progress(progress) => progress.into(),
            SessionError::Storage(storage) => storage.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::Storage(storage) => storage.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::UnverifiedIdentity
            | AuthError::IdToken(_) => ApiError::Unauthorized(err.to_string()),
            AuthError::Identity(_) => ApiError::BadRequest(err.to_string()),
            AuthError::GoogleNotConfigured => ApiError::Unavailable(err.to_string()),
            AuthError::Provider(provider) => {
                tracing::warn!(error = %provider, "identity provider call failed");
                ApiError::Unavailable("identity provider is unavailable".to_string())
            }
            AuthError::Storage(storage) => storage.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::InvalidCount { .. } | GenerationError::Difficulty(_) => {
                ApiError::BadRequest(err.to_string())
            }
            GenerationError::ExamNotFound | GenerationError::ObjectiveNotFound => {
                ApiError::NotFound(err.to_string())
            }
            GenerationError::RateLimited(_) => ApiError::RateLimited(err.to_string()),
            GenerationError::Client(AiClientError::Disabled) => {
                ApiError::Unavailable("AI question generation is not configured".to_string())
            }
            GenerationError::Malformed(detail) => {
                tracing::warn!(error = %detail, "AI reply could not be parsed");
                ApiError::Unavailable("AI provider returned an unusable reply".to_string())
            }
            GenerationError::Client(client) => {
                tracing::warn!(error = %client, "AI provider call failed");
                ApiError::Unavailable("AI provider is unavailable".to_string())
            }
            GenerationError::Storage(storage) => storage.into(),
            other => ApiError::internal(other),
        }
    }
}
