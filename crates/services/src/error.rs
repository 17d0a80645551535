//! Shared error types for the services crate.

use thiserror::Error;

use prep_core::model::{AnswerError, QuestionError, SessionStateError, SessionStatus, UserError};
use prep_core::selection::SelectionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `StudyService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudyError {
    #[error("exam not found")]
    ExamNotFound,
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("exam not found")]
    ExamNotFound,
    #[error("exam is not active")]
    ExamInactive,
    #[error("an open session already exists for this exam")]
    AlreadyOpen,
    #[error("question count must be greater than 0")]
    InvalidQuestionCount,
    #[error("session already completed")]
    Completed,
    #[error("answers can only be recorded on an active session, this one is {0}")]
    NotActive(SessionStatus),
    #[error("question not found")]
    QuestionNotFound,
    #[error("question does not belong to the session's exam")]
    QuestionNotInExam,
    #[error("selected option {index} is out of range")]
    SelectionOutOfRange { index: usize },
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    State(#[from] SessionStateError),
    #[error(transparent)]
    Study(#[from] StudyError),
    #[error(transparent)]
    Progress(#[from] DashboardError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DashboardService` and `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DashboardError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("authentication required")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("sign-in requires a verified Google ID token")]
    UnverifiedIdentity,
    #[error("Google ID token rejected: {0}")]
    IdToken(String),
    #[error("Google sign-in is not configured")]
    GoogleNotConfigured,
    #[error("identity provider request failed: {0}")]
    Provider(#[from] reqwest::Error),
    #[error(transparent)]
    Identity(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Rejections from the per-user generation limiter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RateLimitError {
    #[error("please wait {remaining_secs}s before generating again")]
    CooldownActive { remaining_secs: u32 },
    #[error("daily generation limit of {cap} reached")]
    DailyCapReached { cap: u32 },
}

/// Errors emitted by the AI client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AiClientError {
    #[error("AI generation is not configured")]
    Disabled,
    #[error("AI provider returned an empty response")]
    EmptyResponse,
    #[error("AI provider request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `GenerationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("count must be between 1 and {max}, got {count}")]
    InvalidCount { count: u8, max: u8 },
    #[error("exam not found")]
    ExamNotFound,
    #[error("objective not found for this exam")]
    ObjectiveNotFound,
    #[error("AI response could not be parsed: {0}")]
    Malformed(String),
    #[error(transparent)]
    Difficulty(#[from] QuestionError),
    #[error(transparent)]
    RateLimited(#[from] RateLimitError),
    #[error(transparent)]
    Client(#[from] AiClientError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
