use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use prep_core::model::{
    AnsweredQuestion, Exam, ExamId, MasteryLevel, Objective, ObjectiveId, ObjectiveStats,
    Question, QuestionDraft, QuestionId, QuestionSource, QuestionStats, SessionId, SessionMode,
    SessionStatus, StudySession, SubscriptionTier, User, UserId, UserProgress,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps a driver error, turning constraint violations into domain outcomes.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn get_u32(row: &SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    u32_from_i64(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

fn get_u64(row: &SqliteRow, field: &'static str) -> Result<u64, StorageError> {
    i64_to_u64(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

fn get_json<T: serde::de::DeserializeOwned>(
    row: &SqliteRow,
    field: &'static str,
) -> Result<T, StorageError> {
    let raw: String = row.try_get(field).map_err(ser)?;
    serde_json::from_str(&raw).map_err(ser)
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    let tier: String = row.try_get("subscription_tier").map_err(ser)?;
    Ok(User {
        id: UserId::new(get_u64(row, "id")?),
        email: row.try_get("email").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        google_id: row.try_get("google_id").map_err(ser)?,
        subscription_tier: SubscriptionTier::parse(&tier).map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_exam_row(row: &SqliteRow) -> Result<Exam, StorageError> {
    Exam::new(
        ExamId::new(get_u64(row, "id")?),
        row.try_get::<String, _>("vendor").map_err(ser)?,
        row.try_get::<String, _>("code").map_err(ser)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        get_u32(row, "passing_score")?,
        get_u32(row, "time_limit_minutes")?,
        get_u32(row, "question_count")?,
        row.try_get::<bool, _>("is_active").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_objective_row(row: &SqliteRow) -> Result<Objective, StorageError> {
    Objective::new(
        ObjectiveId::new(get_u64(row, "id")?),
        ExamId::new(get_u64(row, "exam_id")?),
        row.try_get::<String, _>("code").map_err(ser)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        get_u32(row, "weight")?,
    )
    .map_err(ser)
}

pub(crate) const QUESTION_COLUMNS: &str = "id, exam_id, objective_id, text, options, \
     correct_answers, explanation, difficulty, source, is_active, total_attempts, \
     correct_attempts, avg_time_seconds";

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let difficulty = u8::try_from(row.try_get::<i64, _>("difficulty").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("difficulty overflow".into()))?;
    let source: String = row.try_get("source").map_err(ser)?;

    let draft = QuestionDraft {
        exam_id: ExamId::new(get_u64(row, "exam_id")?),
        objective_id: ObjectiveId::new(get_u64(row, "objective_id")?),
        text: row.try_get("text").map_err(ser)?,
        options: get_json(row, "options")?,
        correct_answers: get_json(row, "correct_answers")?,
        explanation: row.try_get("explanation").map_err(ser)?,
        difficulty,
        source: QuestionSource::parse(&source).map_err(ser)?,
    };

    let stats = QuestionStats {
        total_attempts: get_u32(row, "total_attempts")?,
        correct_attempts: get_u32(row, "correct_attempts")?,
        avg_time_seconds: row.try_get("avg_time_seconds").map_err(ser)?,
    };

    Ok(Question::from_persisted(
        QuestionId::new(get_u64(row, "id")?),
        draft.validate().map_err(ser)?,
        row.try_get::<bool, _>("is_active").map_err(ser)?,
        stats,
    ))
}

pub(crate) const SESSION_COLUMNS: &str = "id, user_id, exam_id, mode, status, \
     question_count, questions_answered, correct_answers, accuracy, avg_time_seconds, \
     objective_breakdown, started_at, last_activity_at, completed_at";

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<StudySession, StorageError> {
    let mode: String = row.try_get("mode").map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;
    let objective_breakdown: BTreeMap<ObjectiveId, ObjectiveStats> =
        get_json(row, "objective_breakdown")?;

    Ok(StudySession {
        id: SessionId::new(get_u64(row, "id")?),
        user_id: UserId::new(get_u64(row, "user_id")?),
        exam_id: ExamId::new(get_u64(row, "exam_id")?),
        mode: SessionMode::parse(&mode).map_err(ser)?,
        status: SessionStatus::parse(&status).map_err(ser)?,
        question_count: get_u32(row, "question_count")?,
        questions_answered: get_u32(row, "questions_answered")?,
        correct_answers: get_u32(row, "correct_answers")?,
        accuracy: row.try_get("accuracy").map_err(ser)?,
        avg_time_seconds: row.try_get("avg_time_seconds").map_err(ser)?,
        objective_breakdown,
        started_at: row.try_get("started_at").map_err(ser)?,
        last_activity_at: row.try_get("last_activity_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

/// Expects `question_id, objective_id, is_correct, time_spent_seconds, answered_at`.
pub(crate) fn map_answered_row(row: &SqliteRow) -> Result<AnsweredQuestion, StorageError> {
    Ok(AnsweredQuestion {
        question_id: QuestionId::new(get_u64(row, "question_id")?),
        objective_id: ObjectiveId::new(get_u64(row, "objective_id")?),
        is_correct: row.try_get::<bool, _>("is_correct").map_err(ser)?,
        time_spent_seconds: get_u32(row, "time_spent_seconds")?,
        answered_at: row.try_get::<DateTime<Utc>, _>("answered_at").map_err(ser)?,
    })
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<UserProgress, StorageError> {
    let mastery: String = row.try_get("mastery_level").map_err(ser)?;
    Ok(UserProgress {
        user_id: UserId::new(get_u64(row, "user_id")?),
        exam_id: ExamId::new(get_u64(row, "exam_id")?),
        questions_seen: get_u32(row, "questions_seen")?,
        total_answers: get_u32(row, "total_answers")?,
        correct_answers: get_u32(row, "correct_answers")?,
        accuracy: row.try_get("accuracy").map_err(ser)?,
        mastery_level: MasteryLevel::parse(&mastery)
            .ok_or_else(|| StorageError::Serialization(format!("invalid mastery: {mastery}")))?,
        readiness_score: row.try_get("readiness_score").map_err(ser)?,
        objective_accuracy: get_json(row, "objective_accuracy")?,
        last_studied_at: row.try_get("last_studied_at").map_err(ser)?,
    })
}
