use chrono::{DateTime, Utc};
use prep_core::model::{ExamId, UserId, UserProgress};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_progress_row, to_json};
use crate::repository::{ProgressRepository, StorageError};

const PROGRESS_COLUMNS: &str = "user_id, exam_id, questions_seen, total_answers, \
     correct_answers, accuracy, mastery_level, readiness_score, objective_accuracy, \
     last_studied_at";

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_progress(
        &self,
        progress: &UserProgress,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO user_progress (
                    user_id, exam_id, questions_seen, total_answers, correct_answers,
                    accuracy, mastery_level, readiness_score, objective_accuracy,
                    last_studied_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(user_id, exam_id) DO UPDATE SET
                    questions_seen = excluded.questions_seen,
                    total_answers = excluded.total_answers,
                    correct_answers = excluded.correct_answers,
                    accuracy = excluded.accuracy,
                    mastery_level = excluded.mastery_level,
                    readiness_score = excluded.readiness_score,
                    objective_accuracy = excluded.objective_accuracy,
                    last_studied_at = excluded.last_studied_at,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(id_i64("user_id", progress.user_id.value())?)
        .bind(id_i64("exam_id", progress.exam_id.value())?)
        .bind(i64::from(progress.questions_seen))
        .bind(i64::from(progress.total_answers))
        .bind(i64::from(progress.correct_answers))
        .bind(progress.accuracy)
        .bind(progress.mastery_level.as_str())
        .bind(progress.readiness_score)
        .bind(to_json(&progress.objective_accuracy)?)
        .bind(progress.last_studied_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_progress(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<Option<UserProgress>, StorageError> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress WHERE user_id = ?1 AND exam_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(id_i64("user_id", user_id.value())?)
            .bind(id_i64("exam_id", exam_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn list_progress(&self, user_id: UserId) -> Result<Vec<UserProgress>, StorageError> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress WHERE user_id = ?1 ORDER BY exam_id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("user_id", user_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_progress_row).collect()
    }
}
