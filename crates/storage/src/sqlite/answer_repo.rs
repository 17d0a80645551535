use chrono::{DateTime, Utc};
use prep_core::model::{
    AnswerId, AnsweredQuestion, ExamId, NewAnswer, QuestionId, SessionId, UserAnswer, UserId,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_answered_row, ser, to_json};
use crate::repository::{AnswerActivity, AnswerRepository, StorageError};

fn non_negative_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn recent_question_ids(
        &self,
        user_id: UserId,
        exam_id: ExamId,
        since: DateTime<Utc>,
    ) -> Result<Vec<QuestionId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT DISTINCT a.question_id
                FROM user_answers a
                JOIN questions q ON q.id = a.question_id
                WHERE a.user_id = ?1 AND q.exam_id = ?2 AND a.answered_at >= ?3
                ORDER BY a.question_id ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("exam_id", exam_id.value())?)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: i64 = row.try_get("question_id").map_err(ser)?;
            out.push(QuestionId::new(non_negative_u64("question_id", raw)?));
        }
        Ok(out)
    }

    async fn record_answer(&self, answer: NewAnswer) -> Result<UserAnswer, StorageError> {
        let question_id = id_i64("question_id", answer.question_id.value())?;
        let session_id = id_i64("session_id", answer.session_id.value())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let res = sqlx::query(
            r"
                INSERT INTO user_answers (
                    session_id, user_id, question_id, selected_answers, is_correct,
                    time_spent_seconds, confidence, flagged, answered_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(session_id)
        .bind(id_i64("user_id", answer.user_id.value())?)
        .bind(question_id)
        .bind(to_json(&answer.selected_answers)?)
        .bind(answer.is_correct)
        .bind(i64::from(answer.time_spent_seconds))
        .bind(answer.confidence.map(|c| i64::from(c.value())))
        .bind(answer.flagged)
        .bind(answer.answered_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let answer_id = non_negative_u64("answer_id", res.last_insert_rowid())?;

        // Right-hand sides see the pre-update row.
        let updated = sqlx::query(
            r"
                UPDATE questions SET
                    total_attempts = total_attempts + 1,
                    correct_attempts = correct_attempts + ?2,
                    avg_time_seconds = CASE
                        WHEN total_attempts = 0 THEN ?3
                        ELSE (avg_time_seconds * total_attempts + ?3) / (total_attempts + 1)
                    END
                WHERE id = ?1
            ",
        )
        .bind(question_id)
        .bind(i64::from(answer.is_correct))
        .bind(f64::from(answer.time_spent_seconds))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let touched = sqlx::query("UPDATE study_sessions SET last_activity_at = ?2 WHERE id = ?1")
            .bind(session_id)
            .bind(answer.answered_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if touched.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(UserAnswer::from_new(AnswerId::new(answer_id), answer))
    }

    async fn session_answers(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AnsweredQuestion>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT a.question_id, q.objective_id, a.is_correct,
                       a.time_spent_seconds, a.answered_at
                FROM user_answers a
                JOIN questions q ON q.id = a.question_id
                WHERE a.session_id = ?1
                ORDER BY a.answered_at ASC, a.id ASC
            ",
        )
        .bind(id_i64("session_id", session_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_answered_row).collect()
    }

    async fn user_exam_answers(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<Vec<AnsweredQuestion>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT a.question_id, q.objective_id, a.is_correct,
                       a.time_spent_seconds, a.answered_at
                FROM user_answers a
                JOIN questions q ON q.id = a.question_id
                WHERE a.user_id = ?1 AND q.exam_id = ?2
                ORDER BY a.answered_at ASC, a.id ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("exam_id", exam_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_answered_row).collect()
    }

    async fn activity(
        &self,
        user_id: UserId,
        recent_since: DateTime<Utc>,
    ) -> Result<AnswerActivity, StorageError> {
        let user = id_i64("user_id", user_id.value())?;

        let totals = sqlx::query(
            r"
                SELECT
                    COUNT(*) AS total_answers,
                    COALESCE(SUM(is_correct), 0) AS correct_answers,
                    COALESCE(SUM(time_spent_seconds), 0) AS total_time_seconds
                FROM user_answers
                WHERE user_id = ?1
            ",
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let recent: Vec<DateTime<Utc>> = sqlx::query_scalar(
            r"
                SELECT answered_at
                FROM user_answers
                WHERE user_id = ?1 AND answered_at >= ?2
                ORDER BY answered_at DESC
            ",
        )
        .bind(user)
        .bind(recent_since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let count = |field: &'static str| -> Result<u32, StorageError> {
            let v: i64 = totals.try_get(field).map_err(ser)?;
            u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}")))
        };

        Ok(AnswerActivity {
            total_answers: count("total_answers")?,
            correct_answers: count("correct_answers")?,
            total_time_seconds: non_negative_u64(
                "total_time_seconds",
                totals.try_get("total_time_seconds").map_err(ser)?,
            )?,
            recent_answer_times: recent,
        })
    }
}
