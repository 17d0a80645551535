use prep_core::model::{ExamId, SessionId, SessionStatus, StudySession, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{SESSION_COLUMNS, db_err, id_i64, map_session_row, ser, to_json, u32_from_i64};
use crate::repository::{NewSession, SessionCounts, SessionRepository, StorageError};

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, session: &NewSession) -> Result<StudySession, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO study_sessions (
                    user_id, exam_id, mode, status, question_count,
                    started_at, last_activity_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ",
        )
        .bind(id_i64("user_id", session.user_id.value())?)
        .bind(id_i64("exam_id", session.exam_id.value())?)
        .bind(session.mode.as_str())
        .bind(SessionStatus::Active.as_str())
        .bind(i64::from(session.question_count))
        .bind(session.started_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("session_id sign overflow".into()))?;
        Ok(StudySession::start(
            SessionId::new(id),
            session.user_id,
            session.exam_id,
            session.mode,
            session.question_count,
            session.started_at,
        ))
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<StudySession>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM study_sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("session_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn update_session(&self, session: &StudySession) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE study_sessions SET
                    status = ?2,
                    question_count = ?3,
                    questions_answered = ?4,
                    correct_answers = ?5,
                    accuracy = ?6,
                    avg_time_seconds = ?7,
                    objective_breakdown = ?8,
                    last_activity_at = ?9,
                    completed_at = ?10
                WHERE id = ?1
            ",
        )
        .bind(id_i64("session_id", session.id.value())?)
        .bind(session.status.as_str())
        .bind(i64::from(session.question_count))
        .bind(i64::from(session.questions_answered))
        .bind(i64::from(session.correct_answers))
        .bind(session.accuracy)
        .bind(session.avg_time_seconds)
        .bind(to_json(&session.objective_breakdown)?)
        .bind(session.last_activity_at)
        .bind(session.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn find_open_session(
        &self,
        user_id: UserId,
        exam_id: ExamId,
    ) -> Result<Option<StudySession>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM study_sessions \
             WHERE user_id = ?1 AND exam_id = ?2 AND status != 'completed'"
        );
        let row = sqlx::query(&sql)
            .bind(id_i64("user_id", user_id.value())?)
            .bind(id_i64("exam_id", exam_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn list_sessions(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<StudySession>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM study_sessions \
             WHERE user_id = ?1 ORDER BY started_at DESC, id DESC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("user_id", user_id.value())?)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_session_row).collect()
    }

    async fn count_sessions(&self, user_id: UserId) -> Result<SessionCounts, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed
                FROM study_sessions
                WHERE user_id = ?1
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(SessionCounts {
            total: u32_from_i64("total", row.try_get("total").map_err(ser)?)?,
            completed: u32_from_i64("completed", row.try_get("completed").map_err(ser)?)?,
        })
    }
}
