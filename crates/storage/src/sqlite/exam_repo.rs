use prep_core::model::{Exam, ExamId, Objective};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_exam_row, map_objective_row};
use crate::repository::{ExamRepository, StorageError};

#[async_trait::async_trait]
impl ExamRepository for SqliteRepository {
    async fn upsert_exam(&self, exam: &Exam) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO exams (
                    id, vendor, code, name, passing_score,
                    time_limit_minutes, question_count, is_active
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    vendor = excluded.vendor,
                    code = excluded.code,
                    name = excluded.name,
                    passing_score = excluded.passing_score,
                    time_limit_minutes = excluded.time_limit_minutes,
                    question_count = excluded.question_count,
                    is_active = excluded.is_active
            ",
        )
        .bind(id_i64("exam_id", exam.id().value())?)
        .bind(exam.vendor())
        .bind(exam.code())
        .bind(exam.name())
        .bind(i64::from(exam.passing_score()))
        .bind(i64::from(exam.time_limit_minutes()))
        .bind(i64::from(exam.question_count()))
        .bind(exam.is_active())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_exam(&self, id: ExamId) -> Result<Option<Exam>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, vendor, code, name, passing_score,
                       time_limit_minutes, question_count, is_active
                FROM exams
                WHERE id = ?1
            ",
        )
        .bind(id_i64("exam_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_exam_row).transpose()
    }

    async fn list_exams(&self, active_only: bool) -> Result<Vec<Exam>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, vendor, code, name, passing_score,
                       time_limit_minutes, question_count, is_active
                FROM exams
                WHERE ?1 = 0 OR is_active = 1
                ORDER BY vendor ASC, code ASC
            ",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_exam_row).collect()
    }

    async fn upsert_objective(&self, objective: &Objective) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO objectives (id, exam_id, code, title, weight)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    exam_id = excluded.exam_id,
                    code = excluded.code,
                    title = excluded.title,
                    weight = excluded.weight
            ",
        )
        .bind(id_i64("objective_id", objective.id().value())?)
        .bind(id_i64("exam_id", objective.exam_id().value())?)
        .bind(objective.code())
        .bind(objective.title())
        .bind(i64::from(objective.weight()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn list_objectives(&self, exam_id: ExamId) -> Result<Vec<Objective>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, exam_id, code, title, weight
                FROM objectives
                WHERE exam_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(id_i64("exam_id", exam_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_objective_row).collect()
    }
}
