use chrono::{DateTime, Utc};
use prep_core::model::{NewQuestion, Question, QuestionId, QuestionStats};
use prep_core::selection::{SelectionOrder, StudyQuestionQuery};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{QUESTION_COLUMNS, db_err, id_i64, map_question_row, ser, to_json};
use crate::repository::{QuestionRepository, StorageError};
use crate::selection;

/// `WHERE` clause and its bind values for a study query.
///
/// Placeholders are numbered from `?1` in the order of the returned values.
fn filter_clause(
    query: &StudyQuestionQuery,
    excluded: &[QuestionId],
) -> Result<(String, Vec<i64>), StorageError> {
    let mut sql = String::from(
        " WHERE exam_id = ?1 AND is_active = 1 AND difficulty BETWEEN ?2 AND ?3",
    );
    let mut binds = vec![
        id_i64("exam_id", query.exam_id.value())?,
        i64::from(query.difficulty.min().value()),
        i64::from(query.difficulty.max().value()),
    ];

    if !query.objective_ids.is_empty() {
        sql.push_str(" AND objective_id IN (");
        for (i, objective) in query.objective_ids.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            binds.push(id_i64("objective_id", objective.value())?);
            sql.push('?');
            sql.push_str(&binds.len().to_string());
        }
        sql.push(')');
    }

    if !excluded.is_empty() {
        sql.push_str(" AND id NOT IN (");
        for (i, question) in excluded.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            binds.push(id_i64("question_id", question.value())?);
            sql.push('?');
            sql.push_str(&binds.len().to_string());
        }
        sql.push(')');
    }

    Ok((sql, binds))
}

fn order_clause(order: SelectionOrder) -> &'static str {
    match order {
        SelectionOrder::Random => "",
        SelectionOrder::WeakAreas => " ORDER BY total_attempts DESC, id ASC",
        SelectionOrder::SpeedDrill => " ORDER BY difficulty ASC, id ASC",
    }
}

async fn insert_one(
    conn: &mut SqliteConnection,
    question: &NewQuestion,
    created_at: DateTime<Utc>,
) -> Result<Question, StorageError> {
    let exam_id = id_i64("exam_id", question.exam_id().value())?;
    let objective_id = id_i64("objective_id", question.objective_id().value())?;

    let objective_exam: Option<i64> =
        sqlx::query_scalar("SELECT exam_id FROM objectives WHERE id = ?1")
            .bind(objective_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
    if objective_exam != Some(exam_id) {
        return Err(StorageError::NotFound);
    }

    let res = sqlx::query(
        r"
            INSERT INTO questions (
                exam_id, objective_id, text, options, correct_answers,
                question_type, explanation, difficulty, source, is_active, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10)
        ",
    )
    .bind(exam_id)
    .bind(objective_id)
    .bind(question.text())
    .bind(to_json(&question.options())?)
    .bind(to_json(&question.correct_answers())?)
    .bind(question.question_type().as_str())
    .bind(question.explanation())
    .bind(i64::from(question.difficulty().value()))
    .bind(question.source().as_str())
    .bind(created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    let id = u64::try_from(res.last_insert_rowid())
        .map_err(|_| StorageError::Serialization("question_id sign overflow".into()))?;
    Ok(Question::from_persisted(
        QuestionId::new(id),
        question.clone(),
        true,
        QuestionStats::default(),
    ))
}

impl SqliteRepository {
    async fn questions_by_ids(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id IN (");
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push(')');

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id_i64("question_id", id.value())?);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_question_row).collect()
    }
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_question(&self, question: &NewQuestion) -> Result<Question, StorageError> {
        let mut stored = self.insert_questions(std::slice::from_ref(question)).await?;
        stored.pop().ok_or(StorageError::NotFound)
    }

    async fn insert_questions(
        &self,
        questions: &[NewQuestion],
    ) -> Result<Vec<Question>, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let created_at = Utc::now();
        let mut stored = Vec::with_capacity(questions.len());
        for question in questions {
            // Dropping `tx` on an early return rolls the whole batch back.
            stored.push(insert_one(&mut *tx, question, created_at).await?);
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(stored)
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        Ok(self.questions_by_ids(&[id]).await?.pop())
    }

    async fn study_questions(
        &self,
        query: &StudyQuestionQuery,
        excluded: &[QuestionId],
    ) -> Result<Vec<Question>, StorageError> {
        let (filter, binds) = filter_clause(query, excluded)?;
        let limit = i64::from(query.limit());

        if query.order == SelectionOrder::Random {
            let sql = format!("SELECT id FROM questions{filter}");
            let mut candidates = sqlx::query(&sql);
            for value in &binds {
                candidates = candidates.bind(*value);
            }
            let rows = candidates
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;

            let mut ids = Vec::with_capacity(rows.len());
            for row in &rows {
                let raw: i64 = row.try_get("id").map_err(ser)?;
                let id = u64::try_from(raw)
                    .map_err(|_| StorageError::Serialization("question_id sign overflow".into()))?;
                ids.push(QuestionId::new(id));
            }

            let chosen = selection::sample_ids(
                ids,
                usize::try_from(limit).unwrap_or(usize::MAX),
                &mut rand::rng(),
            );
            let fetched = self.questions_by_ids(&chosen).await?;
            return Ok(selection::reorder_by_ids(fetched, &chosen));
        }

        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions{filter}{} LIMIT ?{}",
            order_clause(query.order),
            binds.len() + 1
        );
        let mut rows_query = sqlx::query(&sql);
        for value in &binds {
            rows_query = rows_query.bind(*value);
        }
        let rows = rows_query
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_question_row).collect()
    }
}
