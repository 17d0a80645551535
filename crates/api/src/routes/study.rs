use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use prep_core::model::{ExamId, ObjectiveId};
use prep_core::selection::{DifficultyRange, SelectionOrder, StudyQuestionQuery};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::state::SharedState;

/// Query string of `GET /api/study/questions`.
#[derive(Debug, Default, Deserialize)]
pub struct StudyParams {
    pub exam_id: Option<u64>,
    /// Comma separated objective ids.
    pub objective_ids: Option<String>,
    pub min_difficulty: Option<u8>,
    pub max_difficulty: Option<u8>,
    pub exclude_recent_hours: Option<u32>,
    pub limit: Option<u32>,
    pub order: Option<String>,
}

impl StudyParams {
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for a missing exam id or malformed filters.
    pub fn into_query(self) -> Result<StudyQuestionQuery, ApiError> {
        let exam_id = self
            .exam_id
            .ok_or_else(|| ApiError::BadRequest("exam_id is required".to_string()))?;
        let mut query = StudyQuestionQuery::new(ExamId::new(exam_id));

        if let Some(raw) = self.objective_ids.as_deref() {
            let ids = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<ObjectiveId>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| ApiError::BadRequest(format!("objective_ids: {err}")))?;
            query = query.with_objectives(ids);
        }

        if self.min_difficulty.is_some() || self.max_difficulty.is_some() {
            let range = DifficultyRange::new(
                self.min_difficulty.unwrap_or(1),
                self.max_difficulty.unwrap_or(5),
            )
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
            query = query.with_difficulty(range);
        }

        if let Some(hours) = self.exclude_recent_hours {
            query = query.with_exclude_recent_hours(hours);
        }
        if let Some(limit) = self.limit {
            query = query.with_limit(limit);
        }
        if let Some(order) = self.order.as_deref() {
            let order =
                SelectionOrder::parse(order).map_err(|err| ApiError::BadRequest(err.to_string()))?;
            query = query.with_order(order);
        }
        Ok(query)
    }
}

pub async fn study_questions(
    State(state): State<SharedState>,
    current: CurrentUser,
    ApiQuery(params): ApiQuery<StudyParams>,
) -> Result<Json<Value>, ApiError> {
    let query = params.into_query()?;
    let questions = state
        .services
        .study()
        .study_questions(current.user.id, &query)
        .await?;
    Ok(Json(json!({
        "questions": questions,
        "count": questions.len(),
    })))
}
