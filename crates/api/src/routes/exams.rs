use axum::{Json, extract::State};
use serde_json::{Value, json};

use prep_core::model::ExamId;

use crate::error::ApiError;
use crate::extract::ApiPath;
use crate::state::SharedState;

pub async fn list_exams(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let exams = state.services.exams().list_exams(true).await?;
    Ok(Json(json!({ "exams": exams })))
}

pub async fn list_objectives(
    State(state): State<SharedState>,
    ApiPath(exam_id): ApiPath<u64>,
) -> Result<Json<Value>, ApiError> {
    let exam_id = ExamId::new(exam_id);
    let catalog = state.services.exams();
    if catalog.get_exam(exam_id).await?.is_none() {
        return Err(ApiError::NotFound("exam not found".to_string()));
    }
    let objectives = catalog.list_objectives(exam_id).await?;
    Ok(Json(json!({ "exam_id": exam_id, "objectives": objectives })))
}
