use axum::{
    Json,
    extract::State,
    http::header::{CACHE_CONTROL, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::SharedState;

const DASHBOARD_CACHE: &str = "public, max-age=300, s-maxage=300";

pub async fn dashboard_stats(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> Result<Response, ApiError> {
    let stats = state.services.dashboard().stats(current.user.id).await?;
    Ok((
        [(CACHE_CONTROL, HeaderValue::from_static(DASHBOARD_CACHE))],
        Json(stats),
    )
        .into_response())
}
