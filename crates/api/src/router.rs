use std::time::Duration;

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware::map_response_with_state,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::error::expose_internal_details;
use crate::routes;
use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/health/database", get(routes::database_health))
        .route("/api/auth/login", post(routes::login))
        .route("/api/auth/logout", post(routes::logout))
        .route("/api/auth/me", get(routes::me))
        .route("/api/exams", get(routes::list_exams))
        .route("/api/exams/{id}/objectives", get(routes::list_objectives))
        .route("/api/study/questions", get(routes::study_questions))
        .route("/api/dashboard/stats", get(routes::dashboard_stats))
        .route("/api/sessions", post(routes::create_session))
        .route(
            "/api/sessions/{id}",
            get(routes::get_session).put(routes::update_session),
        )
        .route("/api/sessions/{id}/answers", post(routes::record_answer))
        .route("/api/sessions/{id}/questions", get(routes::next_questions))
        .route("/api/sessions/{id}/complete", post(routes::complete_session))
        .route("/api/questions/generate", post(routes::generate_questions))
        .layer(map_response_with_state(
            state.clone(),
            expose_internal_details,
        ))
        .layer(cors)
        .with_state(state)
}
