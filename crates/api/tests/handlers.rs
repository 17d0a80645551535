use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use api::{AppConfig, AppState, SharedState, build_router};
use prep_core::time::fixed_now;
use services::{AppServices, Clock};
use storage::Storage;
use storage::seed::seed_demo;

async fn state_with(vars: &[(&str, &str)]) -> SharedState {
    let storage = Storage::in_memory();
    seed_demo(&storage).await.unwrap();
    let config = AppConfig::from_lookup(|key| {
        vars.iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| (*value).to_string())
    })
    .unwrap();
    let services = AppServices::new(
        &storage,
        Clock::fixed(fixed_now()),
        config.service_settings(),
    );
    AppState::new(services, config)
}

async fn app() -> Router {
    build_router(state_with(&[]).await)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, header::HeaderMap, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn quinn() -> Value {
    json!({ "email": "quinn@example.com", "name": "Quinn", "google_id": "g-quinn" })
}

async fn sign_in(app: &Router) -> String {
    let (status, _, body) = send(app, Method::POST, "/api/auth/login", None, Some(quinn())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn development_accepts_plain_identities() {
    let app = app().await;
    let token = sign_in(&app).await;

    let (status, _, me) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["authenticated"], true);
    assert_eq!(me["user"]["email"], "quinn@example.com");
}

#[tokio::test]
async fn unverified_identities_cannot_sign_in() {
    let environments: [&[(&str, &str)]; 2] = [
        &[("ENVIRONMENT", "staging")],
        &[("GOOGLE_CLIENT_ID", "42.apps.googleusercontent.com")],
    ];
    for vars in environments {
        let app = build_router(state_with(vars).await);
        let (status, _, body) =
            send(&app, Method::POST, "/api/auth/login", None, Some(quinn())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{vars:?}");
        assert_eq!(body["authenticated"], false);
        assert!(body.get("token").is_none());
    }

    let staging = build_router(state_with(&[("ENVIRONMENT", "staging")]).await);
    let (status, _, body) = send(
        &staging,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "id_token": "eyJhbGciOi" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "service_unavailable");
}

#[tokio::test]
async fn missing_or_unknown_tokens_are_unauthorized() {
    let app = app().await;
    for token in [None, Some("not-a-real-token")] {
        let (status, headers, body) =
            send(&app, Method::GET, "/api/auth/me", token, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(body["authenticated"], false);
    }
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let app = app().await;
    let token = sign_in(&app).await;
    let (status, _, body) = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _, _) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_requests_get_json_validation_errors() {
    let app = app().await;
    let token = sign_in(&app).await;

    let (status, headers, body) = send(
        &app,
        Method::POST,
        "/api/sessions",
        Some(&token),
        Some(json!({ "exam_id": "x", "mode": "practice" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(body["error"], "validation_error");

    let (status, _, body) = send(&app, Method::GET, "/api/sessions/abc", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _, body) = send(
        &app,
        Method::GET,
        "/api/study/questions?exam_id=1&limit=lots",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _, body) = send(&app, Method::GET, "/api/exams/one/objectives", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn catalog_and_health_endpoints() {
    let app = app().await;
    let (_, _, exams) = send(&app, Method::GET, "/api/exams", None, None).await;
    assert_eq!(exams["exams"].as_array().map(Vec::len), Some(3));

    let (_, _, objectives) = send(&app, Method::GET, "/api/exams/1/objectives", None, None).await;
    assert_eq!(objectives["objectives"].as_array().map(Vec::len), Some(5));

    let (status, _, missing) = send(&app, Method::GET, "/api/exams/99/objectives", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["error"], "not_found");

    let (_, _, health) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(health["status"], "ok");
    let (_, _, db) = send(&app, Method::GET, "/api/health/database", None, None).await;
    assert_eq!(db["database"], "connected");
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let app = app().await;
    let request = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "https://app.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn study_questions_apply_the_query_string() {
    let app = app().await;
    let token = sign_in(&app).await;
    let (status, _, body) = send(
        &app,
        Method::GET,
        "/api/study/questions?exam_id=1&objective_ids=101&limit=2",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let questions = body["questions"].as_array().unwrap();
    assert!(questions.len() <= 2);
    assert!(questions.iter().all(|q| q["objective_id"] == 101));
}

#[tokio::test]
async fn session_endpoints_cover_the_lifecycle() {
    let app = app().await;
    let token = sign_in(&app).await;
    let start = json!({ "exam_id": 1, "mode": "practice" });

    let (status, _, session) =
        send(&app, Method::POST, "/api/sessions", Some(&token), Some(start.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["question_count"], 90);

    let (status, _, _) = send(&app, Method::POST, "/api/sessions", Some(&token), Some(start)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let id = session["id"].as_u64().unwrap();
    let (_, _, next) = send(
        &app,
        Method::GET,
        &format!("/api/sessions/{id}/questions?limit=1"),
        Some(&token),
        None,
    )
    .await;
    let question_id = next["questions"][0]["id"].as_u64().unwrap();

    let (status, _, outcome) = send(
        &app,
        Method::POST,
        &format!("/api/sessions/{id}/answers"),
        Some(&token),
        Some(json!({
            "question_id": question_id,
            "selected_answers": [0],
            "time_spent_seconds": 25,
            "confidence": 2,
            "flagged": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(outcome["session"]["questions_answered"], 1);

    let (status, _, paused) = send(
        &app,
        Method::PUT,
        &format!("/api/sessions/{id}"),
        Some(&token),
        Some(json!({ "action": "pause" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paused["status"], "paused");

    let complete = format!("/api/sessions/{id}/complete");
    let (status, _, done) = send(&app, Method::POST, &complete, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["session"]["status"], "completed");
    let (status, _, _) = send(&app, Method::POST, &complete, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, headers, stats) =
        send(&app, Method::GET, "/api/dashboard/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "public, max-age=300, s-maxage=300"
    );
    assert!(stats.is_object());
}

#[tokio::test]
async fn generation_without_a_key_is_unavailable() {
    let app = app().await;
    let token = sign_in(&app).await;
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/questions/generate",
        Some(&token),
        Some(json!({ "exam_id": 1, "objective_id": 101, "count": 3, "difficulty": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "service_unavailable");
}
