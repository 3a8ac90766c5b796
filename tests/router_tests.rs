// tests/router_tests.rs

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use quizgen::{config::Config, routes, state::AppState, store::MemoryStore};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

fn app() -> axum::Router {
    let config = Config {
        database_url: None,
        jwt_secret: "router_test_secret".to_string(),
        jwt_expiration: 60,
        rust_log: "error".to_string(),
        port: 0,
        log_dir: "logs".to_string(),
    };
    routes::create_router(AppState::new(Arc::new(MemoryStore::new()), config))
}

#[tokio::test]
async fn health_responds_ok() {
    let response = app()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn attempt_submission_needs_token() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/quizzes/1/attempt")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"answers":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/quizzes")
                .header("authorization", "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"username": "alice""#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "BAD_REQUEST");
}
