// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, auth, feedback, health, question, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, quizzes, questions).
/// * Protects everything but auth and health with the bearer-token middleware.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes).post(quiz::create_quiz))
        .route(
            "/{id}",
            get(quiz::get_quiz).put(quiz::update_quiz).delete(quiz::delete_quiz),
        )
        .route("/{id}/start", post(attempt::start_attempt))
        .route("/{id}/attempt", post(attempt::submit_attempt))
        .route("/{id}/attempts", get(attempt::list_attempts))
        .route("/{id}/feedback", post(feedback::submit_feedback))
        .route("/attempts/{attempt_id}", get(attempt::get_attempt))
        .route("/attempts/{attempt_id}/abandon", post(attempt::abandon_attempt));

    let question_routes = Router::new()
        .route("/", post(question::create_question))
        .route("/validate", post(question::validate))
        .route(
            "/{id}",
            put(question::update_question).delete(question::delete_question),
        );

    let protected = Router::new()
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/questions", question_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/auth", auth_routes)
        .merge(protected)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
