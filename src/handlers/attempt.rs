// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::attempt::{AttemptResponse, SubmitAttemptRequest},
    services::attempts::AttemptService,
    store::DynStore,
    utils::{extract::AppJson, jwt::Claims},
    validation::{ensure_valid, validate_submission},
};

/// Opens (or returns the already open) attempt on a quiz.
pub async fn start_attempt(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = attempts.start(quiz_id, claims.user_id()?).await?;
    Ok(Json(AttemptResponse::from(attempt)))
}

/// Submits the full answer set of the caller's open attempt and returns the
/// graded result.
///
/// * Validates the payload. Text answers are kept verbatim for the grader.
/// * Locates or creates the in-progress attempt for (quiz, user).
/// * Scores every answer, completes the attempt and persists it atomically.
pub async fn submit_attempt(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    AppJson(req): AppJson<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_valid(validate_submission(&req))?;

    let attempt = attempts.submit(quiz_id, claims.user_id()?, &req.answers).await?;
    Ok(Json(AttemptResponse::from(attempt)))
}

/// Lists the caller's attempts on a quiz, newest first.
pub async fn list_attempts(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if store.get_quiz(quiz_id).await?.is_none() {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    let attempts: Vec<AttemptResponse> = store
        .list_attempts(quiz_id, claims.user_id()?)
        .await?
        .into_iter()
        .map(AttemptResponse::from)
        .collect();

    Ok(Json(attempts))
}

/// Retrieves one of the caller's attempts as stored.
pub async fn get_attempt(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let attempt = store
        .get_attempt(attempt_id)
        .await?
        .filter(|a| a.user_id == user_id)
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    Ok(Json(AttemptResponse::from(attempt)))
}

/// Marks one of the caller's open attempts as abandoned.
pub async fn abandon_attempt(
    State(attempts): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = attempts.abandon(attempt_id, claims.user_id()?).await?;
    Ok(Json(AttemptResponse::from(attempt)))
}
