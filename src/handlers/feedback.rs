// src/handlers/feedback.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{attempt::AttemptError, feedback::FeedbackRequest},
    store::DynStore,
    utils::{extract::AppJson, html::clean_optional, jwt::Claims},
    validation::{ensure_valid, validate_feedback},
};

/// Records the caller's rating of a quiz. One entry per (quiz, user).
pub async fn submit_feedback(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    AppJson(mut payload): AppJson<FeedbackRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    ensure_valid(validate_feedback(&payload))?;

    let quiz = store
        .get_quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if let Some(item) = payload
        .question_feedback
        .iter()
        .find(|item| quiz.question(item.question_id).is_none())
    {
        return Err(AttemptError::InvalidQuestionReference {
            question_id: item.question_id,
        }
        .into());
    }

    payload.comment = clean_optional(payload.comment.as_deref());
    for item in &mut payload.question_feedback {
        item.comment = clean_optional(item.comment.as_deref());
    }

    let feedback = store.create_feedback(quiz_id, user_id, &payload).await?;

    tracing::info!(quiz_id, user_id, rating = feedback.rating, "Feedback recorded");
    Ok((StatusCode::CREATED, Json(feedback)))
}
