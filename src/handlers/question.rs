// src/handlers/question.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use super::quiz::owned_quiz;
use crate::{
    error::AppError,
    models::question::{CreateQuestionRequest, QuestionInput},
    store::DynStore,
    utils::{extract::AppJson, jwt::Claims},
    validation::{ensure_valid, validate_question},
};

/// Appends a question to one of the caller's quizzes. Questions are frozen
/// once the quiz has been attempted.
pub async fn create_question(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    AppJson(mut payload): AppJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    owned_quiz(&store, payload.quiz_id, claims.user_id()?).await?;
    payload.question.trim();
    ensure_valid(validate_question(&payload.question))?;

    let question = store.add_question(payload.quiz_id, &payload.question).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// Replaces a question's content and options. Its position is kept.
pub async fn update_question(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    AppJson(mut payload): AppJson<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    let quiz_id = quiz_of(&store, id).await?;
    owned_quiz(&store, quiz_id, claims.user_id()?).await?;
    payload.trim();
    ensure_valid(validate_question(&payload))?;

    let question = store.update_question(id, &payload).await?;
    Ok(Json(question))
}

/// Deletes a question. A quiz always keeps at least one.
pub async fn delete_question(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz_id = quiz_of(&store, id).await?;
    owned_quiz(&store, quiz_id, claims.user_id()?).await?;

    if !store.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Checks a question without storing it.
pub async fn validate(AppJson(mut payload): AppJson<QuestionInput>) -> impl IntoResponse {
    payload.trim();
    let errors = validate_question(&payload);
    Json(json!({
        "valid": errors.is_empty(),
        "errors": errors,
    }))
}

async fn quiz_of(store: &DynStore, question_id: i64) -> Result<i64, AppError> {
    store
        .find_question_quiz(question_id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))
}
