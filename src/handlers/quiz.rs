// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    models::quiz::{CreateQuizRequest, PublicQuiz, Quiz, UpdateQuizRequest},
    store::DynStore,
    utils::{extract::AppJson, jwt::Claims},
    validation::{ensure_valid, validate_quiz, validate_quiz_update},
};

/// Loads a quiz the caller owns. Missing quizzes are 404, foreign ones 403.
pub(crate) async fn owned_quiz(store: &DynStore, quiz_id: i64, user_id: i64) -> Result<Quiz, AppError> {
    let quiz = store
        .get_quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if quiz.user_id != user_id {
        return Err(AppError::Forbidden("You do not own this quiz".to_string()));
    }
    Ok(quiz)
}

/// Creates a quiz from an explicit, validated question list.
pub async fn create_quiz(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    AppJson(mut payload): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    payload.trim();
    ensure_valid(validate_quiz(&payload))?;

    let quiz = store.create_quiz(user_id, &payload).await?;

    tracing::info!(quiz_id = quiz.id, user_id, questions = quiz.questions.len(), "Quiz created");
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Lists the caller's quizzes, newest first.
pub async fn list_quizzes(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = store.list_quizzes(claims.user_id()?).await?;
    Ok(Json(quizzes))
}

/// Retrieves a quiz. The owner sees answers and explanations, everybody
/// else gets the version without them.
pub async fn get_quiz(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let quiz = store
        .get_quiz(id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if quiz.user_id == claims.user_id()? {
        Ok(Json(quiz).into_response())
    } else {
        Ok(Json(PublicQuiz::from(&quiz)).into_response())
    }
}

/// Updates title, description and/or the whole question list. Replacing
/// the questions of an attempted quiz is a conflict.
pub async fn update_quiz(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    AppJson(mut payload): AppJson<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    owned_quiz(&store, id, claims.user_id()?).await?;
    payload.trim();
    ensure_valid(validate_quiz_update(&payload))?;

    let quiz = store.update_quiz(id, &payload).await?;
    Ok(Json(quiz))
}

/// Deletes a quiz together with its attempts and feedback.
pub async fn delete_quiz(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    owned_quiz(&store, id, claims.user_id()?).await?;

    if !store.delete_quiz(id).await? {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    tracing::info!(quiz_id = id, "Quiz deleted");
    Ok(StatusCode::NO_CONTENT)
}
