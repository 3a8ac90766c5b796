// src/store/mod.rs

//! Persistence seam. Handlers and services only see `DynStore`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        attempt::Attempt,
        feedback::{Feedback, FeedbackRequest},
        question::{Question, QuestionInput},
        quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
        user::User,
    },
    validation::FieldError,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type DynStore = Arc<dyn Store>;

/// Question writes on a quiz that already has attempts.
pub(crate) fn questions_frozen() -> AppError {
    AppError::Conflict("Questions cannot change after the quiz has been attempted".to_string())
}

/// Deleting the only question of a quiz.
pub(crate) fn last_question() -> AppError {
    AppError::Validation(vec![FieldError::new(
        "questions",
        "quiz_must_have_questions",
        "Quiz must have at least one question.",
    )])
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn create_quiz(&self, user_id: i64, input: &CreateQuizRequest) -> Result<Quiz, AppError>;

    async fn get_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError>;

    /// Quizzes owned by `user_id`, newest first.
    async fn list_quizzes(&self, user_id: i64) -> Result<Vec<Quiz>, AppError>;

    /// Applies the present fields. A `questions` list replaces all questions
    /// and fails with `Conflict` once the quiz has attempts.
    async fn update_quiz(&self, quiz_id: i64, input: &UpdateQuizRequest) -> Result<Quiz, AppError>;

    /// Deletes the quiz with its questions, attempts and feedback.
    async fn delete_quiz(&self, quiz_id: i64) -> Result<bool, AppError>;

    /// Appends a question at the end of the quiz.
    ///
    /// This and the other question writes check for attempts atomically with
    /// the write and fail with `Conflict` when there are any.
    async fn add_question(&self, quiz_id: i64, input: &QuestionInput) -> Result<Question, AppError>;

    /// Replaces a question's content and options, keeping its position.
    async fn update_question(&self, question_id: i64, input: &QuestionInput) -> Result<Question, AppError>;

    /// `Ok(false)` for unknown ids. The last question of a quiz is kept.
    async fn delete_question(&self, question_id: i64) -> Result<bool, AppError>;

    /// The quiz a question belongs to.
    async fn find_question_quiz(&self, question_id: i64) -> Result<Option<i64>, AppError>;

    /// Inserts a new in-progress attempt, or returns the one already open
    /// for the same (quiz, user). `max_score` is taken from the quiz as
    /// stored at insert time.
    async fn create_attempt(&self, attempt: &Attempt) -> Result<Attempt, AppError>;

    async fn find_in_progress_attempt(&self, quiz_id: i64, user_id: i64) -> Result<Option<Attempt>, AppError>;

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<Attempt>, AppError>;

    /// Attempts of one user on one quiz, newest first.
    async fn list_attempts(&self, quiz_id: i64, user_id: i64) -> Result<Vec<Attempt>, AppError>;

    async fn count_attempts(&self, quiz_id: i64) -> Result<i64, AppError>;

    /// Writes a terminal attempt, but only if the stored copy is still in
    /// progress. Otherwise fails with `AttemptNotInProgress`.
    async fn finalize_attempt(&self, attempt: &Attempt) -> Result<(), AppError>;

    /// Fails with `Conflict` when the user already left feedback on the quiz.
    async fn create_feedback(
        &self,
        quiz_id: i64,
        user_id: i64,
        input: &FeedbackRequest,
    ) -> Result<Feedback, AppError>;
}
