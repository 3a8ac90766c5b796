// src/models/feedback.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Rating of a single question inside a feedback entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QuestionFeedback {
    pub question_id: i64,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5."))]
    pub rating: i32,
    #[validate(length(max = 1000, message = "Comment cannot be more than 1000 characters."))]
    pub comment: Option<String>,
}

/// Represents the 'feedback' table. One row per (quiz, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub question_feedback: Vec<QuestionFeedback>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for `POST /api/quizzes/{id}/feedback`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FeedbackRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5."))]
    pub rating: i32,
    #[validate(length(max = 2000, message = "Comment cannot be more than 2000 characters."))]
    pub comment: Option<String>,
    #[serde(default)]
    pub question_feedback: Vec<QuestionFeedback>,
}
