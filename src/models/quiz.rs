// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::question::{PublicQuestion, Question, QuestionInput};

/// A quiz with its ordered questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub user_id: i64,

    /// Opaque reference to the document the questions were generated from.
    pub document_id: i64,

    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Quiz {
    pub fn question(&self, question_id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Sum of all question points, answered or not.
    pub fn max_score(&self) -> i32 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

/// Quiz as shown to someone who does not own it.
#[derive(Debug, Serialize)]
pub struct PublicQuiz {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<PublicQuestion>,
    pub max_score: i32,
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            questions: quiz.questions.iter().map(PublicQuestion::from).collect(),
            max_score: quiz.max_score(),
        }
    }
}

/// DTO for creating a quiz from an explicit question list.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub document_id: i64,
    pub questions: Vec<QuestionInput>,
}

/// DTO for updating a quiz. Fields are optional; `questions` replaces the whole list.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub questions: Option<Vec<QuestionInput>>,
}

impl CreateQuizRequest {
    pub fn trim(&mut self) {
        self.title = self.title.trim().to_string();
        self.questions.iter_mut().for_each(QuestionInput::trim);
    }
}

impl UpdateQuizRequest {
    pub fn trim(&mut self) {
        if let Some(title) = &mut self.title {
            *title = title.trim().to_string();
        }
        if let Some(questions) = &mut self.questions {
            questions.iter_mut().for_each(QuestionInput::trim);
        }
    }
}
