// src/store/memory.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Store, last_question, questions_frozen};
use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptError, AttemptStatus},
        feedback::{Feedback, FeedbackRequest},
        question::{Question, QuestionInput, QuestionOption},
        quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
        user::User,
    },
};

/// Process-local store used by tests and when no database is configured.
/// Every write happens under one lock, so status checks and writes are atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    last_id: i64,
    users: Vec<User>,
    quizzes: BTreeMap<i64, Quiz>,
    attempts: BTreeMap<i64, Attempt>,
    feedback: Vec<Feedback>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn build_question(&mut self, quiz_id: i64, id: Option<i64>, input: &QuestionInput) -> Question {
        let id = id.unwrap_or_else(|| self.next_id());
        let options = input
            .options
            .iter()
            .map(|o| QuestionOption {
                id: self.next_id(),
                text: o.text.clone(),
                is_correct: o.is_correct,
            })
            .collect();

        Question {
            id,
            quiz_id,
            question_type: input.question_type,
            text: input.text.clone(),
            options,
            difficulty: input.difficulty,
            points: input.points,
            bloom_level: input.bloom_level,
            explanation: input.explanation.clone(),
            source_text: input.source_text.clone(),
            source_location: input.source_location.clone(),
        }
    }

    fn ensure_unattempted(&self, quiz_id: i64) -> Result<(), AppError> {
        if self.attempts.values().any(|a| a.quiz_id == quiz_id) {
            return Err(questions_frozen());
        }
        Ok(())
    }

    fn quiz_of_question(&self, question_id: i64) -> Option<i64> {
        self.quizzes
            .values()
            .find(|quiz| quiz.question(question_id).is_some())
            .map(|quiz| quiz.id)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn quiz_not_found() -> AppError {
    AppError::NotFound("Quiz not found".to_string())
}

fn question_not_found() -> AppError {
    AppError::NotFound("Question not found".to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let mut inner = self.inner.write().await;
        if inner.users.iter().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!("Username '{}' already exists", username)));
        }

        let user = User {
            id: inner.next_id(),
            username: username.to_string(),
            password: password_hash.to_string(),
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_quiz(&self, user_id: i64, input: &CreateQuizRequest) -> Result<Quiz, AppError> {
        let mut inner = self.inner.write().await;
        let quiz_id = inner.next_id();
        let questions = input
            .questions
            .iter()
            .map(|q| inner.build_question(quiz_id, None, q))
            .collect();
        let now = Utc::now();

        let quiz = Quiz {
            id: quiz_id,
            user_id,
            document_id: input.document_id,
            title: input.title.clone(),
            description: input.description.clone(),
            questions,
            created_at: now,
            updated_at: now,
        };
        inner.quizzes.insert(quiz_id, quiz.clone());
        Ok(quiz)
    }

    async fn get_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError> {
        Ok(self.inner.read().await.quizzes.get(&quiz_id).cloned())
    }

    async fn list_quizzes(&self, user_id: i64) -> Result<Vec<Quiz>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .quizzes
            .values()
            .rev()
            .filter(|q| q.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_quiz(&self, quiz_id: i64, input: &UpdateQuizRequest) -> Result<Quiz, AppError> {
        let mut inner = self.inner.write().await;
        if !inner.quizzes.contains_key(&quiz_id) {
            return Err(quiz_not_found());
        }
        if input.questions.is_some() {
            inner.ensure_unattempted(quiz_id)?;
        }

        let questions: Option<Vec<Question>> = input.questions.as_ref().map(|questions| {
            questions
                .iter()
                .map(|q| inner.build_question(quiz_id, None, q))
                .collect()
        });

        let quiz = inner.quizzes.get_mut(&quiz_id).ok_or_else(quiz_not_found)?;
        if let Some(title) = &input.title {
            quiz.title = title.clone();
        }
        if let Some(description) = &input.description {
            quiz.description = Some(description.clone());
        }
        if let Some(questions) = questions {
            quiz.questions = questions;
        }
        quiz.updated_at = Utc::now();
        Ok(quiz.clone())
    }

    async fn delete_quiz(&self, quiz_id: i64) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let removed = inner.quizzes.remove(&quiz_id).is_some();
        if removed {
            inner.attempts.retain(|_, a| a.quiz_id != quiz_id);
            inner.feedback.retain(|f| f.quiz_id != quiz_id);
        }
        Ok(removed)
    }

    async fn add_question(&self, quiz_id: i64, input: &QuestionInput) -> Result<Question, AppError> {
        let mut inner = self.inner.write().await;
        if !inner.quizzes.contains_key(&quiz_id) {
            return Err(quiz_not_found());
        }
        inner.ensure_unattempted(quiz_id)?;

        let question = inner.build_question(quiz_id, None, input);
        let quiz = inner.quizzes.get_mut(&quiz_id).ok_or_else(quiz_not_found)?;
        quiz.questions.push(question.clone());
        quiz.updated_at = Utc::now();
        Ok(question)
    }

    async fn update_question(&self, question_id: i64, input: &QuestionInput) -> Result<Question, AppError> {
        let mut inner = self.inner.write().await;
        let quiz_id = inner.quiz_of_question(question_id).ok_or_else(question_not_found)?;
        inner.ensure_unattempted(quiz_id)?;

        let question = inner.build_question(quiz_id, Some(question_id), input);
        let quiz = inner.quizzes.get_mut(&quiz_id).ok_or_else(quiz_not_found)?;
        let slot = quiz
            .questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .ok_or_else(question_not_found)?;
        *slot = question.clone();
        quiz.updated_at = Utc::now();
        Ok(question)
    }

    async fn delete_question(&self, question_id: i64) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let Some(quiz_id) = inner.quiz_of_question(question_id) else {
            return Ok(false);
        };
        inner.ensure_unattempted(quiz_id)?;

        let quiz = inner.quizzes.get_mut(&quiz_id).ok_or_else(quiz_not_found)?;
        if quiz.questions.len() <= 1 {
            return Err(last_question());
        }
        quiz.questions.retain(|q| q.id != question_id);
        quiz.updated_at = Utc::now();
        Ok(true)
    }

    async fn find_question_quiz(&self, question_id: i64) -> Result<Option<i64>, AppError> {
        Ok(self.inner.read().await.quiz_of_question(question_id))
    }

    async fn create_attempt(&self, attempt: &Attempt) -> Result<Attempt, AppError> {
        let mut inner = self.inner.write().await;
        if let Some(open) = inner.attempts.values().find(|a| {
            a.quiz_id == attempt.quiz_id
                && a.user_id == attempt.user_id
                && a.status == AttemptStatus::InProgress
        }) {
            return Ok(open.clone());
        }

        let max_score = inner
            .quizzes
            .get(&attempt.quiz_id)
            .map(Quiz::max_score)
            .ok_or_else(quiz_not_found)?;

        let mut stored = attempt.clone();
        stored.id = inner.next_id();
        stored.max_score = max_score;
        inner.attempts.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_in_progress_attempt(&self, quiz_id: i64, user_id: i64) -> Result<Option<Attempt>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .attempts
            .values()
            .find(|a| a.quiz_id == quiz_id && a.user_id == user_id && a.status == AttemptStatus::InProgress)
            .cloned())
    }

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<Attempt>, AppError> {
        Ok(self.inner.read().await.attempts.get(&attempt_id).cloned())
    }

    async fn list_attempts(&self, quiz_id: i64, user_id: i64) -> Result<Vec<Attempt>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .attempts
            .values()
            .rev()
            .filter(|a| a.quiz_id == quiz_id && a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_attempts(&self, quiz_id: i64) -> Result<i64, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.attempts.values().filter(|a| a.quiz_id == quiz_id).count() as i64)
    }

    async fn finalize_attempt(&self, attempt: &Attempt) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .attempts
            .get_mut(&attempt.id)
            .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

        if stored.status != AttemptStatus::InProgress {
            return Err(AttemptError::AttemptNotInProgress {
                attempt_id: stored.id,
                status: stored.status,
            }
            .into());
        }

        *stored = attempt.clone();
        Ok(())
    }

    async fn create_feedback(
        &self,
        quiz_id: i64,
        user_id: i64,
        input: &FeedbackRequest,
    ) -> Result<Feedback, AppError> {
        let mut inner = self.inner.write().await;
        if inner
            .feedback
            .iter()
            .any(|f| f.quiz_id == quiz_id && f.user_id == user_id)
        {
            return Err(AppError::Conflict("Feedback already submitted for this quiz".to_string()));
        }

        let feedback = Feedback {
            id: inner.next_id(),
            quiz_id,
            user_id,
            rating: input.rating,
            comment: input.comment.clone(),
            question_feedback: input.question_feedback.clone(),
            created_at: Utc::now(),
        };
        inner.feedback.push(feedback.clone());
        Ok(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Difficulty, OptionInput, QuestionType};

    fn input() -> CreateQuizRequest {
        CreateQuizRequest {
            title: "Cells".to_string(),
            description: None,
            document_id: 9,
            questions: vec![QuestionInput {
                text: "Is the nucleus an organelle?".to_string(),
                question_type: QuestionType::TrueFalse,
                options: vec![
                    OptionInput { text: "True".to_string(), is_correct: true },
                    OptionInput { text: "False".to_string(), is_correct: false },
                ],
                difficulty: Difficulty::Easy,
                points: 2,
                bloom_level: None,
                explanation: None,
                source_text: None,
                source_location: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_ids_are_unique_across_options() {
        let store = MemoryStore::new();
        let quiz = store.create_quiz(1, &input()).await.unwrap();
        let q = &quiz.questions[0];

        assert_ne!(q.options[0].id, q.options[1].id);
        assert_ne!(q.id, quiz.id);
        assert_eq!(store.find_question_quiz(q.id).await.unwrap(), Some(quiz.id));
    }

    #[tokio::test]
    async fn test_one_open_attempt_per_user_and_quiz() {
        let store = MemoryStore::new();
        let quiz = store.create_quiz(1, &input()).await.unwrap();
        let first = store.create_attempt(&Attempt::start(&quiz, 2, Utc::now())).await.unwrap();
        let second = store.create_attempt(&Attempt::start(&quiz, 2, Utc::now())).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.count_attempts(quiz.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_finalize_only_once() {
        let store = MemoryStore::new();
        let quiz = store.create_quiz(1, &input()).await.unwrap();
        let mut attempt = store.create_attempt(&Attempt::start(&quiz, 2, Utc::now())).await.unwrap();
        attempt.abandon(Utc::now()).unwrap();

        store.finalize_attempt(&attempt).await.unwrap();
        let err = store.finalize_attempt(&attempt).await.unwrap_err();
        assert_eq!(err.code(), "ATTEMPT_NOT_IN_PROGRESS");
    }

    #[tokio::test]
    async fn test_question_writes_conflict_once_attempted() {
        let store = MemoryStore::new();
        let quiz = store.create_quiz(1, &input()).await.unwrap();
        let question_id = quiz.questions[0].id;
        store.add_question(quiz.id, &input().questions[0]).await.unwrap();
        store.create_attempt(&Attempt::start(&quiz, 2, Utc::now())).await.unwrap();

        let mut edit = input().questions[0].clone();
        edit.points = 50;
        let err = store.update_question(question_id, &edit).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = store.add_question(quiz.id, &edit).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = store.delete_question(question_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let replace = UpdateQuizRequest {
            title: None,
            description: None,
            questions: Some(vec![edit]),
        };
        let err = store.update_quiz(quiz.id, &replace).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let stored = store.get_quiz(quiz.id).await.unwrap().unwrap();
        assert_eq!(stored.max_score(), 4);
    }

    #[tokio::test]
    async fn test_last_question_is_kept() {
        let store = MemoryStore::new();
        let quiz = store.create_quiz(1, &input()).await.unwrap();

        let err = store.delete_question(quiz.questions[0].id).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
        assert_eq!(store.get_quiz(quiz.id).await.unwrap().unwrap().questions.len(), 1);
    }

    #[tokio::test]
    async fn test_attempt_max_score_comes_from_stored_quiz() {
        let store = MemoryStore::new();
        let stale = store.create_quiz(1, &input()).await.unwrap();
        let mut edit = input().questions[0].clone();
        edit.points = 40;
        store.update_question(stale.questions[0].id, &edit).await.unwrap();

        let attempt = store.create_attempt(&Attempt::start(&stale, 2, Utc::now())).await.unwrap();
        assert_eq!(Attempt::start(&stale, 2, Utc::now()).max_score, 2);
        assert_eq!(attempt.max_score, 40);
    }

    #[tokio::test]
    async fn test_duplicate_feedback_conflicts() {
        let store = MemoryStore::new();
        let req = FeedbackRequest {
            rating: 4,
            comment: None,
            question_feedback: vec![],
        };
        store.create_feedback(1, 2, &req).await.unwrap();
        let err = store.create_feedback(1, 2, &req).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
