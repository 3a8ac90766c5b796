// src/services/attempts.rs

use chrono::Utc;
use tracing::Span;

use crate::{
    error::AppError,
    models::{
        attempt::{AnswerSubmission, Attempt},
        quiz::Quiz,
    },
    store::DynStore,
};

/// Runs attempts through their lifecycle against the store.
///
/// Log events are emitted under the span handed to `new`, so callers decide
/// where attempt logs go.
#[derive(Clone)]
pub struct AttemptService {
    store: DynStore,
    log: Span,
}

impl AttemptService {
    pub fn new(store: DynStore, log: Span) -> Self {
        Self { store, log }
    }

    /// Returns the caller's open attempt on the quiz, opening one if needed.
    pub async fn start(&self, quiz_id: i64, user_id: i64) -> Result<Attempt, AppError> {
        let quiz = self.load_quiz(quiz_id).await?;
        self.open_attempt(&quiz, user_id).await
    }

    /// Scores a full answer set and completes the caller's open attempt.
    pub async fn submit(
        &self,
        quiz_id: i64,
        user_id: i64,
        answers: &[AnswerSubmission],
    ) -> Result<Attempt, AppError> {
        let mut attempt = {
            let quiz = self.load_quiz(quiz_id).await?;
            self.open_attempt(&quiz, user_id).await?
        };
        // With an attempt open the questions are frozen, so this copy is final.
        let quiz = self.load_quiz(quiz_id).await?;

        if let Err(e) = attempt.submit_answers(&quiz, answers, Utc::now()) {
            tracing::warn!(parent: &self.log, attempt_id = attempt.id, "Rejected submission: {}", e);
            return Err(e.into());
        }

        self.store.finalize_attempt(&attempt).await?;

        tracing::info!(
            parent: &self.log,
            attempt_id = attempt.id,
            quiz_id,
            user_id,
            score = attempt.score,
            max_score = attempt.max_score,
            manual_grading = attempt.needs_manual_grading(),
            "Attempt completed"
        );
        Ok(attempt)
    }

    /// Abandons one of the caller's attempts.
    pub async fn abandon(&self, attempt_id: i64, user_id: i64) -> Result<Attempt, AppError> {
        let mut attempt = self
            .store
            .get_attempt(attempt_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

        attempt.abandon(Utc::now())?;
        self.store.finalize_attempt(&attempt).await?;

        tracing::info!(parent: &self.log, attempt_id, user_id, "Attempt abandoned");
        Ok(attempt)
    }

    async fn load_quiz(&self, quiz_id: i64) -> Result<Quiz, AppError> {
        self.store
            .get_quiz(quiz_id)
            .await?
            .ok_or(AppError::NotFound("Quiz not found".to_string()))
    }

    async fn open_attempt(&self, quiz: &Quiz, user_id: i64) -> Result<Attempt, AppError> {
        if let Some(open) = self.store.find_in_progress_attempt(quiz.id, user_id).await? {
            return Ok(open);
        }

        let attempt = self
            .store
            .create_attempt(&Attempt::start(quiz, user_id, Utc::now()))
            .await?;
        tracing::debug!(parent: &self.log, attempt_id = attempt.id, quiz_id = quiz.id, user_id, "Attempt started");
        Ok(attempt)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        models::{
            attempt::AttemptStatus,
            question::{Difficulty, OptionInput, QuestionInput, QuestionType},
            quiz::CreateQuizRequest,
        },
        store::{MemoryStore, Store},
    };

    async fn setup() -> (AttemptService, DynStore, Quiz) {
        let store: DynStore = Arc::new(MemoryStore::new());
        let quiz = store
            .create_quiz(
                1,
                &CreateQuizRequest {
                    title: "Rivers".to_string(),
                    description: None,
                    document_id: 1,
                    questions: vec![
                        QuestionInput {
                            text: "Which river is longest?".to_string(),
                            question_type: QuestionType::MultipleChoice,
                            options: vec![
                                OptionInput { text: "Nile".to_string(), is_correct: true },
                                OptionInput { text: "Seine".to_string(), is_correct: false },
                            ],
                            difficulty: Difficulty::Medium,
                            points: 5,
                            bloom_level: None,
                            explanation: None,
                            source_text: None,
                            source_location: None,
                        },
                        QuestionInput {
                            text: "The Thames flows through London.".to_string(),
                            question_type: QuestionType::TrueFalse,
                            options: vec![
                                OptionInput { text: "True".to_string(), is_correct: true },
                                OptionInput { text: "False".to_string(), is_correct: false },
                            ],
                            difficulty: Difficulty::Easy,
                            points: 5,
                            bloom_level: None,
                            explanation: None,
                            source_text: None,
                            source_location: None,
                        },
                    ],
                },
            )
            .await
            .unwrap();

        let service = AttemptService::new(store.clone(), tracing::info_span!("attempts"));
        (service, store, quiz)
    }

    fn pick(quiz: &Quiz, question: usize, option: usize) -> AnswerSubmission {
        let q = &quiz.questions[question];
        AnswerSubmission {
            question_id: q.id,
            selected_options: vec![q.options[option].id],
            text_answer: None,
        }
    }

    #[tokio::test]
    async fn test_submit_scores_and_persists() {
        let (service, store, quiz) = setup().await;

        let attempt = service
            .submit(quiz.id, 2, &[pick(&quiz, 0, 0), pick(&quiz, 1, 1)])
            .await
            .unwrap();

        assert_eq!(attempt.score, 5);
        assert_eq!(attempt.percentage_score, 50);
        assert_eq!(attempt.status, AttemptStatus::Completed);

        let stored = store.get_attempt(attempt.id).await.unwrap().unwrap();
        assert_eq!(stored, attempt);
    }

    #[tokio::test]
    async fn test_start_is_reused_by_submit() {
        let (service, _, quiz) = setup().await;

        let started = service.start(quiz.id, 2).await.unwrap();
        let again = service.start(quiz.id, 2).await.unwrap();
        assert_eq!(started.id, again.id);

        let done = service.submit(quiz.id, 2, &[]).await.unwrap();
        assert_eq!(done.id, started.id);
        assert_eq!(done.score, 0);
        assert_eq!(done.max_score, 10);
    }

    #[tokio::test]
    async fn test_second_writer_gets_not_in_progress() {
        let (service, store, quiz) = setup().await;
        let started = service.start(quiz.id, 2).await.unwrap();

        // Simulate the loser of a double submit: it read the open attempt
        // before the winner finalized it.
        let mut stale = started.clone();
        service.submit(quiz.id, 2, &[pick(&quiz, 0, 0)]).await.unwrap();

        stale.submit_answers(&quiz, &[pick(&quiz, 0, 1)], Utc::now()).unwrap();
        let err = store.finalize_attempt(&stale).await.unwrap_err();
        assert_eq!(err.code(), "ATTEMPT_NOT_IN_PROGRESS");

        let stored = store.get_attempt(started.id).await.unwrap().unwrap();
        assert_eq!(stored.score, 5);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_finalize_once() {
        let (service, store, quiz) = setup().await;
        let started = service.start(quiz.id, 2).await.unwrap();

        // Both writers scored the same open attempt before either finalized it.
        let mut right = started.clone();
        right.submit_answers(&quiz, &[pick(&quiz, 0, 0)], Utc::now()).unwrap();
        let mut wrong = started.clone();
        wrong.submit_answers(&quiz, &[pick(&quiz, 0, 1)], Utc::now()).unwrap();

        let (a, b) = tokio::join!(store.finalize_attempt(&right), store.finalize_attempt(&wrong));

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(loser.code(), "ATTEMPT_NOT_IN_PROGRESS");

        let stored = store.get_attempt(started.id).await.unwrap().unwrap();
        let winner = if results[0].is_ok() { &right } else { &wrong };
        assert_eq!(&stored, winner);
    }

    #[tokio::test]
    async fn test_questions_frozen_once_started() {
        let (service, store, quiz) = setup().await;
        service.start(quiz.id, 2).await.unwrap();

        let question = &quiz.questions[0];
        let edit = QuestionInput {
            text: question.text.clone(),
            question_type: question.question_type,
            options: question
                .options
                .iter()
                .map(|o| OptionInput { text: o.text.clone(), is_correct: o.is_correct })
                .collect(),
            difficulty: question.difficulty,
            points: 100,
            bloom_level: None,
            explanation: None,
            source_text: None,
            source_location: None,
        };
        let err = store.update_question(question.id, &edit).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let done = service.submit(quiz.id, 2, &[pick(&quiz, 0, 0)]).await.unwrap();
        assert_eq!(done.score, 5);
        assert_eq!(done.max_score, 10);
        assert!(done.percentage_score <= 100);
    }

    #[tokio::test]
    async fn test_invalid_reference_keeps_attempt_open() {
        let (service, store, quiz) = setup().await;

        let err = service
            .submit(
                quiz.id,
                2,
                &[AnswerSubmission {
                    question_id: 9_999,
                    selected_options: vec![],
                    text_answer: None,
                }],
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_QUESTION_REFERENCE");

        let open = store.find_in_progress_attempt(quiz.id, 2).await.unwrap();
        assert!(open.is_some());
    }

    #[tokio::test]
    async fn test_abandon_then_submit_opens_new_attempt() {
        let (service, _, quiz) = setup().await;
        let started = service.start(quiz.id, 2).await.unwrap();

        let abandoned = service.abandon(started.id, 2).await.unwrap();
        assert_eq!(abandoned.status, AttemptStatus::Abandoned);

        let err = service.abandon(started.id, 2).await.unwrap_err();
        assert_eq!(err.code(), "ATTEMPT_NOT_IN_PROGRESS");

        let next = service.submit(quiz.id, 2, &[pick(&quiz, 1, 0)]).await.unwrap();
        assert_ne!(next.id, started.id);
    }

    #[tokio::test]
    async fn test_abandon_foreign_attempt_is_not_found() {
        let (service, _, quiz) = setup().await;
        let started = service.start(quiz.id, 2).await.unwrap();

        let err = service.abandon(started.id, 3).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unknown_quiz_is_not_found() {
        let (service, _, _) = setup().await;
        let err = service.submit(424_242, 2, &[]).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
