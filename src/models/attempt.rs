// src/models/attempt.rs

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::quiz::Quiz;
use crate::scoring;

/// Lifecycle state of an attempt. `Completed` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in-progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }

    /// The only allowed moves are in-progress -> completed and in-progress -> abandoned.
    pub fn transition(self, next: AttemptStatus) -> Result<AttemptStatus, AttemptError> {
        match (self, next) {
            (AttemptStatus::InProgress, AttemptStatus::Completed)
            | (AttemptStatus::InProgress, AttemptStatus::Abandoned) => Ok(next),
            (from, to) => Err(AttemptError::InvalidAttemptTransition { from, to }),
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-progress" => Ok(AttemptStatus::InProgress),
            "completed" => Ok(AttemptStatus::Completed),
            "abandoned" => Ok(AttemptStatus::Abandoned),
            other => Err(format!("unknown attempt status '{}'", other)),
        }
    }
}

/// Caller errors raised while scoring or moving an attempt through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// The answer names a question that is not part of the quiz.
    InvalidQuestionReference { question_id: i64 },

    /// The answer selects an option the question does not have.
    InvalidOptionReference { question_id: i64, option_id: i64 },

    /// The attempt already reached a terminal state.
    AttemptNotInProgress { attempt_id: i64, status: AttemptStatus },

    InvalidAttemptTransition { from: AttemptStatus, to: AttemptStatus },
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::InvalidQuestionReference { question_id } => {
                write!(f, "Question {} is not part of this quiz", question_id)
            }
            AttemptError::InvalidOptionReference {
                question_id,
                option_id,
            } => write!(
                f,
                "Option {} does not belong to question {}",
                option_id, question_id
            ),
            AttemptError::AttemptNotInProgress { attempt_id, status } => {
                write!(f, "Attempt {} is already {}", attempt_id, status)
            }
            AttemptError::InvalidAttemptTransition { from, to } => {
                write!(f, "Cannot move attempt from {} to {}", from, to)
            }
        }
    }
}

impl std::error::Error for AttemptError {}

/// One answer as submitted by the client.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnswerSubmission {
    pub question_id: i64,
    #[serde(default)]
    pub selected_options: Vec<i64>,
    #[validate(length(max = 1000, message = "Text answer cannot be more than 1000 characters."))]
    pub text_answer: Option<String>,
}

/// DTO for `POST /api/quizzes/{id}/attempt`.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: Vec<AnswerSubmission>,
}

/// A scored answer stored on the attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: i64,
    /// Selected option ids, sorted and deduplicated.
    pub selected_options: Vec<i64>,
    pub text_answer: Option<String>,
    pub is_correct: bool,
    pub points: i32,
    /// Set for short answers, which have no automatic grader.
    pub needs_manual_grading: bool,
}

/// One user's run through a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub answers: Vec<AnswerRecord>,
    pub score: i32,
    pub max_score: i32,
    pub percentage_score: i32,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds between `started_at` and `completed_at`.
    pub time_spent: Option<i64>,
}

impl Attempt {
    /// Opens a new attempt. The id is assigned by the store.
    pub fn start(quiz: &Quiz, user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            quiz_id: quiz.id,
            user_id,
            answers: Vec::new(),
            score: 0,
            max_score: quiz.max_score(),
            percentage_score: 0,
            status: AttemptStatus::InProgress,
            started_at: now,
            completed_at: None,
            time_spent: None,
        }
    }

    /// Scores the full answer set and completes the attempt.
    ///
    /// Submissions are deduplicated by question id and the last one wins.
    /// Stored answers follow the quiz's question order. Questions left
    /// unanswered score nothing but still count toward `max_score`, which is
    /// recomputed from `quiz` so score and maximum always describe the same
    /// questions.
    /// On error the attempt is left untouched.
    pub fn submit_answers(
        &mut self,
        quiz: &Quiz,
        submissions: &[AnswerSubmission],
        now: DateTime<Utc>,
    ) -> Result<(), AttemptError> {
        self.ensure_in_progress()?;
        let next = self.status.transition(AttemptStatus::Completed)?;

        let mut latest: HashMap<i64, AnswerRecord> = HashMap::with_capacity(submissions.len());
        for submission in submissions {
            let question = quiz.question(submission.question_id).ok_or(
                AttemptError::InvalidQuestionReference {
                    question_id: submission.question_id,
                },
            )?;
            let evaluation = scoring::evaluate(question, submission)?;

            latest.insert(
                question.id,
                AnswerRecord {
                    question_id: question.id,
                    selected_options: evaluation.selected_options,
                    text_answer: submission.text_answer.clone(),
                    is_correct: evaluation.is_correct,
                    points: evaluation.points,
                    needs_manual_grading: evaluation.needs_manual_grading,
                },
            );
        }

        let answers: Vec<AnswerRecord> = quiz
            .questions
            .iter()
            .filter_map(|q| latest.remove(&q.id))
            .collect();

        self.max_score = quiz.max_score();
        self.score = answers.iter().map(|a| a.points).sum();
        self.answers = answers;
        self.status = next;
        self.finish(now);
        self.percentage_score = percentage(self.score, self.max_score);
        Ok(())
    }

    /// Gives up on the attempt. Score and percentage are kept as they are.
    pub fn abandon(&mut self, now: DateTime<Utc>) -> Result<(), AttemptError> {
        self.ensure_in_progress()?;
        self.status = self.status.transition(AttemptStatus::Abandoned)?;
        self.finish(now);
        Ok(())
    }

    pub fn needs_manual_grading(&self) -> bool {
        self.answers.iter().any(|a| a.needs_manual_grading)
    }

    fn ensure_in_progress(&self) -> Result<(), AttemptError> {
        if self.status.is_terminal() {
            return Err(AttemptError::AttemptNotInProgress {
                attempt_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        self.completed_at = Some(now);
        self.time_spent = Some(seconds_between(self.started_at, now));
    }
}

/// `round(100 * score / max_score)`, or 0 when there is nothing to score.
pub fn percentage(score: i32, max_score: i32) -> i32 {
    if max_score <= 0 || score <= 0 {
        return 0;
    }
    let (score, max) = (i64::from(score), i64::from(max_score));
    ((score * 200 + max) / (max * 2)) as i32
}

/// Whole seconds from `start` to `end`, rounded half up. Clock skew clamps to 0.
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds().max(0);
    (millis + 500) / 1000
}

/// Attempt as returned over HTTP.
#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub needs_manual_grading: bool,
}

impl From<Attempt> for AttemptResponse {
    fn from(attempt: Attempt) -> Self {
        let needs_manual_grading = attempt.needs_manual_grading();
        Self {
            attempt,
            needs_manual_grading,
        }
    }
}
