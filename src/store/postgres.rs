// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction, types::Json};

use super::{Store, last_question, questions_frozen};
use crate::{
    error::AppError,
    models::{
        attempt::{AnswerRecord, Attempt, AttemptError, AttemptStatus},
        feedback::{Feedback, FeedbackRequest, QuestionFeedback},
        question::{Question, QuestionInput, QuestionOption},
        quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
        user::User,
    },
};

/// Postgres-backed store. Attempt finalization is a conditional update on
/// `status = 'in-progress'`, which serializes concurrent submissions.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct QuizRow {
    id: i64,
    user_id: i64,
    document_id: i64,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    quiz_id: i64,
    question_type: String,
    text: String,
    difficulty: String,
    points: i32,
    bloom_level: Option<String>,
    explanation: Option<String>,
    source_text: Option<String>,
    source_location: Option<String>,
}

#[derive(FromRow)]
struct OptionRow {
    id: i64,
    question_id: i64,
    text: String,
    is_correct: bool,
}

#[derive(FromRow)]
struct AttemptRow {
    id: i64,
    quiz_id: i64,
    user_id: i64,
    answers: Json<Vec<AnswerRecord>>,
    score: i32,
    max_score: i32,
    percentage_score: i32,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    time_spent: Option<i64>,
}

#[derive(FromRow)]
struct FeedbackRow {
    id: i64,
    quiz_id: i64,
    user_id: i64,
    rating: i32,
    comment: Option<String>,
    question_feedback: Json<Vec<QuestionFeedback>>,
    created_at: DateTime<Utc>,
}

const QUIZ_COLUMNS: &str =
    "id, user_id, document_id, title, description, created_at, updated_at";

const QUESTION_COLUMNS: &str = r#"
    id, quiz_id, type AS question_type, text, difficulty, points,
    bloom_level, explanation, source_text, source_location
"#;

const ATTEMPT_COLUMNS: &str = r#"
    id, quiz_id, user_id, answers, score, max_score, percentage_score,
    status, started_at, completed_at, time_spent
"#;

fn corrupt(what: &str, err: String) -> AppError {
    AppError::InternalServerError(format!("Corrupt {} row: {}", what, err))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

impl QuestionRow {
    fn into_question(self, options: Vec<QuestionOption>) -> Result<Question, AppError> {
        Ok(Question {
            id: self.id,
            quiz_id: self.quiz_id,
            question_type: self.question_type.parse().map_err(|e| corrupt("question", e))?,
            text: self.text,
            options,
            difficulty: self.difficulty.parse().map_err(|e| corrupt("question", e))?,
            points: self.points,
            bloom_level: self
                .bloom_level
                .map(|b| b.parse())
                .transpose()
                .map_err(|e| corrupt("question", e))?,
            explanation: self.explanation,
            source_text: self.source_text,
            source_location: self.source_location,
        })
    }
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = AppError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(Attempt {
            id: row.id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            answers: row.answers.0,
            score: row.score,
            max_score: row.max_score,
            percentage_score: row.percentage_score,
            status: row.status.parse().map_err(|e| corrupt("attempt", e))?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            time_spent: row.time_spent,
        })
    }
}

impl From<FeedbackRow> for Feedback {
    fn from(row: FeedbackRow) -> Self {
        Feedback {
            id: row.id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            rating: row.rating,
            comment: row.comment,
            question_feedback: row.question_feedback.0,
            created_at: row.created_at,
        }
    }
}

impl PgStore {
    /// Loads questions with their options for the given quizzes, keyed by quiz id.
    async fn load_questions(&self, quiz_ids: &[i64]) -> Result<HashMap<i64, Vec<Question>>, AppError> {
        let rows: Vec<QuestionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM questions WHERE quiz_id = ANY($1) ORDER BY quiz_id, position, id",
            QUESTION_COLUMNS
        ))
        .bind(quiz_ids)
        .fetch_all(&self.pool)
        .await?;

        let question_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let option_rows: Vec<OptionRow> = sqlx::query_as(
            r#"
            SELECT id, question_id, text, is_correct
            FROM question_options
            WHERE question_id = ANY($1)
            ORDER BY question_id, position, id
            "#,
        )
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut options: HashMap<i64, Vec<QuestionOption>> = HashMap::new();
        for o in option_rows {
            options.entry(o.question_id).or_default().push(QuestionOption {
                id: o.id,
                text: o.text,
                is_correct: o.is_correct,
            });
        }

        let mut by_quiz: HashMap<i64, Vec<Question>> = HashMap::new();
        for row in rows {
            let quiz_id = row.quiz_id;
            let question_options = options.remove(&row.id).unwrap_or_default();
            by_quiz
                .entry(quiz_id)
                .or_default()
                .push(row.into_question(question_options)?);
        }
        Ok(by_quiz)
    }

    async fn assemble(&self, rows: Vec<QuizRow>) -> Result<Vec<Quiz>, AppError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut questions = self.load_questions(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| Quiz {
                questions: questions.remove(&row.id).unwrap_or_default(),
                id: row.id,
                user_id: row.user_id,
                document_id: row.document_id,
                title: row.title,
                description: row.description,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
            .collect())
    }

    async fn insert_question(
        tx: &mut Transaction<'_, Postgres>,
        quiz_id: i64,
        position: i32,
        input: &QuestionInput,
    ) -> Result<Question, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO questions
                (quiz_id, position, type, text, difficulty, points,
                 bloom_level, explanation, source_text, source_location)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(quiz_id)
        .bind(position)
        .bind(input.question_type.as_str())
        .bind(&input.text)
        .bind(input.difficulty.as_str())
        .bind(input.points)
        .bind(input.bloom_level.map(|b| b.as_str()))
        .bind(&input.explanation)
        .bind(&input.source_text)
        .bind(&input.source_location)
        .fetch_one(&mut **tx)
        .await?;

        let options = Self::insert_options(tx, id, input).await?;

        Ok(Question {
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
        })
    }

    async fn insert_options(
        tx: &mut Transaction<'_, Postgres>,
        question_id: i64,
        input: &QuestionInput,
    ) -> Result<Vec<QuestionOption>, AppError> {
        let mut options = Vec::with_capacity(input.options.len());
        for (position, option) in input.options.iter().enumerate() {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO question_options (question_id, position, text, is_correct)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(question_id)
            .bind(position as i32)
            .bind(&option.text)
            .bind(option.is_correct)
            .fetch_one(&mut **tx)
            .await?;

            options.push(QuestionOption {
                id,
                text: option.text.clone(),
                is_correct: option.is_correct,
            });
        }
        Ok(options)
    }

    /// Row-locks the quiz for the rest of the transaction. Question writes and
    /// attempt creation both take this lock, so the attempts check below
    /// cannot interleave with a new attempt.
    async fn lock_quiz(tx: &mut Transaction<'_, Postgres>, quiz_id: i64) -> Result<(), AppError> {
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM quizzes WHERE id = $1 FOR UPDATE")
            .bind(quiz_id)
            .fetch_optional(&mut **tx)
            .await?;
        match locked {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("Quiz not found".to_string())),
        }
    }

    async fn ensure_unattempted(tx: &mut Transaction<'_, Postgres>, quiz_id: i64) -> Result<(), AppError> {
        let attempted: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM quiz_attempts WHERE quiz_id = $1)")
                .bind(quiz_id)
                .fetch_one(&mut **tx)
                .await?;
        if attempted {
            return Err(questions_frozen());
        }
        Ok(())
    }

    async fn question_quiz(tx: &mut Transaction<'_, Postgres>, question_id: i64) -> Result<Option<i64>, AppError> {
        let quiz_id = sqlx::query_scalar("SELECT quiz_id FROM questions WHERE id = $1")
            .bind(question_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(quiz_id)
    }

    async fn touch_quiz(tx: &mut Transaction<'_, Postgres>, quiz_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE quizzes SET updated_at = NOW() WHERE id = $1")
            .bind(quiz_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password)
            VALUES ($1, $2)
            RETURNING id, username, password, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to register user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_quiz(&self, user_id: i64, input: &CreateQuizRequest) -> Result<Quiz, AppError> {
        let mut tx = self.pool.begin().await?;

        let row: QuizRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO quizzes (user_id, document_id, title, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            QUIZ_COLUMNS
        ))
        .bind(user_id)
        .bind(input.document_id)
        .bind(&input.title)
        .bind(&input.description)
        .fetch_one(&mut *tx)
        .await?;

        let mut questions = Vec::with_capacity(input.questions.len());
        for (position, q) in input.questions.iter().enumerate() {
            questions.push(Self::insert_question(&mut tx, row.id, position as i32, q).await?);
        }

        tx.commit().await?;

        Ok(Quiz {
            id: row.id,
            user_id: row.user_id,
            document_id: row.document_id,
            title: row.title,
            description: row.description,
            questions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn get_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError> {
        let row: Option<QuizRow> = sqlx::query_as(&format!(
            "SELECT {} FROM quizzes WHERE id = $1",
            QUIZ_COLUMNS
        ))
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_quizzes(&self, user_id: i64) -> Result<Vec<Quiz>, AppError> {
        let rows: Vec<QuizRow> = sqlx::query_as(&format!(
            "SELECT {} FROM quizzes WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            QUIZ_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.assemble(rows).await
    }

    async fn update_quiz(&self, quiz_id: i64, input: &UpdateQuizRequest) -> Result<Quiz, AppError> {
        let mut tx = self.pool.begin().await?;

        Self::lock_quiz(&mut tx, quiz_id).await?;
        if input.questions.is_some() {
            Self::ensure_unattempted(&mut tx, quiz_id).await?;
        }

        sqlx::query(
            r#"
            UPDATE quizzes SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(quiz_id)
        .bind(&input.title)
        .bind(&input.description)
        .execute(&mut *tx)
        .await?;

        if let Some(questions) = &input.questions {
            sqlx::query("DELETE FROM questions WHERE quiz_id = $1")
                .bind(quiz_id)
                .execute(&mut *tx)
                .await?;
            for (position, q) in questions.iter().enumerate() {
                Self::insert_question(&mut tx, quiz_id, position as i32, q).await?;
            }
        }

        tx.commit().await?;

        self.get_quiz(quiz_id)
            .await?
            .ok_or(AppError::NotFound("Quiz not found".to_string()))
    }

    async fn delete_quiz(&self, quiz_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_question(&self, quiz_id: i64, input: &QuestionInput) -> Result<Question, AppError> {
        let mut tx = self.pool.begin().await?;

        // The lock also gives concurrent appends distinct positions.
        Self::lock_quiz(&mut tx, quiz_id).await?;
        Self::ensure_unattempted(&mut tx, quiz_id).await?;

        let position: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM questions WHERE quiz_id = $1",
        )
        .bind(quiz_id)
        .fetch_one(&mut *tx)
        .await?;

        let question = Self::insert_question(&mut tx, quiz_id, position, input).await?;
        Self::touch_quiz(&mut tx, quiz_id).await?;

        tx.commit().await?;
        Ok(question)
    }

    async fn update_question(&self, question_id: i64, input: &QuestionInput) -> Result<Question, AppError> {
        let mut tx = self.pool.begin().await?;

        let quiz_id = Self::question_quiz(&mut tx, question_id)
            .await?
            .ok_or(AppError::NotFound("Question not found".to_string()))?;
        Self::lock_quiz(&mut tx, quiz_id).await?;
        Self::ensure_unattempted(&mut tx, quiz_id).await?;

        let updated = sqlx::query(
            r#"
            UPDATE questions SET
                type = $2, text = $3, difficulty = $4, points = $5,
                bloom_level = $6, explanation = $7, source_text = $8, source_location = $9
            WHERE id = $1
            "#,
        )
        .bind(question_id)
        .bind(input.question_type.as_str())
        .bind(&input.text)
        .bind(input.difficulty.as_str())
        .bind(input.points)
        .bind(input.bloom_level.map(|b| b.as_str()))
        .bind(&input.explanation)
        .bind(&input.source_text)
        .bind(&input.source_location)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Question not found".to_string()));
        }

        sqlx::query("DELETE FROM question_options WHERE question_id = $1")
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        let options = Self::insert_options(&mut tx, question_id, input).await?;
        Self::touch_quiz(&mut tx, quiz_id).await?;

        tx.commit().await?;

        Ok(Question {
            id: question_id,
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
        })
    }

    async fn delete_question(&self, question_id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(quiz_id) = Self::question_quiz(&mut tx, question_id).await? else {
            return Ok(false);
        };
        Self::lock_quiz(&mut tx, quiz_id).await?;
        Self::ensure_unattempted(&mut tx, quiz_id).await?;

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE quiz_id = $1")
            .bind(quiz_id)
            .fetch_one(&mut *tx)
            .await?;
        if remaining <= 1 {
            return Err(last_question());
        }

        let deleted = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Ok(false);
        }
        Self::touch_quiz(&mut tx, quiz_id).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn find_question_quiz(&self, question_id: i64) -> Result<Option<i64>, AppError> {
        let quiz_id = sqlx::query_scalar("SELECT quiz_id FROM questions WHERE id = $1")
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(quiz_id)
    }

    async fn create_attempt(&self, attempt: &Attempt) -> Result<Attempt, AppError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_quiz(&mut tx, attempt.quiz_id).await?;

        // The partial unique index on in-progress attempts turns a second
        // insert into a no-op; the open attempt is then re-read.
        let inserted: Option<AttemptRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO quiz_attempts
                (quiz_id, user_id, answers, score, max_score, percentage_score, status, started_at)
            VALUES (
                $1, $2, $3, $4,
                (SELECT COALESCE(SUM(points), 0)::INT FROM questions WHERE quiz_id = $1),
                $5, $6, $7
            )
            ON CONFLICT DO NOTHING
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(attempt.quiz_id)
        .bind(attempt.user_id)
        .bind(Json(&attempt.answers))
        .bind(attempt.score)
        .bind(attempt.percentage_score)
        .bind(attempt.status.as_str())
        .bind(attempt.started_at)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        match inserted {
            Some(row) => Attempt::try_from(row),
            None => self
                .find_in_progress_attempt(attempt.quiz_id, attempt.user_id)
                .await?
                .ok_or(AppError::InternalServerError(
                    "Attempt insert conflicted but no open attempt was found".to_string(),
                )),
        }
    }

    async fn find_in_progress_attempt(&self, quiz_id: i64, user_id: i64) -> Result<Option<Attempt>, AppError> {
        let row: Option<AttemptRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM quiz_attempts
            WHERE quiz_id = $1 AND user_id = $2 AND status = 'in-progress'
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(quiz_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<Attempt>, AppError> {
        let row: Option<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {} FROM quiz_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn list_attempts(&self, quiz_id: i64, user_id: i64) -> Result<Vec<Attempt>, AppError> {
        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM quiz_attempts
            WHERE quiz_id = $1 AND user_id = $2
            ORDER BY started_at DESC, id DESC
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(quiz_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Attempt::try_from).collect()
    }

    async fn count_attempts(&self, quiz_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = $1")
            .bind(quiz_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn finalize_attempt(&self, attempt: &Attempt) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE quiz_attempts SET
                answers = $2,
                score = $3,
                max_score = $4,
                percentage_score = $5,
                status = $6,
                completed_at = $7,
                time_spent = $8
            WHERE id = $1 AND status = 'in-progress'
            "#,
        )
        .bind(attempt.id)
        .bind(Json(&attempt.answers))
        .bind(attempt.score)
        .bind(attempt.max_score)
        .bind(attempt.percentage_score)
        .bind(attempt.status.as_str())
        .bind(attempt.completed_at)
        .bind(attempt.time_spent)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Lost the race, or the attempt is gone.
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM quiz_attempts WHERE id = $1")
                .bind(attempt.id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            Some(status) => {
                let status: AttemptStatus = status.parse().map_err(|e| corrupt("attempt", e))?;
                Err(AttemptError::AttemptNotInProgress {
                    attempt_id: attempt.id,
                    status,
                }
                .into())
            }
            None => Err(AppError::NotFound("Attempt not found".to_string())),
        }
    }

    async fn create_feedback(
        &self,
        quiz_id: i64,
        user_id: i64,
        input: &FeedbackRequest,
    ) -> Result<Feedback, AppError> {
        let row: FeedbackRow = sqlx::query_as(
            r#"
            INSERT INTO feedback (quiz_id, user_id, rating, comment, question_feedback)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, quiz_id, user_id, rating, comment, question_feedback, created_at
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .bind(input.rating)
        .bind(&input.comment)
        .bind(Json(&input.question_feedback))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Feedback already submitted for this quiz".to_string())
            } else {
                tracing::error!("Failed to save feedback: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(row.into())
    }
}
