// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Kind of question, which decides how its options are validated and scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::TrueFalse => "true-false",
            QuestionType::ShortAnswer => "short-answer",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple-choice" => Ok(QuestionType::MultipleChoice),
            "true-false" => Ok(QuestionType::TrueFalse),
            "short-answer" => Ok(QuestionType::ShortAnswer),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Cognitive-level tag attached upstream. Carried along, never scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloomLevel {
    Remember,
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

impl BloomLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BloomLevel::Remember => "remember",
            BloomLevel::Understand => "understand",
            BloomLevel::Apply => "apply",
            BloomLevel::Analyze => "analyze",
            BloomLevel::Evaluate => "evaluate",
            BloomLevel::Create => "create",
        }
    }
}

impl FromStr for BloomLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remember" => Ok(BloomLevel::Remember),
            "understand" => Ok(BloomLevel::Understand),
            "apply" => Ok(BloomLevel::Apply),
            "analyze" => Ok(BloomLevel::Analyze),
            "evaluate" => Ok(BloomLevel::Evaluate),
            "create" => Ok(BloomLevel::Create),
            other => Err(format!("unknown bloom level '{}'", other)),
        }
    }
}

/// One selectable answer of a choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
}

/// A stored question. Rows of the 'questions' table joined with 'question_options'.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,

    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    pub text: String,

    /// Ordered options. Empty for short-answer questions.
    pub options: Vec<QuestionOption>,

    pub difficulty: Difficulty,

    /// Points awarded for a correct answer (1..=100).
    pub points: i32,

    pub bloom_level: Option<BloomLevel>,
    pub explanation: Option<String>,
    pub source_text: Option<String>,
    pub source_location: Option<String>,
}

impl Question {
    pub fn option(&self, option_id: i64) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

/// Option as shown to someone taking the quiz.
#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub id: i64,
    pub text: String,
}

/// DTO for sending a question to a quiz taker (excludes correctness and explanation).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub options: Vec<PublicOption>,
    pub difficulty: Difficulty,
    pub points: i32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            question_type: q.question_type,
            text: q.text.clone(),
            options: q
                .options
                .iter()
                .map(|o| PublicOption {
                    id: o.id,
                    text: o.text.clone(),
                })
                .collect(),
            difficulty: q.difficulty,
            points: q.points,
        }
    }
}

/// Option payload inside a question create/update request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OptionInput {
    #[validate(length(min = 1, max = 500, message = "Option text must be between 1 and 500 characters."))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for creating or replacing a question.
/// Option rules per question type live in `validation::validate_question`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 1000, message = "Question text must be between 1 and 1000 characters."))]
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<OptionInput>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = 100, message = "Points must be between 1 and 100."))]
    #[serde(default = "default_points")]
    pub points: i32,
    pub bloom_level: Option<BloomLevel>,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
    #[validate(length(max = 2000))]
    pub source_text: Option<String>,
    #[validate(length(max = 500))]
    pub source_location: Option<String>,
}

impl QuestionInput {
    /// Strips surrounding whitespace from the question and option texts, so
    /// blank text fails the length rules.
    pub fn trim(&mut self) {
        self.text = self.text.trim().to_string();
        for option in &mut self.options {
            option.text = option.text.trim().to_string();
        }
    }
}

fn default_points() -> i32 {
    1
}

/// DTO for adding a question to an existing quiz.
#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub quiz_id: i64,
    #[serde(flatten)]
    pub question: QuestionInput,
}
