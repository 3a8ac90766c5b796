// src/validation.rs

//! Explicit per-entity validation, run before anything is persisted.
//!
//! Field-length and range rules come from the `validator` derives on the
//! request DTOs. Rules that span several fields, like the option layout a
//! question type requires, are checked here by hand. Every function returns
//! a flat list of field-level errors; an empty list means the input is valid.

use std::fmt::Display;

use serde::Serialize;
use validator::{Validate, ValidationErrors};

use crate::{
    error::AppError,
    models::{
        attempt::SubmitAttemptRequest,
        feedback::FeedbackRequest,
        question::{QuestionInput, QuestionType},
        quiz::{CreateQuizRequest, UpdateQuizRequest},
    },
};

/// A single problem with one field of the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Path to the field, e.g. `questions[1].options`.
    pub field: String,
    /// Stable machine-readable code.
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, code: &str, message: &str) -> Self {
        Self {
            field: field.into(),
            code: code.to_string(),
            message: Some(message.to_string()),
        }
    }
}

/// Turns a non-empty error list into `AppError::Validation`.
pub fn ensure_valid(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Runs the derived rules of any DTO.
pub fn check<T: Validate>(value: &T) -> Vec<FieldError> {
    let mut errors = Vec::new();
    collect("", value.validate(), &mut errors);
    errors
}

pub fn validate_question(input: &QuestionInput) -> Vec<FieldError> {
    let mut errors = Vec::new();
    question_into("", input, &mut errors);
    errors
}

pub fn validate_quiz(input: &CreateQuizRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    collect("", input.validate(), &mut errors);
    questions_into(&input.questions, &mut errors);
    errors
}

pub fn validate_quiz_update(input: &UpdateQuizRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    collect("", input.validate(), &mut errors);
    if let Some(questions) = &input.questions {
        questions_into(questions, &mut errors);
    }
    errors
}

pub fn validate_submission(input: &SubmitAttemptRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for (i, answer) in input.answers.iter().enumerate() {
        collect(&format!("answers[{}]", i), answer.validate(), &mut errors);
    }
    errors
}

pub fn validate_feedback(input: &FeedbackRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    collect("", input.validate(), &mut errors);
    for (i, item) in input.question_feedback.iter().enumerate() {
        collect(&format!("question_feedback[{}]", i), item.validate(), &mut errors);
    }
    errors
}

fn questions_into(questions: &[QuestionInput], errors: &mut Vec<FieldError>) {
    if questions.is_empty() {
        errors.push(FieldError::new(
            "questions",
            "quiz_must_have_questions",
            "Quiz must have at least one question.",
        ));
    }
    for (i, question) in questions.iter().enumerate() {
        question_into(&format!("questions[{}]", i), question, errors);
    }
}

fn question_into(prefix: &str, input: &QuestionInput, errors: &mut Vec<FieldError>) {
    collect(prefix, input.validate(), errors);

    let options_field = join(prefix, "options");
    let correct = input.options.iter().filter(|o| o.is_correct).count();

    match input.question_type {
        QuestionType::MultipleChoice => {
            if input.options.len() < 2 {
                errors.push(FieldError::new(
                    &options_field,
                    "too_few_options",
                    "Multiple-choice questions need at least 2 options.",
                ));
            }
            if correct == 0 {
                errors.push(FieldError::new(
                    &options_field,
                    "no_correct_option",
                    "Multiple-choice questions need at least one correct option.",
                ));
            }
        }
        QuestionType::TrueFalse => {
            if input.options.len() != 2 {
                errors.push(FieldError::new(
                    &options_field,
                    "true_false_needs_two_options",
                    "True/false questions need exactly 2 options.",
                ));
            }
            if correct != 1 {
                errors.push(FieldError::new(
                    &options_field,
                    "true_false_needs_one_correct",
                    "True/false questions need exactly one correct option.",
                ));
            }
        }
        QuestionType::ShortAnswer => {
            if !input.options.is_empty() {
                errors.push(FieldError::new(
                    &options_field,
                    "short_answer_has_no_options",
                    "Short-answer questions cannot have options.",
                ));
            }
        }
    }

    for (i, option) in input.options.iter().enumerate() {
        collect(&format!("{}[{}]", options_field, i), option.validate(), errors);
    }
}

fn collect(prefix: &str, result: Result<(), ValidationErrors>, out: &mut Vec<FieldError>) {
    let Err(errors) = result else {
        return;
    };

    let mut found: Vec<FieldError> = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        for err in field_errors {
            found.push(FieldError {
                field: join(prefix, &field),
                code: err.code.to_string(),
                message: err.message.as_ref().map(|m| m.to_string()),
            });
        }
    }
    found.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.code.cmp(&b.code)));
    out.extend(found);
}

fn join(prefix: &str, field: impl Display) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        attempt::AnswerSubmission,
        question::{Difficulty, OptionInput},
    };

    fn option(text: &str, is_correct: bool) -> OptionInput {
        OptionInput {
            text: text.to_string(),
            is_correct,
        }
    }

    fn question(kind: QuestionType, options: Vec<OptionInput>) -> QuestionInput {
        QuestionInput {
            text: "What is the capital of France?".to_string(),
            question_type: kind,
            options,
            difficulty: Difficulty::Easy,
            points: 5,
            bloom_level: None,
            explanation: None,
            source_text: None,
            source_location: None,
        }
    }

    fn codes(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.code.as_str()).collect()
    }

    #[test]
    fn test_valid_multiple_choice() {
        let q = question(
            QuestionType::MultipleChoice,
            vec![option("Paris", true), option("Lyon", false)],
        );
        assert!(validate_question(&q).is_empty());
    }

    #[test]
    fn test_multiple_choice_needs_two_options_and_a_correct_one() {
        let q = question(QuestionType::MultipleChoice, vec![option("Paris", false)]);
        let errors = validate_question(&q);
        assert_eq!(codes(&errors), vec!["too_few_options", "no_correct_option"]);
        assert!(errors.iter().all(|e| e.field == "options"));
    }

    #[test]
    fn test_true_false_needs_exactly_one_correct() {
        let q = question(
            QuestionType::TrueFalse,
            vec![option("True", true), option("False", true)],
        );
        assert_eq!(codes(&validate_question(&q)), vec!["true_false_needs_one_correct"]);

        let q = question(
            QuestionType::TrueFalse,
            vec![option("True", true), option("False", false), option("Maybe", false)],
        );
        assert_eq!(codes(&validate_question(&q)), vec!["true_false_needs_two_options"]);
    }

    #[test]
    fn test_short_answer_rejects_options() {
        let q = question(QuestionType::ShortAnswer, vec![option("Paris", true)]);
        assert_eq!(codes(&validate_question(&q)), vec!["short_answer_has_no_options"]);

        let q = question(QuestionType::ShortAnswer, vec![]);
        assert!(validate_question(&q).is_empty());
    }

    #[test]
    fn test_points_and_text_bounds() {
        let mut q = question(QuestionType::ShortAnswer, vec![]);
        q.points = 0;
        q.text = String::new();
        let errors = validate_question(&q);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["points", "text"]);

        q.points = 101;
        q.text = "ok".to_string();
        assert_eq!(validate_question(&q).len(), 1);
    }

    #[test]
    fn test_whitespace_only_text_is_blank_after_trim() {
        let mut q = question(
            QuestionType::MultipleChoice,
            vec![option("  Paris ", true), option("   ", false)],
        );
        q.text = " \t ".to_string();
        q.trim();

        let errors = validate_question(&q);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["text", "options[1].text"]);
        assert_eq!(q.options[0].text, "Paris");
    }

    #[test]
    fn test_quiz_paths_are_indexed() {
        let quiz = CreateQuizRequest {
            title: "Geography".to_string(),
            description: None,
            document_id: 1,
            questions: vec![
                question(QuestionType::ShortAnswer, vec![]),
                question(
                    QuestionType::MultipleChoice,
                    vec![option("", true), option("Lyon", false)],
                ),
            ],
        };
        let errors = validate_quiz(&quiz);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "questions[1].options[0].text");
    }

    #[test]
    fn test_empty_quiz_is_rejected() {
        let quiz = CreateQuizRequest {
            title: String::new(),
            description: None,
            document_id: 1,
            questions: vec![],
        };
        let errors = validate_quiz(&quiz);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "questions"]);
    }

    #[test]
    fn test_long_text_answer_is_rejected() {
        let req = SubmitAttemptRequest {
            answers: vec![AnswerSubmission {
                question_id: 1,
                selected_options: vec![],
                text_answer: Some("x".repeat(1001)),
            }],
        };
        let errors = validate_submission(&req);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "answers[0].text_answer");
    }

    #[test]
    fn test_feedback_rating_range() {
        let req = FeedbackRequest {
            rating: 6,
            comment: None,
            question_feedback: vec![],
        };
        assert_eq!(validate_feedback(&req)[0].field, "rating");
    }
}
