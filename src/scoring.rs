// src/scoring.rs

//! Correctness and points for a single submitted answer.

use std::collections::BTreeSet;

use crate::models::{
    attempt::{AnswerSubmission, AttemptError},
    question::{Question, QuestionType},
};

/// Outcome of scoring one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub is_correct: bool,
    pub points: i32,
    pub needs_manual_grading: bool,
    /// Submitted option ids, sorted and deduplicated.
    pub selected_options: Vec<i64>,
}

/// Scores `submission` against `question`.
///
/// Choice questions are correct only when the selected set equals the set of
/// correct options exactly. There is no partial credit. Short answers are
/// never auto-graded: they score 0 and are flagged for manual grading when
/// some text was given.
pub fn evaluate(question: &Question, submission: &AnswerSubmission) -> Result<Evaluation, AttemptError> {
    let selected: BTreeSet<i64> = submission.selected_options.iter().copied().collect();

    if let Some(&option_id) = selected.iter().find(|id| question.option(**id).is_none()) {
        return Err(AttemptError::InvalidOptionReference {
            question_id: question.id,
            option_id,
        });
    }

    let selected_options: Vec<i64> = selected.iter().copied().collect();

    match question.question_type {
        QuestionType::MultipleChoice | QuestionType::TrueFalse => {
            let correct: BTreeSet<i64> = question
                .options
                .iter()
                .filter(|o| o.is_correct)
                .map(|o| o.id)
                .collect();
            let is_correct = !correct.is_empty() && selected == correct;

            Ok(Evaluation {
                is_correct,
                points: if is_correct { question.points } else { 0 },
                needs_manual_grading: false,
                selected_options,
            })
        }
        QuestionType::ShortAnswer => {
            let answered = submission
                .text_answer
                .as_deref()
                .is_some_and(|text| !text.trim().is_empty());

            Ok(Evaluation {
                is_correct: false,
                points: 0,
                needs_manual_grading: answered,
                selected_options,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Difficulty, QuestionOption};

    fn question(kind: QuestionType, options: &[(i64, bool)]) -> Question {
        Question {
            id: 1,
            quiz_id: 1,
            question_type: kind,
            text: "Which?".to_string(),
            options: options
                .iter()
                .map(|(id, is_correct)| QuestionOption {
                    id: *id,
                    text: format!("Option {}", id),
                    is_correct: *is_correct,
                })
                .collect(),
            difficulty: Difficulty::Easy,
            points: 5,
            bloom_level: None,
            explanation: None,
            source_text: None,
            source_location: None,
        }
    }

    fn pick(ids: &[i64]) -> AnswerSubmission {
        AnswerSubmission {
            question_id: 1,
            selected_options: ids.to_vec(),
            text_answer: None,
        }
    }

    // Options A(correct)=1, B=2, C=3.
    fn abc() -> Question {
        question(QuestionType::MultipleChoice, &[(1, true), (2, false), (3, false)])
    }

    #[test]
    fn test_multiple_choice_exact_set_is_correct() {
        let eval = evaluate(&abc(), &pick(&[1])).unwrap();
        assert!(eval.is_correct);
        assert_eq!(eval.points, 5);
        assert!(!eval.needs_manual_grading);
    }

    #[test]
    fn test_multiple_choice_superset_is_wrong() {
        let eval = evaluate(&abc(), &pick(&[1, 2])).unwrap();
        assert!(!eval.is_correct);
        assert_eq!(eval.points, 0);
    }

    #[test]
    fn test_multiple_choice_subset_is_wrong() {
        let q = question(QuestionType::MultipleChoice, &[(1, true), (2, true), (3, false)]);
        assert!(!evaluate(&q, &pick(&[2])).unwrap().is_correct);
        assert!(!evaluate(&q, &pick(&[])).unwrap().is_correct);
        assert!(evaluate(&q, &pick(&[2, 1])).unwrap().is_correct);
    }

    #[test]
    fn test_duplicates_and_order_do_not_matter() {
        let q = question(QuestionType::MultipleChoice, &[(1, true), (2, false), (3, true)]);
        let eval = evaluate(&q, &pick(&[3, 1, 3])).unwrap();
        assert!(eval.is_correct);
        assert_eq!(eval.selected_options, vec![1, 3]);
    }

    #[test]
    fn test_true_false_needs_exactly_the_correct_option() {
        let q = question(QuestionType::TrueFalse, &[(1, true), (2, false)]);
        assert!(evaluate(&q, &pick(&[1])).unwrap().is_correct);
        assert!(!evaluate(&q, &pick(&[2])).unwrap().is_correct);
        assert!(!evaluate(&q, &pick(&[1, 2])).unwrap().is_correct);
        assert!(!evaluate(&q, &pick(&[])).unwrap().is_correct);
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let err = evaluate(&abc(), &pick(&[1, 42])).unwrap_err();
        assert_eq!(
            err,
            AttemptError::InvalidOptionReference {
                question_id: 1,
                option_id: 42
            }
        );
    }

    #[test]
    fn test_short_answer_is_never_auto_graded() {
        let q = question(QuestionType::ShortAnswer, &[]);
        let mut submission = pick(&[]);
        submission.text_answer = Some("mitochondria".to_string());

        let eval = evaluate(&q, &submission).unwrap();
        assert!(!eval.is_correct);
        assert_eq!(eval.points, 0);
        assert!(eval.needs_manual_grading);

        submission.text_answer = Some("   ".to_string());
        assert!(!evaluate(&q, &submission).unwrap().needs_manual_grading);

        assert!(matches!(
            evaluate(&q, &pick(&[1])),
            Err(AttemptError::InvalidOptionReference { .. })
        ));
    }
}
