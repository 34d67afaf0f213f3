// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

pub const MULTIPLE_CHOICE: &str = "multiple-choice";
pub const TRUE_FALSE: &str = "true-false";
pub const SHORT_ANSWER: &str = "short-answer";

/// One selectable option of a multiple-choice question.
/// Stored inside the question row's JSONB `options` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub text: String,
    pub is_correct: bool,
}

/// Represents the 'questions' table in the database.
///
/// `options` is only populated for multiple-choice questions;
/// `correct_answer` only for true-false and short-answer ones.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,
    pub question_type: String,
    pub options: Json<Vec<QuestionOption>>,
    pub correct_answer: Option<String>,
    pub points: i32,
    pub display_order: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Question {
    /// The canonical correct answer string used for grading: the flagged
    /// option's text for multiple-choice, the stored answer otherwise.
    /// Comparison against the student's response is case-sensitive.
    pub fn correct_answer_text(&self) -> Option<&str> {
        if self.question_type == MULTIPLE_CHOICE {
            self.options
                .iter()
                .find(|opt| opt.is_correct)
                .map(|opt| opt.text.as_str())
        } else {
            self.correct_answer.as_deref()
        }
    }
}

/// DTO for sending a question to a student (answer key excluded).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub question_type: String,
    pub options: Vec<String>,
    pub points: i32,
    pub display_order: i32,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_text: q.question_text,
            question_type: q.question_type,
            options: q.options.0.into_iter().map(|opt| opt.text).collect(),
            points: q.points,
            display_order: q.display_order,
        }
    }
}

/// DTO for adding a question to a quiz.
/// Field lengths are checked by `validate()`; the per-type shape rules live
/// in [`validate_question_shape`], which handlers call alongside it.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: String,
    pub question_type: String,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    pub correct_answer: Option<String>,
    #[validate(range(min = 1))]
    pub points: Option<i32>,
    pub display_order: Option<i32>,
}

/// Shape rules per question type: multiple-choice needs options with exactly
/// one flagged correct, the other types need a stored correct answer.
pub fn validate_question_shape(
    req: &CreateQuestionRequest,
) -> Result<(), validator::ValidationError> {
    match req.question_type.as_str() {
        MULTIPLE_CHOICE => {
            if req.options.len() < 2 {
                return Err(validator::ValidationError::new("too_few_options"));
            }
            if req.options.iter().filter(|opt| opt.is_correct).count() != 1 {
                return Err(validator::ValidationError::new("exactly_one_correct_option"));
            }
            if req.options.iter().any(|opt| opt.text.is_empty() || opt.text.len() > 500) {
                return Err(validator::ValidationError::new("bad_option_text"));
            }
        }
        TRUE_FALSE | SHORT_ANSWER => {
            match req.correct_answer.as_deref() {
                Some(ans) if !ans.is_empty() && ans.len() <= 500 => {}
                _ => return Err(validator::ValidationError::new("correct_answer_required")),
            }
        }
        _ => return Err(validator::ValidationError::new("unknown_question_type")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(text: &str, is_correct: bool) -> QuestionOption {
        QuestionOption {
            text: text.to_string(),
            is_correct,
        }
    }

    #[test]
    fn correct_answer_of_multiple_choice_is_flagged_option() {
        let q = Question {
            id: 1,
            quiz_id: 1,
            question_text: "Pick B".to_string(),
            question_type: MULTIPLE_CHOICE.to_string(),
            options: Json(vec![option("A", false), option("B", true)]),
            correct_answer: None,
            points: 1,
            display_order: 1,
            created_at: chrono::Utc::now(),
        };
        assert_eq!(q.correct_answer_text(), Some("B"));
    }

    #[test]
    fn correct_answer_of_true_false_is_stored_string() {
        let q = Question {
            id: 2,
            quiz_id: 1,
            question_text: "Water is wet".to_string(),
            question_type: TRUE_FALSE.to_string(),
            options: Json(vec![]),
            correct_answer: Some("true".to_string()),
            points: 1,
            display_order: 2,
            created_at: chrono::Utc::now(),
        };
        assert_eq!(q.correct_answer_text(), Some("true"));
    }

    #[test]
    fn multiple_choice_must_flag_exactly_one_option() {
        let mut req = CreateQuestionRequest {
            question_text: "Pick one".to_string(),
            question_type: MULTIPLE_CHOICE.to_string(),
            options: vec![option("A", true), option("B", true)],
            correct_answer: None,
            points: None,
            display_order: None,
        };
        assert!(validate_question_shape(&req).is_err());

        req.options = vec![option("A", true), option("B", false)];
        assert!(validate_question_shape(&req).is_ok());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn short_answer_requires_correct_answer() {
        let req = CreateQuestionRequest {
            question_text: "Capital of France?".to_string(),
            question_type: SHORT_ANSWER.to_string(),
            options: vec![],
            correct_answer: None,
            points: None,
            display_order: None,
        };
        assert!(validate_question_shape(&req).is_err());
    }
}
