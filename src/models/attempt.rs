// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// One graded answer, embedded in the attempt row's JSONB `answers` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub question_id: i64,
    pub user_answer: String,
    pub is_correct: bool,
    /// 0 or the question's full point value; there is no partial credit.
    pub points_earned: i32,
}

/// Represents the 'quiz_attempts' table in the database.
///
/// `end_time` is the state marker: NULL while in progress, set exactly once
/// by the grading write. `score` and `is_passed` are derived from `answers`
/// and the quiz threshold at grading time, never written independently.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub score: i32,
    pub is_passed: bool,
    pub answers: Json<Vec<GradedAnswer>>,
}

/// Attempt history entry (student and instructor views).
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub id: i64,
    pub quiz_id: i64,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub score: i32,
    pub is_passed: bool,
}

/// Instructor results view: attempt joined with the student's username.
#[derive(Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResultRow {
    pub id: i64,
    pub username: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub score: i32,
    pub is_passed: bool,
}

/// One answer as submitted by the client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub answer: String,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptResponse {
    pub attempt_id: i64,
    pub start_time: chrono::DateTime<chrono::Utc>,
    /// Echoed for the client-side countdown; the server also enforces it at
    /// submission time.
    pub time_limit: Option<i32>,
}

/// Per-question review feedback returned after grading.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    pub question_id: i64,
    pub question_text: String,
    pub user_answer: String,
    pub is_correct: bool,
    pub points_earned: i32,
    pub correct_answer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptResponse {
    pub attempt_id: i64,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub score: i32,
    pub is_passed: bool,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub feedback: Vec<AnswerFeedback>,
}
