// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::models::attempt::AttemptSummary;
use crate::models::question::PublicQuestion;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i64,
    pub lesson_id: i64,
    pub title: String,
    pub description: String,
    /// Minutes; NULL means unlimited.
    pub time_limit: Option<i32>,
    /// Minimum percentage score required to pass.
    pub passing_score: i32,
    pub is_published: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a quiz under a lesson.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(range(min = 1))]
    pub time_limit: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[serde(default)]
    pub is_published: bool,
}

/// Quiz metadata shown to a student (no answer material).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizMeta {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub time_limit: Option<i32>,
    pub passing_score: i32,
    pub total_questions: usize,
    pub total_points: i32,
}

/// Student quiz view: metadata, key-less questions, previous attempts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub quiz: QuizMeta,
    pub questions: Vec<PublicQuestion>,
    pub previous_attempts: Vec<AttemptSummary>,
}

/// Course-content view: quiz with the caller's attempt history.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizWithAttempts {
    pub id: i64,
    pub lesson_id: i64,
    pub title: String,
    pub description: String,
    pub time_limit: Option<i32>,
    pub passing_score: i32,
    pub attempts: Vec<AttemptSummary>,
    pub best_score: Option<i32>,
    pub is_passed: bool,
}
