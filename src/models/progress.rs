// src/models/progress.rs

use serde::Serialize;
use sqlx::prelude::FromRow;

/// Represents the 'lesson_progress' table in the database.
/// One row per (user, lesson), created lazily on first access.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub id: i64,
    pub user_id: i64,
    pub lesson_id: i64,
    pub is_completed: bool,
    pub last_accessed_at: chrono::DateTime<chrono::Utc>,
    /// Accumulated minutes.
    pub time_spent: i32,
}
