// src/models/enrollment.rs

use serde::Serialize;
use sqlx::prelude::FromRow;

/// Represents the 'enrollments' table in the database.
///
/// `progress` and `is_completed` are derived by the course-progress
/// recomputation; no write path accepts them from a client.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub enrollment_date: chrono::DateTime<chrono::Utc>,
    pub completion_date: Option<chrono::DateTime<chrono::Utc>>,
    /// Percentage, 0-100.
    pub progress: i32,
    pub is_completed: bool,
    pub last_accessed_at: chrono::DateTime<chrono::Utc>,
}

/// Student dashboard entry: enrollment joined with its course.
#[derive(Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub enrollment_id: i64,
    pub enrollment_date: chrono::DateTime<chrono::Utc>,
    pub progress: i32,
    pub is_completed: bool,
}

/// Instructor/admin roster entry: enrollment joined with the student.
#[derive(Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseEnrollmentRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub enrollment_date: chrono::DateTime<chrono::Utc>,
    pub progress: i32,
    pub is_completed: bool,
}

/// Admin listing: enrollment joined with user and course.
#[derive(Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentListRow {
    pub id: i64,
    pub username: String,
    pub course_title: String,
    pub enrollment_date: chrono::DateTime<chrono::Utc>,
    pub progress: i32,
    pub is_completed: bool,
}
