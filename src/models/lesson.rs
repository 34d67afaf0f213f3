// src/models/lesson.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use url::Url;
use validator::Validate;

/// Represents the 'lessons' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,
    /// Sanitized HTML body.
    pub content: String,
    pub display_order: i32,
    /// Minutes.
    pub duration: i32,
    pub video_url: String,
    /// List of attachment URLs, stored as a JSON array.
    pub attachments: Json<Vec<String>>,
    pub is_published: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a lesson under a course.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(length(min = 1, max = 100000))]
    pub content: String,
    /// Appended after the course's last lesson when omitted.
    pub display_order: Option<i32>,
    #[validate(range(min = 0))]
    pub duration: Option<i32>,
    #[validate(custom(function = validate_optional_url))]
    pub video_url: Option<String>,
    #[validate(custom(function = validate_attachment_urls))]
    pub attachments: Option<Vec<String>>,
    pub is_published: Option<bool>,
}

/// DTO for updating a lesson. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100000))]
    pub content: Option<String>,
    pub display_order: Option<i32>,
    #[validate(range(min = 0))]
    pub duration: Option<i32>,
    #[validate(custom(function = validate_optional_url))]
    pub video_url: Option<String>,
    #[validate(custom(function = validate_attachment_urls))]
    pub attachments: Option<Vec<String>>,
    pub is_published: Option<bool>,
}

/// Optional body of PUT /lessons/{id}/complete.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonRequest {
    /// Minutes to add to the progress row's time-spent accumulator.
    pub time_spent: Option<i32>,
}

/// Course-content view: lesson metadata with the caller's progress.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonWithProgress {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub display_order: i32,
    pub duration: i32,
    pub video_url: String,
    pub attachments: Vec<String>,
    pub is_completed: bool,
    pub last_accessed: Option<chrono::DateTime<chrono::Utc>>,
}

fn validate_optional_url(url: &str) -> Result<(), validator::ValidationError> {
    // Empty string means "no video", matching the column default.
    if !url.is_empty() && Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

fn validate_attachment_urls(urls: &[String]) -> Result<(), validator::ValidationError> {
    for url in urls {
        if url.len() > 500 {
            return Err(validator::ValidationError::new("url_too_long"));
        }
        if Url::parse(url).is_err() {
            return Err(validator::ValidationError::new("invalid_url"));
        }
    }
    Ok(())
}
