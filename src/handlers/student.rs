// src/handlers/student.rs
//
// Enrollment, course/lesson content views and lesson-completion tracking.
// Course progress is always recomputed from the current lesson-progress rows,
// never incremented in place.

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        attempt::AttemptSummary,
        course::{Course, CourseContentResponse},
        enrollment::{EnrolledCourse, Enrollment},
        lesson::{CompleteLessonRequest, Lesson, LessonWithProgress},
        progress::LessonProgress,
        quiz::{Quiz, QuizWithAttempts},
    },
    response::ApiResponse,
    utils::jwt::Claims,
};

/// Loads the caller's enrollment for a course, or fails with 403.
/// Used as a precondition by every content and quiz path.
pub(crate) async fn assert_enrolled(
    pool: &PgPool,
    user_id: i64,
    course_id: i64,
) -> Result<Enrollment, AppError> {
    sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT id, user_id, course_id, enrollment_date, completion_date,
               progress, is_completed, last_accessed_at
        FROM enrollments
        WHERE user_id = $1 AND course_id = $2
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Forbidden(
        "You are not enrolled in this course".to_string(),
    ))
}

/// Percentage of completed lessons, rounded to the nearest integer.
/// A course with no lessons counts as 0, not a division error.
pub(crate) fn course_progress(completed_lessons: i64, total_lessons: i64) -> i32 {
    if total_lessons == 0 {
        return 0;
    }
    ((completed_lessons * 100) as f64 / total_lessons as f64).round() as i32
}

/// Idempotent completion upsert for a (user, lesson) pair. The unique index
/// on lesson_progress makes concurrent first-time creations collapse into
/// the DO UPDATE arm.
pub(crate) async fn complete_lesson_progress(
    pool: &PgPool,
    user_id: i64,
    lesson_id: i64,
    extra_minutes: i32,
) -> Result<LessonProgress, AppError> {
    let progress = sqlx::query_as::<_, LessonProgress>(
        r#"
        INSERT INTO lesson_progress (user_id, lesson_id, is_completed, last_accessed_at, time_spent)
        VALUES ($1, $2, TRUE, now(), GREATEST($3, 0))
        ON CONFLICT (user_id, lesson_id) DO UPDATE SET
            is_completed = TRUE,
            last_accessed_at = now(),
            time_spent = lesson_progress.time_spent + GREATEST($3, 0)
        RETURNING id, user_id, lesson_id, is_completed, last_accessed_at, time_spent
        "#,
    )
    .bind(user_id)
    .bind(lesson_id)
    .bind(extra_minutes)
    .fetch_one(pool)
    .await?;

    Ok(progress)
}

/// Derives the enrollment's progress percentage from the course's current
/// lesson set and the caller's completion rows, then writes it back.
/// Safe to call redundantly.
pub(crate) async fn recompute_course_progress(
    pool: &PgPool,
    user_id: i64,
    course_id: i64,
) -> Result<(), AppError> {
    let total_lessons = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM lessons WHERE course_id = $1",
    )
    .bind(course_id)
    .fetch_one(pool)
    .await?;

    let completed_lessons = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM lesson_progress lp
        JOIN lessons l ON lp.lesson_id = l.id
        WHERE lp.user_id = $1 AND l.course_id = $2 AND lp.is_completed
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;

    let progress = course_progress(completed_lessons, total_lessons);
    let is_completed = progress == 100;

    sqlx::query(
        r#"
        UPDATE enrollments
        SET progress = $1,
            is_completed = $2,
            completion_date = CASE
                WHEN $2 AND completion_date IS NULL THEN now()
                ELSE completion_date
            END
        WHERE user_id = $3 AND course_id = $4
        "#,
    )
    .bind(progress)
    .bind(is_completed)
    .bind(user_id)
    .bind(course_id)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update course progress: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(())
}

async fn fetch_lesson(pool: &PgPool, lesson_id: i64) -> Result<Lesson, AppError> {
    sqlx::query_as::<_, Lesson>(
        r#"
        SELECT id, course_id, title, description, content, display_order,
               duration, video_url, attachments, is_published, created_at
        FROM lessons
        WHERE id = $1
        "#,
    )
    .bind(lesson_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Lesson not found".to_string()))
}

/// Enrolls the caller into a course.
///
/// The unique index on (user_id, course_id) is the real duplicate guard;
/// concurrent double-enrollment collapses into one Conflict here.
pub async fn enroll_in_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let course_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_one(&pool)
        .await?;
    if course_exists == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        INSERT INTO enrollments (user_id, course_id)
        VALUES ($1, $2)
        RETURNING id, user_id, course_id, enrollment_date, completion_date,
                  progress, is_completed, last_accessed_at
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict("You are already enrolled in this course".to_string())
        } else {
            tracing::error!("Failed to enroll user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(enrollment, "Successfully enrolled in course"),
    ))
}

/// Lists the caller's enrolled courses with their aggregate progress.
pub async fn get_enrolled_courses(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let courses = sqlx::query_as::<_, EnrolledCourse>(
        r#"
        SELECT c.id, c.title, c.description, c.category, c.start_date, c.end_date,
               e.id AS enrollment_id, e.enrollment_date, e.progress, e.is_completed
        FROM enrollments e
        JOIN courses c ON e.course_id = c.id
        WHERE e.user_id = $1
        ORDER BY e.enrollment_date DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::data(courses))
}

/// Course content view: lessons with the caller's per-lesson progress and
/// quizzes with the caller's attempt history.
pub async fn get_course_content(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let enrollment = assert_enrolled(&pool, user_id, course_id).await?;

    let course = sqlx::query_as::<_, Course>(
        r#"
        SELECT id, title, description, instructor_id, category, start_date,
               end_date, is_published, created_at
        FROM courses
        WHERE id = $1
        "#,
    )
    .bind(course_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Course not found".to_string()))?;

    let lessons = sqlx::query_as::<_, Lesson>(
        r#"
        SELECT id, course_id, title, description, content, display_order,
               duration, video_url, attachments, is_published, created_at
        FROM lessons
        WHERE course_id = $1
        ORDER BY display_order
        "#,
    )
    .bind(course_id)
    .fetch_all(&pool)
    .await?;

    let lesson_ids: Vec<i64> = lessons.iter().map(|l| l.id).collect();

    let progress_rows = sqlx::query_as::<_, LessonProgress>(
        r#"
        SELECT id, user_id, lesson_id, is_completed, last_accessed_at, time_spent
        FROM lesson_progress
        WHERE user_id = $1 AND lesson_id = ANY($2)
        "#,
    )
    .bind(user_id)
    .bind(&lesson_ids)
    .fetch_all(&pool)
    .await?;

    let progress_map: HashMap<i64, LessonProgress> = progress_rows
        .into_iter()
        .map(|p| (p.lesson_id, p))
        .collect();

    let lessons_with_progress: Vec<LessonWithProgress> = lessons
        .into_iter()
        .map(|lesson| {
            let progress = progress_map.get(&lesson.id);
            LessonWithProgress {
                id: lesson.id,
                title: lesson.title,
                description: lesson.description,
                display_order: lesson.display_order,
                duration: lesson.duration,
                video_url: lesson.video_url,
                attachments: lesson.attachments.0,
                is_completed: progress.map(|p| p.is_completed).unwrap_or(false),
                last_accessed: progress.map(|p| p.last_accessed_at),
            }
        })
        .collect();

    let quizzes = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, lesson_id, title, description, time_limit, passing_score,
               is_published, created_at
        FROM quizzes
        WHERE lesson_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(&lesson_ids)
    .fetch_all(&pool)
    .await?;

    let quiz_ids: Vec<i64> = quizzes.iter().map(|q| q.id).collect();

    let attempts = sqlx::query_as::<_, AttemptSummary>(
        r#"
        SELECT id, quiz_id, start_time, end_time, score, is_passed
        FROM quiz_attempts
        WHERE user_id = $1 AND quiz_id = ANY($2)
        ORDER BY start_time DESC
        "#,
    )
    .bind(user_id)
    .bind(&quiz_ids)
    .fetch_all(&pool)
    .await?;

    let mut attempts_map: HashMap<i64, Vec<AttemptSummary>> = HashMap::new();
    for attempt in attempts {
        attempts_map.entry(attempt.quiz_id).or_default().push(attempt);
    }

    let quizzes_with_attempts: Vec<QuizWithAttempts> = quizzes
        .into_iter()
        .map(|quiz| {
            let attempts = attempts_map.remove(&quiz.id).unwrap_or_default();
            QuizWithAttempts {
                id: quiz.id,
                lesson_id: quiz.lesson_id,
                title: quiz.title,
                description: quiz.description,
                time_limit: quiz.time_limit,
                passing_score: quiz.passing_score,
                best_score: attempts.iter().map(|a| a.score).max(),
                is_passed: attempts.iter().any(|a| a.is_passed),
                attempts,
            }
        })
        .collect();

    Ok(ApiResponse::data(CourseContentResponse {
        course,
        enrollment,
        lessons: lessons_with_progress,
        quizzes: quizzes_with_attempts,
    }))
}

/// Lesson content view. Creates the caller's LessonProgress row lazily on
/// first access and refreshes its last-accessed timestamp on every visit.
pub async fn get_lesson_content(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let lesson = fetch_lesson(&pool, lesson_id).await?;
    assert_enrolled(&pool, user_id, lesson.course_id).await?;

    let progress = sqlx::query_as::<_, LessonProgress>(
        r#"
        INSERT INTO lesson_progress (user_id, lesson_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, lesson_id) DO UPDATE SET last_accessed_at = now()
        RETURNING id, user_id, lesson_id, is_completed, last_accessed_at, time_spent
        "#,
    )
    .bind(user_id)
    .bind(lesson_id)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::data(serde_json::json!({
        "lesson": lesson,
        "progress": progress,
    })))
}

/// Marks a lesson as completed and recomputes the course's progress.
/// Idempotent: completing an already-completed lesson changes nothing.
pub async fn mark_lesson_completed(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
    body: Result<Json<CompleteLessonRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let lesson = fetch_lesson(&pool, lesson_id).await?;
    assert_enrolled(&pool, user_id, lesson.course_id).await?;

    // The body is optional; a bare PUT completes the lesson without adding
    // to the time accumulator.
    let extra_minutes = body
        .ok()
        .and_then(|Json(req)| req.time_spent)
        .unwrap_or(0);

    let progress = complete_lesson_progress(&pool, user_id, lesson_id, extra_minutes).await?;
    recompute_course_progress(&pool, user_id, lesson.course_id).await?;

    Ok(ApiResponse::with_message(
        progress,
        "Lesson marked as completed",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_of_empty_course_is_zero() {
        assert_eq!(course_progress(0, 0), 0);
    }

    #[test]
    fn progress_rounds_to_nearest_percent() {
        assert_eq!(course_progress(1, 3), 33);
        assert_eq!(course_progress(2, 3), 67);
        assert_eq!(course_progress(1, 2), 50);
    }

    #[test]
    fn progress_full_completion_is_exactly_hundred() {
        assert_eq!(course_progress(3, 3), 100);
    }

    #[test]
    fn progress_with_no_completions_is_zero() {
        assert_eq!(course_progress(0, 5), 0);
    }
}
