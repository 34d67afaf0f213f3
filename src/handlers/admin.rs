// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        course::{Course, CreateCourseRequest, UpdateCourseRequest},
        enrollment::EnrollmentListRow,
        user::User,
    },
    response::{ApiResponse, message_only},
};

/// Creates a new course.
/// Admin only.
pub async fn create_course(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let Some(instructor_id) = payload.instructor_id {
        assert_instructor(&pool, instructor_id).await?;
    }

    let course = sqlx::query_as::<_, Course>(
        r#"
        INSERT INTO courses
            (title, description, instructor_id, category, start_date, end_date, is_published)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, title, description, instructor_id, category, start_date,
                  end_date, is_published, created_at
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.instructor_id)
    .bind(&payload.category)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.is_published)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create course: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(course, "Course created successfully"),
    ))
}

/// Lists all courses.
/// Admin only.
pub async fn list_courses(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT id, title, description, instructor_id, category, start_date,
               end_date, is_published, created_at
        FROM courses
        ORDER BY id DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::data(courses))
}

/// Retrieves a single course by ID.
/// Admin only.
pub async fn get_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = sqlx::query_as::<_, Course>(
        r#"
        SELECT id, title, description, instructor_id, category, start_date,
               end_date, is_published, created_at
        FROM courses
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Course not found".to_string()))?;

    Ok(ApiResponse::data(course))
}

/// Updates a course. Fields are optional.
/// Admin only.
pub async fn update_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if payload.title.is_none()
        && payload.description.is_none()
        && payload.category.is_none()
        && payload.start_date.is_none()
        && payload.end_date.is_none()
        && payload.is_published.is_none()
    {
        return Ok(message_only("Nothing to update"));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE courses SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    if let Some(category) = payload.category {
        separated.push("category = ");
        separated.push_bind_unseparated(category);
    }

    if let Some(start_date) = payload.start_date {
        separated.push("start_date = ");
        separated.push_bind_unseparated(start_date);
    }

    if let Some(end_date) = payload.end_date {
        separated.push("end_date = ");
        separated.push_bind_unseparated(end_date);
    }

    if let Some(is_published) = payload.is_published {
        separated.push("is_published = ");
        separated.push_bind_unseparated(is_published);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update course: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    Ok(message_only("Course updated successfully"))
}

/// Deletes a course and its whole content tree.
///
/// One transaction, fixed order: questions, attempts, quizzes, lesson
/// progress, lessons, enrollments, then the course row.
pub async fn delete_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await?;
    if exists == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        DELETE FROM questions WHERE quiz_id IN (
            SELECT q.id FROM quizzes q
            JOIN lessons l ON q.lesson_id = l.id
            WHERE l.course_id = $1
        )
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        DELETE FROM quiz_attempts WHERE quiz_id IN (
            SELECT q.id FROM quizzes q
            JOIN lessons l ON q.lesson_id = l.id
            WHERE l.course_id = $1
        )
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "DELETE FROM quizzes WHERE lesson_id IN (SELECT id FROM lessons WHERE course_id = $1)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "DELETE FROM lesson_progress WHERE lesson_id IN (SELECT id FROM lessons WHERE course_id = $1)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM lessons WHERE course_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM enrollments WHERE course_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(message_only("Course and associated content deleted"))
}

async fn assert_instructor(pool: &PgPool, user_id: i64) -> Result<(), AppError> {
    let role = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if role != "instructor" && role != "admin" {
        return Err(AppError::BadRequest("User is not an instructor".to_string()));
    }
    Ok(())
}

/// Assigns an instructor to a course.
/// Admin only.
pub async fn assign_instructor(
    State(pool): State<PgPool>,
    Path((course_id, instructor_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    assert_instructor(&pool, instructor_id).await?;

    let result = sqlx::query("UPDATE courses SET instructor_id = $1 WHERE id = $2")
        .bind(instructor_id)
        .bind(course_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    Ok(message_only("Instructor assigned to course"))
}

/// Removes the instructor from a course.
/// Admin only.
pub async fn unassign_instructor(
    State(pool): State<PgPool>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE courses SET instructor_id = NULL WHERE id = $1")
        .bind(course_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    Ok(message_only("Instructor removed from course"))
}

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, created_at
        FROM users
        ORDER BY id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(ApiResponse::data(users))
}

/// Lists all enrollments with user and course names.
/// Admin only.
pub async fn list_enrollments(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let enrollments = sqlx::query_as::<_, EnrollmentListRow>(
        r#"
        SELECT e.id, u.username, c.title AS course_title,
               e.enrollment_date, e.progress, e.is_completed
        FROM enrollments e
        JOIN users u ON e.user_id = u.id
        JOIN courses c ON e.course_id = c.id
        ORDER BY e.enrollment_date DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::data(enrollments))
}
