// src/handlers/instructor.rs
//
// Course material management for instructors. Every operation resolves the
// owning course first and rejects callers who do not teach it.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    config::DEFAULT_PASSING_SCORE,
    error::AppError,
    models::{
        attempt::{AttemptSummary, QuizResultRow},
        course::Course,
        enrollment::{CourseEnrollmentRow, Enrollment},
        lesson::{CreateLessonRequest, Lesson, UpdateLessonRequest},
        question::{CreateQuestionRequest, MULTIPLE_CHOICE, Question, validate_question_shape},
        quiz::{CreateQuizRequest, Quiz},
    },
    response::{ApiResponse, message_only},
    utils::{html::clean_html, jwt::Claims},
};

/// Ownership guard: the caller must be the course's instructor.
async fn assert_course_owner(
    pool: &PgPool,
    instructor_id: i64,
    course_id: i64,
) -> Result<(), AppError> {
    let owned = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM courses WHERE id = $1 AND instructor_id = $2",
    )
    .bind(course_id)
    .bind(instructor_id)
    .fetch_one(pool)
    .await?;

    if owned == 0 {
        return Err(AppError::Forbidden(
            "Not authorized to manage this course".to_string(),
        ));
    }
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

async fn fetch_quiz(pool: &PgPool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, lesson_id, title, description, time_limit, passing_score,
               is_published, created_at
        FROM quizzes
        WHERE id = $1
        "#,
    )
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Resolves a quiz to its owning course and checks ownership in one go.
async fn assert_quiz_owner(
    pool: &PgPool,
    instructor_id: i64,
    quiz_id: i64,
) -> Result<Quiz, AppError> {
    let quiz = fetch_quiz(pool, quiz_id).await?;
    let lesson = fetch_lesson(pool, quiz.lesson_id).await?;
    assert_course_owner(pool, instructor_id, lesson.course_id).await?;
    Ok(quiz)
}

/// Lists courses taught by the caller.
pub async fn list_my_courses(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;

    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT id, title, description, instructor_id, category, start_date,
               end_date, is_published, created_at
        FROM courses
        WHERE instructor_id = $1
        ORDER BY id DESC
        "#,
    )
    .bind(instructor_id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::data(courses))
}

/// One owned course with its lessons in display order.
pub async fn get_course_with_lessons(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;
    assert_course_owner(&pool, instructor_id, course_id).await?;

    let course = sqlx::query_as::<_, Course>(
        r#"
        SELECT id, title, description, instructor_id, category, start_date,
               end_date, is_published, created_at
        FROM courses
        WHERE id = $1
        "#,
    )
    .bind(course_id)
    .fetch_one(&pool)
    .await?;

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

    Ok(ApiResponse::data(json!({
        "course": course,
        "lessons": lessons,
    })))
}

/// Creates a lesson. Content is sanitized before storage; the display order
/// defaults to the end of the course.
pub async fn create_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;
    assert_course_owner(&pool, instructor_id, course_id).await?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let display_order = match payload.display_order {
        Some(order) => order,
        None => {
            sqlx::query_scalar::<_, i32>(
                "SELECT COALESCE(MAX(display_order), 0) + 1 FROM lessons WHERE course_id = $1",
            )
            .bind(course_id)
            .fetch_one(&pool)
            .await?
        }
    };

    let attachments = serde_json::to_value(payload.attachments.unwrap_or_default())?;

    let lesson = sqlx::query_as::<_, Lesson>(
        r#"
        INSERT INTO lessons
            (course_id, title, description, content, display_order, duration,
             video_url, attachments, is_published)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, course_id, title, description, content, display_order,
                  duration, video_url, attachments, is_published, created_at
        "#,
    )
    .bind(course_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(clean_html(&payload.content))
    .bind(display_order)
    .bind(payload.duration.unwrap_or(0))
    .bind(payload.video_url.unwrap_or_default())
    .bind(attachments)
    .bind(payload.is_published.unwrap_or(false))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create lesson: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(lesson, "Lesson created successfully"),
    ))
}

/// Updates a lesson. Only provided fields are written.
pub async fn update_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<UpdateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;
    let lesson = fetch_lesson(&pool, lesson_id).await?;
    assert_course_owner(&pool, instructor_id, lesson.course_id).await?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if payload.title.is_none()
        && payload.description.is_none()
        && payload.content.is_none()
        && payload.display_order.is_none()
        && payload.duration.is_none()
        && payload.video_url.is_none()
        && payload.attachments.is_none()
        && payload.is_published.is_none()
    {
        return Ok(message_only("Nothing to update"));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE lessons SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    if let Some(content) = payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(clean_html(&content));
    }

    if let Some(display_order) = payload.display_order {
        separated.push("display_order = ");
        separated.push_bind_unseparated(display_order);
    }

    if let Some(duration) = payload.duration {
        separated.push("duration = ");
        separated.push_bind_unseparated(duration);
    }

    if let Some(video_url) = payload.video_url {
        separated.push("video_url = ");
        separated.push_bind_unseparated(video_url);
    }

    if let Some(attachments) = payload.attachments {
        separated.push("attachments = ");
        separated.push_bind_unseparated(serde_json::to_value(attachments).unwrap_or_default());
    }

    if let Some(is_published) = payload.is_published {
        separated.push("is_published = ");
        separated.push_bind_unseparated(is_published);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(lesson_id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update lesson: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(message_only("Lesson updated successfully"))
}

/// Deletes a lesson and everything hanging off it.
///
/// One transaction, fixed order: questions, attempts, quizzes, progress
/// rows, then the lesson itself. The foreign keys have no ON DELETE
/// CASCADE, so a partial failure rolls back instead of orphaning rows.
pub async fn delete_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;
    let lesson = fetch_lesson(&pool, lesson_id).await?;
    assert_course_owner(&pool, instructor_id, lesson.course_id).await?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM questions WHERE quiz_id IN (SELECT id FROM quizzes WHERE lesson_id = $1)",
    )
    .bind(lesson_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "DELETE FROM quiz_attempts WHERE quiz_id IN (SELECT id FROM quizzes WHERE lesson_id = $1)",
    )
    .bind(lesson_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM quizzes WHERE lesson_id = $1")
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM lesson_progress WHERE lesson_id = $1")
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM lessons WHERE id = $1")
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(message_only(
        "Lesson and associated quizzes deleted successfully",
    ))
}

/// Creates a quiz under a lesson.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;
    let lesson = fetch_lesson(&pool, lesson_id).await?;
    assert_course_owner(&pool, instructor_id, lesson.course_id).await?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        INSERT INTO quizzes (lesson_id, title, description, time_limit, passing_score, is_published)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, lesson_id, title, description, time_limit, passing_score,
                  is_published, created_at
        "#,
    )
    .bind(lesson_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.time_limit)
    .bind(payload.passing_score.unwrap_or(DEFAULT_PASSING_SCORE))
    .bind(payload.is_published)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(quiz, "Quiz created successfully"),
    ))
}

/// Adds a question to a quiz.
///
/// Multiple-choice payloads must flag exactly one correct option; the other
/// types must carry the correct answer string. Stored shape is normalized:
/// options only for multiple-choice, correct_answer only for the rest.
pub async fn add_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;
    assert_quiz_owner(&pool, instructor_id, quiz_id).await?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if let Err(shape_error) = validate_question_shape(&payload) {
        return Err(AppError::BadRequest(shape_error.to_string()));
    }

    let display_order = match payload.display_order {
        Some(order) => order,
        None => {
            sqlx::query_scalar::<_, i32>(
                "SELECT COALESCE(MAX(display_order), 0) + 1 FROM questions WHERE quiz_id = $1",
            )
            .bind(quiz_id)
            .fetch_one(&pool)
            .await?
        }
    };

    let is_multiple_choice = payload.question_type == MULTIPLE_CHOICE;
    let options = if is_multiple_choice {
        serde_json::to_value(&payload.options)?
    } else {
        serde_json::Value::Array(vec![])
    };
    let correct_answer = if is_multiple_choice {
        None
    } else {
        payload.correct_answer.clone()
    };

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions
            (quiz_id, question_text, question_type, options, correct_answer, points, display_order)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, quiz_id, question_text, question_type, options,
                  correct_answer, points, display_order, created_at
        "#,
    )
    .bind(quiz_id)
    .bind(&payload.question_text)
    .bind(&payload.question_type)
    .bind(options)
    .bind(correct_answer)
    .bind(payload.points.unwrap_or(1))
    .bind(display_order)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(question, "Question added to quiz successfully"),
    ))
}

/// Deletes a question from an owned quiz.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;

    let quiz_id = sqlx::query_scalar::<_, i64>("SELECT quiz_id FROM questions WHERE id = $1")
        .bind(question_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    assert_quiz_owner(&pool, instructor_id, quiz_id).await?;

    sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(question_id)
        .execute(&pool)
        .await?;

    Ok(message_only("Question deleted successfully"))
}

/// Quiz with its full question set, answer keys included (owner view).
pub async fn get_quiz_with_questions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;
    let quiz = assert_quiz_owner(&pool, instructor_id, quiz_id).await?;

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, question_text, question_type, options,
               correct_answer, points, display_order, created_at
        FROM questions
        WHERE quiz_id = $1
        ORDER BY display_order
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::data(json!({
        "quiz": quiz,
        "questions": questions,
    })))
}

/// All attempts for an owned quiz, joined with the student names.
pub async fn get_quiz_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;
    assert_quiz_owner(&pool, instructor_id, quiz_id).await?;

    let results = sqlx::query_as::<_, QuizResultRow>(
        r#"
        SELECT a.id, u.username, a.start_time, a.end_time, a.score, a.is_passed
        FROM quiz_attempts a
        JOIN users u ON a.user_id = u.id
        WHERE a.quiz_id = $1
        ORDER BY a.start_time DESC
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::data(results))
}

/// Roster of an owned course.
pub async fn get_course_enrollments(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;
    assert_course_owner(&pool, instructor_id, course_id).await?;

    let enrollments = sqlx::query_as::<_, CourseEnrollmentRow>(
        r#"
        SELECT e.id, e.user_id, u.username, e.enrollment_date, e.progress, e.is_completed
        FROM enrollments e
        JOIN users u ON e.user_id = u.id
        WHERE e.course_id = $1
        ORDER BY e.enrollment_date
        "#,
    )
    .bind(course_id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::data(enrollments))
}

/// One student's performance across an owned course: enrollment state and
/// all quiz attempts within the course.
pub async fn get_student_performance(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path((course_id, student_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_id = claims.user_id()?;
    assert_course_owner(&pool, instructor_id, course_id).await?;

    let student = sqlx::query_as::<_, (i64, String)>("SELECT id, username FROM users WHERE id = $1")
        .bind(student_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Student not found".to_string()))?;

    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT id, user_id, course_id, enrollment_date, completion_date,
               progress, is_completed, last_accessed_at
        FROM enrollments
        WHERE user_id = $1 AND course_id = $2
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound(
        "Student not enrolled in this course".to_string(),
    ))?;

    let attempts = sqlx::query_as::<_, AttemptSummary>(
        r#"
        SELECT a.id, a.quiz_id, a.start_time, a.end_time, a.score, a.is_passed
        FROM quiz_attempts a
        JOIN quizzes q ON a.quiz_id = q.id
        JOIN lessons l ON q.lesson_id = l.id
        WHERE a.user_id = $1 AND l.course_id = $2
        ORDER BY a.start_time DESC
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::data(json!({
        "student": { "id": student.0, "username": student.1 },
        "enrollment": enrollment,
        "quizAttempts": attempts,
    })))
}
