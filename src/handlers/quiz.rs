// src/handlers/quiz.rs
//
// Student quiz flow: view, start attempt, submit and grade. Grading is a
// pure in-memory computation over the stored question set; the only state
// transition is the conditional finalize write on the attempt row.

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, types::Json as SqlJson};

use crate::{
    error::AppError,
    handlers::student::{assert_enrolled, complete_lesson_progress, recompute_course_progress},
    models::{
        attempt::{
            AnswerFeedback, AttemptSummary, GradedAnswer, QuizAttempt, StartAttemptResponse,
            SubmitAttemptRequest, SubmitAttemptResponse, SubmittedAnswer,
        },
        question::{PublicQuestion, Question},
        quiz::{Quiz, QuizMeta, QuizView},
    },
    response::ApiResponse,
    utils::jwt::Claims,
};

/// Result of grading a submission against the quiz's question set.
pub(crate) struct GradedSubmission {
    pub answers: Vec<GradedAnswer>,
    pub total_points: i32,
    pub earned_points: i32,
}

impl GradedSubmission {
    /// Percentage score, rounded to the nearest integer. A submission with
    /// no recognized answers scores 0.
    pub fn score(&self) -> i32 {
        if self.total_points == 0 {
            return 0;
        }
        ((self.earned_points * 100) as f64 / self.total_points as f64).round() as i32
    }
}

/// Grades each submitted answer against the question lookup.
///
/// Answers referencing unknown question ids are skipped: neither scored nor
/// recorded. All comparisons are case-sensitive exact matches; a wrong
/// answer earns 0 points, a right one the question's full point value.
pub(crate) fn grade_submission(
    questions: &HashMap<i64, Question>,
    submitted: &[SubmittedAnswer],
) -> GradedSubmission {
    let mut graded = GradedSubmission {
        answers: Vec::with_capacity(submitted.len()),
        total_points: 0,
        earned_points: 0,
    };

    for answer in submitted {
        let Some(question) = questions.get(&answer.question_id) else {
            continue;
        };

        graded.total_points += question.points;

        let is_correct = question
            .correct_answer_text()
            .is_some_and(|expected| expected == answer.answer);
        let points_earned = if is_correct { question.points } else { 0 };
        graded.earned_points += points_earned;

        graded.answers.push(GradedAnswer {
            question_id: question.id,
            user_answer: answer.answer.clone(),
            is_correct,
            points_earned,
        });
    }

    graded
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

/// Resolves the course a quiz belongs to (via its lesson).
async fn fetch_quiz_course(pool: &PgPool, lesson_id: i64) -> Result<(i64, i64), AppError> {
    let row = sqlx::query_as::<_, (i64, i64)>("SELECT id, course_id FROM lessons WHERE id = $1")
        .bind(lesson_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Associated lesson not found".to_string()))?;

    Ok(row)
}

async fn fetch_questions(pool: &PgPool, quiz_id: i64) -> Result<Vec<Question>, AppError> {
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
    .fetch_all(pool)
    .await?;

    Ok(questions)
}

/// Quiz view for an enrolled student: metadata plus the question set with
/// every answer key stripped, and the caller's previous attempts.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let quiz = fetch_quiz(&pool, quiz_id).await?;
    let (_, course_id) = fetch_quiz_course(&pool, quiz.lesson_id).await?;
    assert_enrolled(&pool, user_id, course_id).await?;

    let questions = fetch_questions(&pool, quiz_id).await?;
    let total_points: i32 = questions.iter().map(|q| q.points).sum();

    let previous_attempts = sqlx::query_as::<_, AttemptSummary>(
        r#"
        SELECT id, quiz_id, start_time, end_time, score, is_passed
        FROM quiz_attempts
        WHERE user_id = $1 AND quiz_id = $2
        ORDER BY start_time DESC
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::data(QuizView {
        quiz: QuizMeta {
            id: quiz.id,
            title: quiz.title,
            description: quiz.description,
            time_limit: quiz.time_limit,
            passing_score: quiz.passing_score,
            total_questions: questions.len(),
            total_points,
        },
        questions: questions.into_iter().map(PublicQuestion::from).collect(),
        previous_attempts,
    }))
}

/// Starts a new attempt for an enrolled student.
///
/// Returns the attempt id, start time and the quiz's time limit for the
/// client-side countdown. The same limit is enforced again at submission.
pub async fn start_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let quiz = fetch_quiz(&pool, quiz_id).await?;
    let (_, course_id) = fetch_quiz_course(&pool, quiz.lesson_id).await?;
    assert_enrolled(&pool, user_id, course_id).await?;

    let (attempt_id, start_time) = sqlx::query_as::<_, (i64, chrono::DateTime<chrono::Utc>)>(
        r#"
        INSERT INTO quiz_attempts (user_id, quiz_id)
        VALUES ($1, $2)
        RETURNING id, start_time
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(
            StartAttemptResponse {
                attempt_id,
                start_time,
                time_limit: quiz.time_limit,
            },
            "Quiz attempt started",
        ),
    ))
}

/// Grades and finalizes an attempt.
///
/// The attempt transitions to "submitted" exactly once: the finalize UPDATE
/// is conditioned on `end_time IS NULL`, so of two racing submissions only
/// the first write lands and the loser gets a Conflict.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if req.answers.is_empty() {
        return Err(AppError::BadRequest(
            "Please provide a non-empty answers array".to_string(),
        ));
    }

    let attempt = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, user_id, quiz_id, start_time, end_time, score, is_passed, answers
        FROM quiz_attempts
        WHERE id = $1
        "#,
    )
    .bind(attempt_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Quiz attempt not found".to_string()))?;

    if attempt.user_id != user_id {
        return Err(AppError::Forbidden(
            "Not authorized to submit for this attempt".to_string(),
        ));
    }

    if attempt.end_time.is_some() {
        return Err(AppError::Conflict(
            "This attempt has already been submitted".to_string(),
        ));
    }

    let quiz = fetch_quiz(&pool, attempt.quiz_id).await?;

    if let Some(limit) = quiz.time_limit {
        let deadline = attempt.start_time + chrono::Duration::minutes(limit as i64);
        if chrono::Utc::now() > deadline {
            return Err(AppError::BadRequest(
                "Time limit for this attempt has expired".to_string(),
            ));
        }
    }

    let questions = fetch_questions(&pool, quiz.id).await?;
    let total_questions = questions.len();
    let question_map: HashMap<i64, Question> =
        questions.into_iter().map(|q| (q.id, q)).collect();

    let graded = grade_submission(&question_map, &req.answers);
    let score = graded.score();
    let is_passed = score >= quiz.passing_score;

    // Conditional write: only an in-progress attempt can be finalized.
    let result = sqlx::query(
        r#"
        UPDATE quiz_attempts
        SET end_time = now(), score = $1, is_passed = $2, answers = $3
        WHERE id = $4 AND end_time IS NULL
        "#,
    )
    .bind(score)
    .bind(is_passed)
    .bind(SqlJson(&graded.answers))
    .bind(attempt_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to finalize quiz attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        // A concurrent submission won the race.
        return Err(AppError::Conflict(
            "This attempt has already been submitted".to_string(),
        ));
    }

    let end_time = sqlx::query_scalar::<_, chrono::DateTime<chrono::Utc>>(
        "SELECT end_time FROM quiz_attempts WHERE id = $1",
    )
    .bind(attempt_id)
    .fetch_one(&pool)
    .await?;

    if is_passed {
        let (lesson_id, course_id) = fetch_quiz_course(&pool, quiz.lesson_id).await?;
        complete_lesson_progress(&pool, user_id, lesson_id, 0).await?;
        recompute_course_progress(&pool, user_id, course_id).await?;
    }

    let feedback: Vec<AnswerFeedback> = graded
        .answers
        .iter()
        .map(|answer| {
            let question = &question_map[&answer.question_id];
            AnswerFeedback {
                question_id: answer.question_id,
                question_text: question.question_text.clone(),
                user_answer: answer.user_answer.clone(),
                is_correct: answer.is_correct,
                points_earned: answer.points_earned,
                correct_answer: question.correct_answer_text().unwrap_or_default().to_string(),
            }
        })
        .collect();

    let correct_answers = graded.answers.iter().filter(|a| a.is_correct).count();
    let message = format!(
        "Quiz submitted. Your score: {}%. {}",
        score,
        if is_passed {
            "Congratulations! You passed!"
        } else {
            "You did not pass the minimum score."
        }
    );

    Ok(ApiResponse::with_message(
        SubmitAttemptResponse {
            attempt_id,
            start_time: attempt.start_time,
            end_time,
            score,
            is_passed,
            total_questions,
            correct_answers,
            feedback,
        },
        message,
    ))
}
