// tests/api_tests.rs

use lms_server::{config::Config, routes, state::AppState};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL plus a pool for seeding, or None when DATABASE_URL
/// is not set so the suite can run without a database.
async fn spawn_app() -> Option<(String, PgPool)> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping: DATABASE_URL not set");
        return None;
    };

    // 1. Create a pool
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        port: 0,
        client_origin: "http://localhost:5173".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState::new(pool.clone(), config);

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    Some((address, pool))
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Registers a user, optionally upgrades its role, and logs in.
/// Returns (user_id, bearer token).
async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    pool: &PgPool,
    role: &str,
) -> (i64, String) {
    let username = unique_name("u");
    let password = "password123";

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    let user_id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = $1")
        .bind(&username)
        .fetch_one(pool)
        .await
        .unwrap();

    if role != "student" {
        sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(role)
            .bind(user_id)
            .execute(pool)
            .await
            .unwrap();
    }

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    let token = login["data"]["token"].as_str().expect("Token not found");
    (user_id, token.to_string())
}

async fn seed_course(pool: &PgPool, instructor_id: Option<i64>) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO courses (title, description, instructor_id, category, is_published)
        VALUES ($1, 'An integration test course', $2, 'testing', TRUE)
        RETURNING id
        "#,
    )
    .bind(unique_name("course"))
    .bind(instructor_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_lesson(pool: &PgPool, course_id: i64, order: i32) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO lessons (course_id, title, content, display_order, is_published)
        VALUES ($1, $2, '<p>Lesson body</p>', $3, TRUE)
        RETURNING id
        "#,
    )
    .bind(course_id)
    .bind(format!("Lesson {}", order))
    .bind(order)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_quiz(pool: &PgPool, lesson_id: i64, passing_score: i32) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO quizzes (lesson_id, title, passing_score, is_published)
        VALUES ($1, 'Checkpoint quiz', $2, TRUE)
        RETURNING id
        "#,
    )
    .bind(lesson_id)
    .bind(passing_score)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_mc_question(pool: &PgPool, quiz_id: i64, correct: &str, wrong: &str, order: i32) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO questions (quiz_id, question_text, question_type, options, display_order)
        VALUES ($1, $2, 'multiple-choice', $3, $4)
        RETURNING id
        "#,
    )
    .bind(quiz_id)
    .bind(format!("Question {}", order))
    .bind(serde_json::json!([
        { "text": correct, "isCorrect": true },
        { "text": wrong, "isCorrect": false },
    ]))
    .bind(order)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn unknown_path_returns_404() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": unique_name("u"),
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["role"], "student");
}

#[tokio::test]
async fn register_fails_validation() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn duplicate_enrollment_is_rejected() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let (_user_id, token) = register_and_login(&client, &address, &pool, "student").await;
    let course_id = seed_course(&pool, None).await;

    let first = client
        .post(format!("{}/api/student/courses/{}/enroll", address, course_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = client
        .post(format!("{}/api/student/courses/{}/enroll", address, course_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
    let body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn starting_attempt_requires_enrollment() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let (user_id, token) = register_and_login(&client, &address, &pool, "student").await;
    let course_id = seed_course(&pool, None).await;
    let lesson_id = seed_lesson(&pool, course_id, 1).await;
    let quiz_id = seed_quiz(&pool, lesson_id, 70).await;

    let response = client
        .post(format!("{}/api/student/quizzes/{}/start", address, quiz_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);

    // No attempt row may exist after the rejection.
    let attempts = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2",
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(attempts, 0);
}

#[tokio::test]
async fn quiz_flow_grades_and_cascades_progress() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let (_user_id, token) = register_and_login(&client, &address, &pool, "student").await;

    // Course with two lessons; the first one gated by a two-question quiz.
    let course_id = seed_course(&pool, None).await;
    let lesson1 = seed_lesson(&pool, course_id, 1).await;
    let lesson2 = seed_lesson(&pool, course_id, 2).await;
    let quiz_id = seed_quiz(&pool, lesson1, 70).await;
    let q1 = seed_mc_question(&pool, quiz_id, "Paris", "Rome", 1).await;
    let q2 = seed_mc_question(&pool, quiz_id, "Berlin", "Madrid", 2).await;

    let enroll = client
        .post(format!("{}/api/student/courses/{}/enroll", address, course_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(enroll.status().as_u16(), 201);

    // Student quiz view must not leak the answer key.
    let quiz_view = client
        .get(format!("{}/api/student/quizzes/{}", address, quiz_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(quiz_view.status().as_u16(), 200);
    let quiz_body = quiz_view.text().await.unwrap();
    assert!(!quiz_body.contains("isCorrect"));
    assert!(!quiz_body.contains("correctAnswer"));

    // First attempt: one right, one wrong -> 50%, below the 70% bar.
    let start: serde_json::Value = client
        .post(format!("{}/api/student/quizzes/{}/start", address, quiz_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = start["data"]["attemptId"].as_i64().unwrap();

    let result: serde_json::Value = client
        .post(format!(
            "{}/api/student/quizzes/attempts/{}/submit",
            address, attempt_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "answers": [
                { "questionId": q1, "answer": "Paris" },
                { "questionId": q2, "answer": "Madrid" },
            ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["data"]["score"], 50);
    assert_eq!(result["data"]["isPassed"], false);

    let progress = sqlx::query_scalar::<_, i32>(
        "SELECT progress FROM enrollments WHERE course_id = $1",
    )
    .bind(course_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(progress, 0, "Failed attempt must not advance the course");

    // Second attempt: all correct -> 100%, passes and completes lesson 1.
    let start: serde_json::Value = client
        .post(format!("{}/api/student/quizzes/{}/start", address, quiz_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = start["data"]["attemptId"].as_i64().unwrap();

    let response = client
        .post(format!(
            "{}/api/student/quizzes/attempts/{}/submit",
            address, attempt_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "answers": [
                { "questionId": q1, "answer": "Paris" },
                { "questionId": q2, "answer": "Berlin" },
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let result: serde_json::Value = response.json().await.unwrap();
    assert_eq!(result["data"]["score"], 100);
    assert_eq!(result["data"]["isPassed"], true);
    assert_eq!(result["data"]["correctAnswers"], 2);
    assert_eq!(result["data"]["feedback"].as_array().unwrap().len(), 2);

    // Resubmitting the finalized attempt must conflict and not regrade.
    let resubmit = client
        .post(format!(
            "{}/api/student/quizzes/attempts/{}/submit",
            address, attempt_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "answers": [
                { "questionId": q1, "answer": "Rome" },
                { "questionId": q2, "answer": "Madrid" },
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resubmit.status().as_u16(), 409);

    let stored_score = sqlx::query_scalar::<_, i32>(
        "SELECT score FROM quiz_attempts WHERE id = $1",
    )
    .bind(attempt_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(stored_score, 100, "Conflicting resubmit must not alter the score");

    // One of two lessons done: course progress is 50.
    let content: serde_json::Value = client
        .get(format!("{}/api/student/courses/{}", address, course_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(content["data"]["enrollment"]["progress"], 50);
    assert_eq!(content["data"]["lessons"][0]["isCompleted"], true);
    assert_eq!(content["data"]["lessons"][1]["isCompleted"], false);
    assert_eq!(content["data"]["quizzes"][0]["bestScore"], 100);
    assert_eq!(content["data"]["quizzes"][0]["isPassed"], true);

    // Completing the second lesson finishes the course.
    let complete = client
        .put(format!(
            "{}/api/student/lessons/{}/complete",
            address, lesson2
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "timeSpent": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(complete.status().as_u16(), 200);

    let content: serde_json::Value = client
        .get(format!("{}/api/student/courses/{}", address, course_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(content["data"]["enrollment"]["progress"], 100);
    assert_eq!(content["data"]["enrollment"]["isCompleted"], true);
}

#[tokio::test]
async fn instructor_manages_lessons_and_questions() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let (instructor_id, token) = register_and_login(&client, &address, &pool, "instructor").await;
    let course_id = seed_course(&pool, Some(instructor_id)).await;

    // Create a lesson; script content must be sanitized away.
    let lesson: serde_json::Value = client
        .post(format!(
            "{}/api/instructor/courses/{}/lessons",
            address, course_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Intro",
            "content": "<p>Welcome</p><script>alert(1)</script>",
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(lesson["success"], true);
    let lesson_id = lesson["data"]["id"].as_i64().unwrap();
    let content = lesson["data"]["content"].as_str().unwrap();
    assert!(content.contains("<p>Welcome</p>"));
    assert!(!content.contains("script"));

    let quiz: serde_json::Value = client
        .post(format!(
            "{}/api/instructor/lessons/{}/quizzes",
            address, lesson_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "title": "Checkpoint" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let quiz_id = quiz["data"]["id"].as_i64().unwrap();
    assert_eq!(quiz["data"]["passingScore"], 70);

    // A multiple-choice question flagging two correct options is invalid.
    let bad_question = client
        .post(format!(
            "{}/api/instructor/quizzes/{}/questions",
            address, quiz_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "questionText": "Pick one",
            "questionType": "multiple-choice",
            "options": [
                { "text": "A", "isCorrect": true },
                { "text": "B", "isCorrect": true },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_question.status().as_u16(), 400);

    let question = client
        .post(format!(
            "{}/api/instructor/quizzes/{}/questions",
            address, quiz_id
        ))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "questionText": "Pick one",
            "questionType": "multiple-choice",
            "options": [
                { "text": "A", "isCorrect": true },
                { "text": "B", "isCorrect": false },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(question.status().as_u16(), 201);

    // Another instructor must not touch this course.
    let (_other_id, other_token) = register_and_login(&client, &address, &pool, "instructor").await;
    let forbidden = client
        .post(format!(
            "{}/api/instructor/courses/{}/lessons",
            address, course_id
        ))
        .bearer_auth(&other_token)
        .json(&serde_json::json!({ "title": "Hijack", "content": "<p>x</p>" }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    // Deleting the lesson takes its quiz and questions with it.
    let delete = client
        .delete(format!("{}/api/instructor/lessons/{}", address, lesson_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status().as_u16(), 200);

    let remaining_quizzes =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quizzes WHERE lesson_id = $1")
            .bind(lesson_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(remaining_quizzes, 0);

    let remaining_questions =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE quiz_id = $1")
            .bind(quiz_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(remaining_questions, 0);
}
