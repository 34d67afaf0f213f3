// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, instructor, quiz, student},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, instructor_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Nests one sub-router per role under /api.
/// * Applies global middleware (Trace, CORS) and rate limiting on auth.
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins: [HeaderValue; 2] = [
        state.config.client_origin.parse().unwrap(),
        "http://127.0.0.1:5173".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // Brute-force guard for credential endpoints. Keyed by peer IP, so the
    // server must be driven with into_make_service_with_connect_info.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(10)
            .finish()
            .unwrap(),
    );

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(GovernorLayer::new(governor_conf));

    let student_routes = Router::new()
        .route("/courses", get(student::get_enrolled_courses))
        .route("/courses/{course_id}", get(student::get_course_content))
        .route("/courses/{course_id}/enroll", post(student::enroll_in_course))
        .route("/lessons/{lesson_id}", get(student::get_lesson_content))
        .route(
            "/lessons/{lesson_id}/complete",
            put(student::mark_lesson_completed),
        )
        .route("/quizzes/{quiz_id}", get(quiz::get_quiz))
        .route("/quizzes/{quiz_id}/start", post(quiz::start_attempt))
        .route(
            "/quizzes/attempts/{attempt_id}/submit",
            post(quiz::submit_attempt),
        )
        // Double middleware protection: Auth first, then role check
        .layer(middleware::from_fn(student_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let instructor_routes = Router::new()
        .route("/courses", get(instructor::list_my_courses))
        .route(
            "/courses/{course_id}",
            get(instructor::get_course_with_lessons),
        )
        .route(
            "/courses/{course_id}/lessons",
            post(instructor::create_lesson),
        )
        .route(
            "/lessons/{lesson_id}",
            put(instructor::update_lesson).delete(instructor::delete_lesson),
        )
        .route(
            "/lessons/{lesson_id}/quizzes",
            post(instructor::create_quiz),
        )
        .route(
            "/quizzes/{quiz_id}",
            get(instructor::get_quiz_with_questions),
        )
        .route(
            "/quizzes/{quiz_id}/questions",
            post(instructor::add_question),
        )
        .route(
            "/questions/{question_id}",
            delete(instructor::delete_question),
        )
        .route("/quizzes/{quiz_id}/results", get(instructor::get_quiz_results))
        .route(
            "/courses/{course_id}/enrollments",
            get(instructor::get_course_enrollments),
        )
        .route(
            "/courses/{course_id}/students/{student_id}",
            get(instructor::get_student_performance),
        )
        .layer(middleware::from_fn(instructor_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/courses", get(admin::list_courses).post(admin::create_course))
        .route(
            "/courses/{id}",
            get(admin::get_course)
                .put(admin::update_course)
                .delete(admin::delete_course),
        )
        .route(
            "/courses/{course_id}/instructor/{instructor_id}",
            put(admin::assign_instructor),
        )
        .route(
            "/courses/{course_id}/instructor",
            delete(admin::unassign_instructor),
        )
        .route("/users", get(admin::list_users))
        .route("/enrollments", get(admin::list_enrollments))
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/student", student_routes)
        .nest("/api/instructor", instructor_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
