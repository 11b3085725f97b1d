// src/routes.rs

use axum::{
    Router, http::Method,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempts, auth, classes, profile, quizzes, student},
    state::AppState,
    utils::jwt::{auth_middleware, student_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, profile, quizzes, classes, student).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, AI client).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/guest", post(auth::guest));

    let profile_routes = Router::new()
        .route("/me", get(profile::get_me))
        .route("/name", put(profile::update_name))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    // Teacher side: authoring, question bank, analytics.
    let quiz_routes = Router::new()
        .route("/", get(quizzes::list_quizzes).post(quizzes::save_quiz))
        .route("/generate", post(quizzes::generate_quiz))
        .route("/analytics", get(quizzes::analytics))
        .route("/{id}", get(quizzes::get_quiz).put(quizzes::update_quiz))
        .layer(from_fn(teacher_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    // Teacher side: classes, rosters and assignments.
    let class_routes = Router::new()
        .route("/", get(classes::list_classes).post(classes::create_class))
        .route("/{id}/students", get(classes::roster))
        .route("/{id}/assignments", post(classes::assign_quiz))
        .layer(from_fn(teacher_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    // Student side: joining, assigned quizzes, attempts, progress.
    let student_routes = Router::new()
        .route("/join", post(classes::join_class))
        .route("/enrollments", get(student::list_enrollments))
        .route("/assigned", get(student::list_assigned))
        .route("/assigned/{quiz_id}", get(student::get_assigned_quiz))
        .route("/attempts", post(attempts::submit_attempt))
        .route("/progress", get(student::progress))
        .layer(from_fn(student_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/classes", class_routes)
        .nest("/api/student", student_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
