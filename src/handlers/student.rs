// src/handlers/student.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{Local, Offset, Utc};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{attempt::Attempt, class::Enrollment, quiz::Quiz},
    utils::jwt::Claims,
    views::{self, AssignedQuiz},
};

/// The student's assigned quizzes: every class they are enrolled in
/// contributes its assignment entries, and each entry carries the student's
/// own attempts (joined by quiz id).
///
/// Recomputed in full from the current enrollment, assignment and attempt
/// rows on every request.
pub async fn list_assigned(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id();

    let enrollments = fetch_enrollments(&pool, student_id).await?;

    let assigned = sqlx::query_as::<_, AssignedQuiz>(
        r#"
        SELECT a.quiz_id, a.class_id, e.class_name, q.title,
               jsonb_array_length(q.questions)::bigint AS question_count
        FROM assignments a
        JOIN enrollments e ON e.class_id = a.class_id AND e.student_id = $1
        JOIN quizzes q ON q.id = a.quiz_id
        "#,
    )
    .bind(student_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch assigned quizzes: {:?}", e);
        AppError::from(e)
    })?;

    let attempts = fetch_attempts(&pool, student_id).await?;

    Ok(Json(views::resolve_assignments(
        &enrollments,
        assigned,
        &attempts,
    )))
}

/// Fetch one quiz for taking, provided it is assigned to a class the
/// student is enrolled in.
///
/// Note: the full quiz document (including correct answers) is returned,
/// matching the assignment data the original client held; a DTO hiding the
/// answer key would be the hardening step here.
pub async fn get_assigned_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT DISTINCT q.id, q.teacher_id, q.title, q.questions, q.status, q.created_at
        FROM quizzes q
        JOIN assignments a ON a.quiz_id = q.id
        JOIN enrollments e ON e.class_id = a.class_id
        WHERE q.id = $1 AND e.student_id = $2
        "#,
    )
    .bind(quiz_id)
    .bind(claims.user_id())
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    Ok(Json(quiz))
}

/// The student's classes ("my classes").
pub async fn list_enrollments(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let enrollments = fetch_enrollments(&pool, claims.user_id()).await?;
    Ok(Json(enrollments))
}

/// Display-only progress summary: daily streak, total attempts and the
/// latest score, derived from the student's full attempt list.
pub async fn progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = fetch_attempts(&pool, claims.user_id()).await?;

    let offset = Local::now().offset().fix();
    let today = Utc::now().with_timezone(&offset).date_naive();

    Ok(Json(views::progress_summary(&attempts, today, offset)))
}

async fn fetch_enrollments(pool: &PgPool, student_id: i64) -> Result<Vec<Enrollment>, AppError> {
    sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT student_id, class_id, class_name, code, teacher_id, joined_at
        FROM enrollments
        WHERE student_id = $1
        ORDER BY joined_at
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch enrollments: {:?}", e);
        AppError::from(e)
    })
}

async fn fetch_attempts(pool: &PgPool, student_id: i64) -> Result<Vec<Attempt>, AppError> {
    sqlx::query_as::<_, Attempt>(
        r#"
        SELECT id, quiz_id, class_id, student_id, student_name, teacher_id,
               score, total_questions, completed_at, answers, feedback
        FROM attempts
        WHERE student_id = $1
        ORDER BY completed_at DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch attempts: {:?}", e);
        AppError::from(e)
    })
}
