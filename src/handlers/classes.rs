// src/handlers/classes.rs

use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::class::{
        AssignQuizRequest, Class, ClassWithCount, CreateClassRequest, JoinClassRequest,
        RosterEntry,
    },
    utils::{code::pick_join_code, html::clean_text, jwt::Claims},
};

/// Creates a class with a generated 6-character join code.
///
/// The code is checked against existing classes and regenerated once on
/// collision; the check and the insert are separate statements, so duplicate
/// codes under concurrent creation remain possible (accepted limitation).
pub async fn create_class(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateClassRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let name = clean_text(payload.name.trim());
    if name.is_empty() {
        return Err(AppError::BadRequest("Class name cannot be empty".to_string()));
    }

    let taken: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT code FROM classes")
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch existing join codes: {:?}", e);
            AppError::from(e)
        })?
        .into_iter()
        .collect();

    let code = {
        let mut rng = rand::rng();
        pick_join_code(&mut rng, |candidate| taken.contains(candidate))
    };

    let class = sqlx::query_as::<_, Class>(
        r#"
        INSERT INTO classes (teacher_id, name, code)
        VALUES ($1, $2, $3)
        RETURNING id, teacher_id, name, code, created_at
        "#,
    )
    .bind(claims.user_id())
    .bind(&name)
    .bind(&code)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create class: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(class)))
}

/// The teacher's classes, each with its current roster size.
pub async fn list_classes(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let classes = sqlx::query_as::<_, ClassWithCount>(
        r#"
        SELECT c.id, c.name, c.code, c.created_at,
               COUNT(cs.student_id) AS student_count
        FROM classes c
        LEFT JOIN class_students cs ON cs.class_id = c.id
        WHERE c.teacher_id = $1
        GROUP BY c.id
        ORDER BY c.created_at DESC
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list classes: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(classes))
}

/// Roster of an owned class.
pub async fn roster(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(class_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    require_class_owner(&pool, class_id, claims.user_id()).await?;

    let students = sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT class_id, student_id, name, email, joined_at
        FROM class_students
        WHERE class_id = $1
        ORDER BY joined_at
        "#,
    )
    .bind(class_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(students))
}

/// Makes an owned quiz visible to an owned class.
/// Re-assigning the same quiz is a no-op.
pub async fn assign_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(class_id): Path<i64>,
    Json(payload): Json<AssignQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let teacher_id = claims.user_id();
    require_class_owner(&pool, class_id, teacher_id).await?;

    let owns_quiz =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM quizzes WHERE id = $1 AND teacher_id = $2)")
            .bind(payload.quiz_id)
            .bind(teacher_id)
            .fetch_one(&pool)
            .await?;
    if !owns_quiz {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO assignments (class_id, quiz_id)
        VALUES ($1, $2)
        ON CONFLICT (class_id, quiz_id) DO NOTHING
        "#,
    )
    .bind(class_id)
    .bind(payload.quiz_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to assign quiz: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Quiz assigned to class" })),
    ))
}

/// Enrolls the current student in the class matching the submitted join
/// code: one roster row under the class, one enrollment mirror under the
/// student.
pub async fn join_class(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<JoinClassRequest>,
) -> Result<impl IntoResponse, AppError> {
    let code: String = payload
        .code
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if code.len() != crate::utils::code::JOIN_CODE_LEN {
        return Err(AppError::BadRequest("Enter a valid class code".to_string()));
    }

    let class = sqlx::query_as::<_, Class>(
        r#"
        SELECT id, teacher_id, name, code, created_at
        FROM classes
        WHERE code = $1
        LIMIT 1
        "#,
    )
    .bind(&code)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound(
        "No class found with that code".to_string(),
    ))?;

    let student_id = claims.user_id();
    let student = sqlx::query_as::<_, (String, String)>(
        "SELECT display_name, email FROM users WHERE id = $1",
    )
    .bind(student_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO class_students (class_id, student_id, name, email)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (class_id, student_id)
        DO UPDATE SET name = EXCLUDED.name, email = EXCLUDED.email
        "#,
    )
    .bind(class.id)
    .bind(student_id)
    .bind(&student.0)
    .bind(&student.1)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to write roster row: {:?}", e);
        AppError::from(e)
    })?;

    sqlx::query(
        r#"
        INSERT INTO enrollments (student_id, class_id, class_name, code, teacher_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (student_id, class_id) DO NOTHING
        "#,
    )
    .bind(student_id)
    .bind(class.id)
    .bind(&class.name)
    .bind(&class.code)
    .bind(class.teacher_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to write enrollment: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(json!({
        "message": format!("Joined {} successfully", class.name),
        "class_id": class.id,
        "class_name": class.name,
    })))
}

async fn require_class_owner(
    pool: &PgPool,
    class_id: i64,
    teacher_id: i64,
) -> Result<(), AppError> {
    let owns = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM classes WHERE id = $1 AND teacher_id = $2)",
    )
    .bind(class_id)
    .bind(teacher_id)
    .fetch_one(pool)
    .await?;

    if !owns {
        return Err(AppError::NotFound("Class not found".to_string()));
    }
    Ok(())
}
