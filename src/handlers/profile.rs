// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{UpdateNameRequest, User},
    utils::{html::clean_text, jwt::Claims},
};

/// Get the current user's profile.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, display_name, email, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(claims.user_id())
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Update the current user's display name.
///
/// The new name is propagated to every roster row of the classes the user
/// is enrolled in, so teachers see the updated name immediately.
pub async fn update_name(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateNameRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let name = clean_text(payload.display_name.trim());
    if name.is_empty() {
        return Err(AppError::BadRequest("Name cannot be empty".to_string()));
    }

    let user_id = claims.user_id();

    sqlx::query("UPDATE users SET display_name = $1 WHERE id = $2")
        .bind(&name)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update display name: {:?}", e);
            AppError::from(e)
        })?;

    sqlx::query("UPDATE class_students SET name = $1 WHERE student_id = $2")
        .bind(&name)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to propagate display name to rosters: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(json!({
        "message": "Name updated successfully",
        "display_name": name,
    })))
}
