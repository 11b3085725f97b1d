// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rand::{Rng, distr::Alphanumeric};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{ROLE_STUDENT, ROLE_TEACHER, sign_jwt},
    },
};

/// Registers a new user with an explicit role.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if payload.role != ROLE_TEACHER && payload.role != ROLE_STUDENT {
        return Err(AppError::BadRequest(
            "Role must be 'teacher' or 'student'".to_string(),
        ));
    }

    let hashed_password = hash_password(&payload.password)?;
    let display_name = if payload.display_name.trim().is_empty() {
        payload.username.clone()
    } else {
        payload.display_name.trim().to_string()
    };

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password, role, display_name, email)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, username, password, role, display_name, email, created_at
        "#,
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(&payload.role)
    .bind(&display_name)
    .bind(payload.email.as_deref().unwrap_or(""))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        // Postgres error code for unique violation is 23505
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, display_name, email, created_at
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let user = user.ok_or(AppError::AuthError("User not found".to_string()))?;

    let is_valid = verify_password(&payload.password, &user.password)?;

    if !is_valid {
        return Err(AppError::AuthError("Invalid password".to_string()));
    }

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": user.role,
        "user_id": user.id,
    })))
}

/// Creates an anonymous student account and signs it in.
///
/// Fallback path for users who cannot complete a regular sign-in; their
/// data is kept under a generated identity.
pub async fn guest(
    State(pool): State<PgPool>,
    State(config): State<Config>,
) -> Result<impl IntoResponse, AppError> {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    let username = format!("anon_{}", suffix.to_lowercase());

    // Guests never log in with a password; store a hash of a throwaway one.
    let throwaway: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let hashed_password = hash_password(&throwaway)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password, role, display_name, email)
        VALUES ($1, $2, 'student', 'Anonymous User', '')
        RETURNING id, username, password, role, display_name, email, created_at
        "#,
    )
    .bind(&username)
    .bind(&hashed_password)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create guest user: {:?}", e);
        AppError::from(e)
    })?;

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "token": token,
            "type": "Bearer",
            "role": user.role,
            "user_id": user.id,
        })),
    ))
}
